use serde::{Deserialize, Serialize};

pub type TagId = u64;
pub type QuestionId = u64;
pub type AnswerId = u64;
pub type UserId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub text: String,
    pub author: UserId,
    pub rating: i64, // accumulated, maintained by the reaction handler
    pub tags: Vec<TagId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub question: QuestionId,
    pub author: UserId,
    pub text: String,
    pub is_correct: bool,
    pub rating: i64,
}

/// One profile per user account; `rating` aggregates the user's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub name: String,
    /// Relative path of the avatar image, e.g. avatars/default.png
    pub avatar: String,
    pub rating: i64,
}

/// A tag together with the number of questions carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: Tag,
    pub question_count: u64,
}
