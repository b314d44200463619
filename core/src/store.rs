use crate::error::StoreError;
use crate::model::{Answer, AnswerId, Profile, Question, QuestionId, Tag, TagCount, TagId, UserId};
use crate::rating::{profile_rating, question_rating, RatingWeights};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read access the ranking jobs need from the primary data store.
pub trait PrimaryStore: Send + Sync {
    /// Every tag with the number of questions carrying it, in tag id order.
    fn tag_question_counts(&self) -> Result<Vec<TagCount>, StoreError>;
    /// Every profile with its stored rating, in user id order.
    fn profiles(&self) -> Result<Vec<Profile>, StoreError>;
}

/// sled-backed primary store. Records are bincode encoded under big-endian ids so
/// iteration follows id order; relations live in composite-key index trees.
pub struct SledStore {
    db: sled::Db,
    tags: sled::Tree,
    tag_titles: sled::Tree,
    questions: sled::Tree,
    answers: sled::Tree,
    profiles: sled::Tree,
    tag_questions: sled::Tree,      // tag_id ++ question_id
    question_answers: sled::Tree,   // question_id ++ answer_id
    user_questions: sled::Tree,     // user_id ++ question_id
    user_answers: sled::Tree,       // user_id ++ answer_id
}

const EMPTY: &[u8] = &[];

fn key(id: u64) -> [u8; 8] { id.to_be_bytes() }

fn pair_key(a: u64, b: u64) -> [u8; 16] {
    let mut k = [0u8; 16];
    k[..8].copy_from_slice(&a.to_be_bytes());
    k[8..].copy_from_slice(&b.to_be_bytes());
    k
}

fn id_from(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[bytes.len() - 8..]);
    u64::from_be_bytes(buf)
}

fn put<T: Serialize>(tree: &sled::Tree, id: u64, value: &T) -> Result<(), StoreError> {
    let bytes = bincode::serialize(value)?;
    tree.insert(key(id), bytes)?;
    Ok(())
}

fn get<T: DeserializeOwned>(tree: &sled::Tree, id: u64) -> Result<Option<T>, StoreError> {
    match tree.get(key(id))? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

fn load_all<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (_, bytes) = item?;
        out.push(bincode::deserialize(&bytes)?);
    }
    Ok(out)
}

fn count_prefix(tree: &sled::Tree, id: u64) -> Result<u64, StoreError> {
    let mut n = 0;
    for item in tree.scan_prefix(key(id)) {
        item?;
        n += 1;
    }
    Ok(n)
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            tags: db.open_tree("tags")?,
            tag_titles: db.open_tree("tag_titles")?,
            questions: db.open_tree("questions")?,
            answers: db.open_tree("answers")?,
            profiles: db.open_tree("profiles")?,
            tag_questions: db.open_tree("tag_questions")?,
            question_answers: db.open_tree("question_answers")?,
            user_questions: db.open_tree("user_questions")?,
            user_answers: db.open_tree("user_answers")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        // sled ids start at 0; keep 0 free so ids read naturally
        Ok(self.db.generate_id()? + 1)
    }

    /// Creates the profile of `user_id` with a zero rating, or updates its name and
    /// avatar while keeping the stored rating.
    pub fn insert_profile(&self, user_id: UserId, name: &str, avatar: &str) -> Result<Profile, StoreError> {
        let rating = get::<Profile>(&self.profiles, user_id)?.map_or(0, |p| p.rating);
        let profile = Profile { user_id, name: name.to_string(), avatar: avatar.to_string(), rating };
        put(&self.profiles, user_id, &profile)?;
        Ok(profile)
    }

    /// Returns the existing tag when the title is already taken.
    pub fn insert_tag(&self, title: &str) -> Result<Tag, StoreError> {
        if let Some(id) = self.tag_titles.get(title.as_bytes())? {
            let id = id_from(&id);
            return get(&self.tags, id)?.ok_or(StoreError::NotFound { entity: "tag", id });
        }
        let tag = Tag { id: self.next_id()?, title: title.to_string() };
        put(&self.tags, tag.id, &tag)?;
        self.tag_titles.insert(title.as_bytes(), key(tag.id).to_vec())?;
        Ok(tag)
    }

    pub fn insert_question(&self, title: &str, text: &str, author: UserId, tags: &[TagId]) -> Result<Question, StoreError> {
        for &tag in tags {
            if !self.tags.contains_key(key(tag))? {
                return Err(StoreError::NotFound { entity: "tag", id: tag });
            }
        }
        let mut tags = tags.to_vec();
        tags.sort_unstable();
        tags.dedup();
        let question = Question {
            id: self.next_id()?,
            title: title.to_string(),
            text: text.to_string(),
            author,
            rating: 0,
            tags,
        };
        put(&self.questions, question.id, &question)?;
        for &tag in &question.tags {
            self.tag_questions.insert(pair_key(tag, question.id), EMPTY)?;
        }
        self.user_questions.insert(pair_key(author, question.id), EMPTY)?;
        Ok(question)
    }

    pub fn insert_answer(&self, question: QuestionId, author: UserId, text: &str, is_correct: bool) -> Result<Answer, StoreError> {
        if !self.questions.contains_key(key(question))? {
            return Err(StoreError::NotFound { entity: "question", id: question });
        }
        let answer = Answer { id: self.next_id()?, question, author, text: text.to_string(), is_correct, rating: 0 };
        put(&self.answers, answer.id, &answer)?;
        self.question_answers.insert(pair_key(question, answer.id), EMPTY)?;
        self.user_answers.insert(pair_key(author, answer.id), EMPTY)?;
        Ok(answer)
    }

    pub fn question(&self, id: QuestionId) -> Result<Option<Question>, StoreError> { get(&self.questions, id) }
    pub fn profile(&self, user_id: UserId) -> Result<Option<Profile>, StoreError> { get(&self.profiles, user_id) }

    /// Ids of the questions carrying `tag`, ascending.
    pub fn tag_questions(&self, tag: TagId) -> Result<Vec<QuestionId>, StoreError> {
        let mut ids = Vec::new();
        for item in self.tag_questions.scan_prefix(key(tag)) {
            let (k, _) = item?;
            ids.push(id_from(&k));
        }
        Ok(ids)
    }

    pub fn set_question_rating(&self, id: QuestionId, rating: i64) -> Result<(), StoreError> {
        let mut q: Question = get(&self.questions, id)?.ok_or(StoreError::NotFound { entity: "question", id })?;
        q.rating = rating;
        put(&self.questions, id, &q)
    }

    pub fn set_answer_rating(&self, id: AnswerId, rating: i64) -> Result<(), StoreError> {
        let mut a: Answer = get(&self.answers, id)?.ok_or(StoreError::NotFound { entity: "answer", id })?;
        a.rating = rating;
        put(&self.answers, id, &a)
    }

    pub fn set_profile_rating(&self, user_id: UserId, rating: i64) -> Result<(), StoreError> {
        let mut p: Profile = get(&self.profiles, user_id)?.ok_or(StoreError::NotFound { entity: "profile", id: user_id })?;
        p.rating = rating;
        put(&self.profiles, user_id, &p)
    }

    /// Recomputes a question's rating from reaction counts and its live answer count.
    pub fn rescore_question(&self, id: QuestionId, likes: u64, dislikes: u64, weights: &RatingWeights) -> Result<i64, StoreError> {
        let answers = count_prefix(&self.question_answers, id)?;
        let rating = question_rating(weights, likes, dislikes, answers);
        self.set_question_rating(id, rating)?;
        Ok(rating)
    }

    /// Recomputes a profile's rating from everything its user authored.
    pub fn rescore_profile(&self, user_id: UserId, weights: &RatingWeights) -> Result<i64, StoreError> {
        let questions = count_prefix(&self.user_questions, user_id)?;
        let mut answers = 0;
        let mut correct = 0;
        for item in self.user_answers.scan_prefix(key(user_id)) {
            let (k, _) = item?;
            let answer_id = id_from(&k);
            let answer: Answer = get(&self.answers, answer_id)?
                .ok_or(StoreError::NotFound { entity: "answer", id: answer_id })?;
            answers += 1;
            if answer.is_correct { correct += 1; }
        }
        let rating = profile_rating(weights, questions, answers, correct);
        self.set_profile_rating(user_id, rating)?;
        Ok(rating)
    }
}

impl PrimaryStore for SledStore {
    fn tag_question_counts(&self) -> Result<Vec<TagCount>, StoreError> {
        let tags: Vec<Tag> = load_all(&self.tags)?;
        let mut out = Vec::with_capacity(tags.len());
        for tag in tags {
            let question_count = count_prefix(&self.tag_questions, tag.id)?;
            out.push(TagCount { tag, question_count });
        }
        Ok(out)
    }

    fn profiles(&self) -> Result<Vec<Profile>, StoreError> {
        load_all(&self.profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_titles_are_unique() {
        let store = SledStore::temporary().unwrap();
        let a = store.insert_tag("rust").unwrap();
        let b = store.insert_tag("rust").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.tag_question_counts().unwrap().len(), 1);
    }

    #[test]
    fn counts_questions_per_tag_including_zero() {
        let store = SledStore::temporary().unwrap();
        let rust = store.insert_tag("rust").unwrap();
        let go = store.insert_tag("go").unwrap();
        let idle = store.insert_tag("idle").unwrap();
        store.insert_question("q1", "", 1, &[rust.id, go.id]).unwrap();
        store.insert_question("q2", "", 1, &[rust.id, rust.id]).unwrap();

        let counts = store.tag_question_counts().unwrap();
        let by_title = |t: &str| counts.iter().find(|c| c.tag.title == t).unwrap().question_count;
        assert_eq!(by_title("rust"), 2);
        assert_eq!(by_title("go"), 1);
        assert_eq!(by_title(&idle.title), 0);
        assert_eq!(store.tag_questions(rust.id).unwrap().len(), 2);
        assert!(store.tag_questions(idle.id).unwrap().is_empty());
    }

    #[test]
    fn unknown_references_are_rejected() {
        let store = SledStore::temporary().unwrap();
        assert!(matches!(store.insert_question("q", "", 1, &[42]), Err(StoreError::NotFound { entity: "tag", id: 42 })));
        assert!(matches!(store.insert_answer(7, 1, "a", false), Err(StoreError::NotFound { entity: "question", id: 7 })));
        assert!(matches!(store.set_profile_rating(9, 1), Err(StoreError::NotFound { entity: "profile", .. })));
    }

    #[test]
    fn reinserted_profile_keeps_its_rating() {
        let store = SledStore::temporary().unwrap();
        store.insert_profile(3, "old", "avatars/default.png").unwrap();
        store.set_profile_rating(3, 17).unwrap();
        let updated = store.insert_profile(3, "new", "avatars/n.png").unwrap();
        assert_eq!(updated.rating, 17);
        assert_eq!(store.profile(3).unwrap().unwrap().name, "new");
    }

    #[test]
    fn rescoring_uses_authored_activity() {
        let store = SledStore::temporary().unwrap();
        let w = RatingWeights::default();
        store.insert_profile(1, "asker", "avatars/default.png").unwrap();
        store.insert_profile(2, "helper", "avatars/default.png").unwrap();
        let tag = store.insert_tag("sql").unwrap();
        let q = store.insert_question("joins?", "how", 1, &[tag.id]).unwrap();
        store.insert_answer(q.id, 2, "like this", true).unwrap();
        store.insert_answer(q.id, 2, "or this", false).unwrap();

        assert_eq!(store.rescore_question(q.id, 3, 1, &w).unwrap(), 3 - 1 + 2 * 3);
        assert_eq!(store.question(q.id).unwrap().unwrap().rating, 8);
        assert_eq!(store.rescore_profile(1, &w).unwrap(), 2);
        assert_eq!(store.rescore_profile(2, &w).unwrap(), 2 * 3 + 5);
        assert_eq!(store.profile(2).unwrap().unwrap().rating, 11);
    }
}
