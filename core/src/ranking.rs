use crate::model::{Profile, TagCount};
use std::cmp::Reverse;

pub const POPULAR_TAGS_LIMIT: usize = 20;
pub const TOP_USERS_LIMIT: usize = 10;

/// Sorts by `score` descending, breaking ties by `tie` ascending, and keeps the first `n`.
pub fn top_n<T, S, K>(mut items: Vec<T>, n: usize, score: impl Fn(&T) -> S, tie: impl Fn(&T) -> K) -> Vec<T>
where
    S: Ord,
    K: Ord,
{
    items.sort_by_key(|item| (Reverse(score(item)), tie(item)));
    items.truncate(n);
    items
}

pub fn rank_tags(counts: Vec<TagCount>, n: usize) -> Vec<TagCount> {
    top_n(counts, n, |c| c.question_count, |c| c.tag.id)
}

pub fn rank_profiles(profiles: Vec<Profile>, n: usize) -> Vec<Profile> {
    top_n(profiles, n, |p| p.rating, |p| p.user_id)
}
