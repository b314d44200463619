use crate::cache::{CacheStore, POPULAR_TAGS_KEY, TOP_USERS_KEY};
use crate::error::JobError;
use crate::ranking::{rank_profiles, rank_tags, POPULAR_TAGS_LIMIT, TOP_USERS_LIMIT};
use crate::store::PrimaryStore;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const POPULAR_TAGS_TTL: Duration = Duration::from_secs(2_678_400);
pub const TOP_USERS_TTL: Duration = Duration::from_secs(604_800);

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: &'static str,
    pub entries: usize,
    pub elapsed: Duration,
}

/// A stateless recomputation that reads the primary store and publishes one cache key.
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self) -> Result<JobReport, JobError>;
}

/// Ranks tags by how many questions carry them.
pub struct PopularTagsJob {
    store: Arc<dyn PrimaryStore>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
    limit: usize,
}

impl PopularTagsJob {
    pub fn new(store: Arc<dyn PrimaryStore>, cache: Arc<dyn CacheStore>) -> Self {
        Self { store, cache, ttl: POPULAR_TAGS_TTL, limit: POPULAR_TAGS_LIMIT }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Job for PopularTagsJob {
    fn name(&self) -> &'static str { POPULAR_TAGS_KEY }

    fn run(&self) -> Result<JobReport, JobError> {
        let start = Instant::now();
        let counts = self.store.tag_question_counts()?;
        let candidates = counts.len();
        let ranked = rank_tags(counts, self.limit);
        let payload = serde_json::to_vec(&ranked)?;
        self.cache.set(POPULAR_TAGS_KEY, payload, self.ttl)?;
        tracing::debug!(candidates, published = ranked.len(), "popular tags ranked");
        Ok(JobReport { job: self.name(), entries: ranked.len(), elapsed: start.elapsed() })
    }
}

/// Ranks profiles by their stored rating.
pub struct TopUsersJob {
    store: Arc<dyn PrimaryStore>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
    limit: usize,
}

impl TopUsersJob {
    pub fn new(store: Arc<dyn PrimaryStore>, cache: Arc<dyn CacheStore>) -> Self {
        Self { store, cache, ttl: TOP_USERS_TTL, limit: TOP_USERS_LIMIT }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Job for TopUsersJob {
    fn name(&self) -> &'static str { TOP_USERS_KEY }

    fn run(&self) -> Result<JobReport, JobError> {
        let start = Instant::now();
        let profiles = self.store.profiles()?;
        let candidates = profiles.len();
        let ranked = rank_profiles(profiles, self.limit);
        let payload = serde_json::to_vec(&ranked)?;
        self.cache.set(TOP_USERS_KEY, payload, self.ttl)?;
        tracing::debug!(candidates, published = ranked.len(), "top users ranked");
        Ok(JobReport { job: self.name(), entries: ranked.len(), elapsed: start.elapsed() })
    }
}
