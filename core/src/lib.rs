//! Ranking snapshots for the Q&A board: the rating model, the primary store the
//! rankings are computed from, the TTL cache they are published to, and the
//! scheduler that keeps them fresh.

pub mod cache;
pub mod config;
pub mod error;
pub mod jobs;
pub mod model;
pub mod ranking;
pub mod rating;
pub mod scheduler;
pub mod store;

pub use error::{CacheError, JobError, StoreError};
pub use model::{Answer, AnswerId, Profile, Question, QuestionId, Tag, TagCount, TagId, UserId};
