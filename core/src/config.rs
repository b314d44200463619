use crate::jobs::{POPULAR_TAGS_TTL, TOP_USERS_TTL};
use crate::rating::RatingWeights;
use crate::scheduler::Schedule;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CRON: &str = "*/1 * * * *";
pub const DEFAULT_DB_PATH: &str = "./data/askboard.sled";

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub popular_tags_ttl: Duration,
    pub top_users_ttl: Duration,
    pub popular_tags_schedule: Schedule,
    pub top_users_schedule: Schedule,
    pub weights: RatingWeights,
}

impl Settings {
    /// Reads the process environment. Binaries load `.env` first.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| {
                tracing::debug!(key, default, "using default");
                default.to_string()
            })
        };
        let parse = |key: &str, default: &str| -> Result<i64> { parse_value(key, &get(key, default)) };
        let secs = |key: &str, default: Duration| -> Result<Duration> {
            let raw = get(key, &default.as_secs().to_string());
            Ok(Duration::from_secs(parse_value(key, &raw)?))
        };
        let defaults = RatingWeights::default();

        Ok(Self {
            db_path: PathBuf::from(get("ASKBOARD_DB_PATH", DEFAULT_DB_PATH)),
            popular_tags_ttl: secs("POPULAR_TAGS_CACHE_TTL", POPULAR_TAGS_TTL)?,
            top_users_ttl: secs("TOP_USERS_CACHE_TTL", TOP_USERS_TTL)?,
            popular_tags_schedule: parse_value("CRON_POPULAR_TAGS_INTERVAL", &get("CRON_POPULAR_TAGS_INTERVAL", DEFAULT_CRON))?,
            top_users_schedule: parse_value("CRON_TOP_USERS_INTERVAL", &get("CRON_TOP_USERS_INTERVAL", DEFAULT_CRON))?,
            weights: RatingWeights {
                like: parse("RATING_WEIGHT_LIKE", &defaults.like.to_string())?,
                dislike: parse("RATING_WEIGHT_DISLIKE", &defaults.dislike.to_string())?,
                comment: parse("RATING_WEIGHT_COMMENT", &defaults.comment.to_string())?,
                correct: parse("RATING_WEIGHT_CORRECT", &defaults.correct.to_string())?,
                question: parse("RATING_WEIGHT_QUESTION", &defaults.question.to_string())?,
            },
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    raw.trim()
        .parse::<T>()
        .map_err(Into::<anyhow::Error>::into)
        .with_context(|| format!("invalid value for {key}: '{raw}'"))
}
