use thiserror::Error;

/// Failures of the primary data store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(sled::Error),

    #[error("failed to decode stored record: {0}")]
    Codec(#[from] bincode::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// The backend could not be reached, e.g. an I/O failure under sled.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        match e {
            sled::Error::Io(io) => StoreError::Unavailable(io.to_string()),
            other => StoreError::Backend(other),
        }
    }
}

/// Failures of the cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Why a job run was aborted. Nothing is written to the cache in either case.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("reading candidates failed: {0}")]
    Store(#[from] StoreError),

    #[error("encoding ranking failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("publishing ranking failed: {0}")]
    Cache(#[from] CacheError),
}
