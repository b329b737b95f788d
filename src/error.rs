//! Library error type.
//!
//! Every fallible operation in the pipeline returns [`Result`]. The variants
//! follow the failure classes the orchestrator has to tell apart: some are
//! recovered locally (detection, description translation), some are retryable
//! (admission), and the rest end the session.

use thiserror::Error;

/// Errors produced by the translation pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A platform sampler failed while detecting hardware capabilities.
    #[error("hardware detection failed: {0}")]
    Detection(String),

    /// The source language of a text could not be determined.
    #[error("language detection failed: {0}")]
    LanguageDetection(String),

    /// No catalog entry satisfies the RAM/GPU constraints.
    #[error("no models found within RAM constraint of {} GB", .max_ram / GIB)]
    NoModelFits { max_ram: u64 },

    /// The rate limiter denied admission for this key.
    #[error("rate limit exceeded for '{key}'")]
    RateLimited { key: String },

    /// The LLM backend failed to produce a translation.
    #[error("translation backend error: {0}")]
    Backend(String),

    /// The operation was cancelled before it completed.
    #[error("translation cancelled")]
    Cancelled,

    /// The document has nothing to translate.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session already exists: {0}")]
    SessionExists(String),

    /// A session in a terminal state was asked to move again.
    #[error("invalid session transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

const GIB: u64 = 1024 * 1024 * 1024;

impl Error {
    /// Returns `true` when retrying the same call later may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Backend(_) | Self::Redis(_) | Self::Storage(_)
        )
    }

    /// Returns `true` for storage-layer failures.
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Sqlite(_) | Self::Redis(_) | Self::Serialization(_)
        )
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
