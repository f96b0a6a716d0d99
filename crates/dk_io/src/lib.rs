//! dk_io: canonical JSON, version stamps, loaders, and room stores.
//!
//! Shared error type (`IoError`) with `From` conversions used across modules.
//! Stores speak whole room documents only; there is no partial update path.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for dk_io.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (create_dir_all, rename, fsync, read).
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON serialization/deserialization errors with a location hint.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// Parameter file parsed but failed domain checks.
    #[error("invalid params: {0}")]
    Params(String),

    /// Shared store state unusable (poisoned lock).
    #[error("store error: {0}")]
    Store(String),

    /// Generic validation / invariants.
    #[error("invalid: {0}")]
    Invalid(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Json {
            pointer: format!("line {} column {}", e.line(), e.column()),
            msg: e.to_string(),
        }
    }
}

impl From<dk_core::ParamsError> for IoError {
    fn from(e: dk_core::ParamsError) -> Self {
        IoError::Params(e.to_string())
    }
}

pub mod canonical_json;
pub mod clock;
pub mod hasher;
pub mod loader;
pub mod store;

pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::store::{FileStore, MemoryStore, RoomStore, StoredRoom};
    pub use crate::{IoError, IoResult};
}
