//! dk_pipeline: room service surface (open → populate → next comparison →
//! submit votes → rank/decide → result).
//!
//! Every request is one read-modify-write of the whole room document through a
//! `dk_io::store::RoomStore`. Math lives in `dk_algo`; this crate sequences it,
//! talks to the candidate source, and shapes the payloads callers see.

#![forbid(unsafe_code)]

use dk_core::RoomId;
use dk_io::IoError;
use thiserror::Error;

pub mod engine;
pub mod populate;
pub mod report;
pub mod simulate;
pub mod source;
pub mod validate;

pub use engine::{Engine, NextComparison, NextStep, Progress, VoteReceipt};
pub use report::{AAnalysis, ResultRow, RoomResult};
pub use simulate::{simulate, SimulationConfig, SimulationReport};
pub use source::{CandidateQuery, CandidateSource, SourceError, StaticSource};
pub use validate::{VoteItem, VoteSubmission};

/// Single error surface for room operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Room absent or expired. Not retried.
    #[error("room not found: {0}")]
    NotFound(RoomId),

    /// Rejected before touching room state.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Candidate source failed even after the unfiltered retry.
    #[error("candidate source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error(transparent)]
    Store(#[from] IoError),

    /// Versioned writes lost every compare-and-set race.
    #[error("room {room} changed concurrently; gave up after {attempts} attempts")]
    Conflict { room: RoomId, attempts: u32 },

    #[error("invalid params: {0}")]
    Params(String),
}

impl From<dk_core::ParamsError> for PipelineError {
    fn from(e: dk_core::ParamsError) -> Self {
        PipelineError::Params(e.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
