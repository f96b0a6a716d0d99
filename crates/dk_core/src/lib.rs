//! dk_core: Core types, parameters, ordering helpers, and seeded RNG.
//!
//! This crate is **I/O-free**. It defines the stable types shared across the
//! engine (`dk_algo`, `dk_io`, `dk_pipeline`, `dk_cli`).
//!
//! - Token ids: `RoomId`, `UserId`, `CandidateId`
//! - Room document entities (votes, comparisons, bounded histories)
//! - `EngineParams`: every tunable constant in one struct
//! - Stable score ordering helpers
//! - Seedable RNG (ChaCha20) for sampling draws
//!
//! Serialization derives are gated behind the `serde` feature.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod determinism;
pub mod entities;
pub mod ids;
pub mod rng;
pub mod variables;

pub use entities::{
    BudgetRange, Candidate, Comparison, FetchMeta, Outcome, PairHistory, PairKey, RankHistory,
    RankSnapshot, RoomConditions, RoomState, UserVotes, VoteBook, VoteEntry,
};
pub use ids::{CandidateId, IdError, RoomId, UserId};
pub use rng::DrawRng;
pub use variables::{EngineParams, ParamsError, SetSize, WriteMode, NG_SCORE};
