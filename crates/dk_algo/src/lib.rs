// crates/dk_algo/src/lib.rs
#![forbid(unsafe_code)]

//! Algorithm layer. Pure functions over `dk_core` types: no I/O, no clocks;
//! randomness only through a caller-supplied `DrawRng`.

pub use dk_core::{CandidateId, UserId};

// ----------------------------- Tabulation (public surface) ---------------------------

pub mod tabulation {
    pub mod ranking;
    pub mod votes;

    pub use ranking::{min_common, participant_count, rank, RankedCandidate, Ranking};
    pub use votes::{apply_vote, build_comparisons};
}

// ----------------------------- Rating / sampling / rounds ----------------------------

pub mod budget;
pub mod decision;
pub mod penalty;
pub mod rating;
pub mod rounds;
pub mod sampling;

pub use decision::{check_auto_decision, DecisionRule};
pub use penalty::{NoPenalty, OutlierNegativeVoter, PenaltyAnalysis, PenaltyPolicy};
pub use rating::{EloModel, Ratings};
pub use rounds::{plan_next_set, record_shown, NextSet, RoundInput, RoundMode};
pub use sampling::{pick_weighted, GenreSampler, GenreStats};
pub use tabulation::{Ranking, RankedCandidate};
