//! Engine parameters: every tunable constant of the rating, sampling,
//! orchestration, and decision layers in one immutable struct.
//!
//! `EngineParams::default()` carries the production values. A params file may
//! override any subset; `validate_domains` must pass before the struct is
//! handed to the engine.

use alloc::format;
use alloc::string::String;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reserved vote value meaning "never show this candidate again".
pub const NG_SCORE: i64 = -999;

/// Number of candidates shown per comparison request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SetSize {
    Pair,
    Triplet,
}

impl SetSize {
    #[inline]
    pub const fn len(self) -> usize {
        match self {
            SetSize::Pair => 2,
            SetSize::Triplet => 3,
        }
    }
}

/// How room documents are written back after a mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WriteMode {
    /// Plain get/set; a concurrent writer may overwrite an earlier update.
    LastWriterWins,
    /// Compare-and-set on the stored version stamp, re-applying on conflict.
    Versioned,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineParams {
    /* ---- Elo ---- */
    pub elo_base: f64,
    pub elo_k: f64,
    pub top_target_count: usize,
    pub top_focus_count: usize,
    pub top_boundary_delta: f64,
    pub top_missing_pair_limit: usize,

    /* ---- Orchestrator ---- */
    pub set_size: SetSize,
    pub pair_history_capacity: usize,
    pub history_retries: u32,

    /* ---- Genre sampler ---- */
    pub negative_score_threshold: f64,
    pub positive_score_threshold: f64,
    pub user_neg_weight: f64,
    pub user_pos_weight: f64,
    pub global_pos_weight: f64,
    pub min_genre_weight: f64,
    pub max_genre_weight: f64,

    /* ---- Candidate pool / room lifetime ---- */
    pub candidate_pool_size: usize,
    pub room_ttl_secs: u64,

    /* ---- Ranking & decision ---- */
    pub min_common_ratio: f64,
    pub decision_rounds: usize,   // trailing window R
    pub decision_margin: f64,     // top1 - top2 average gap that counts as confident
    pub outlier_min_participants: usize, // raters needed before one voter can be flagged

    /* ---- Store writes ---- */
    pub write_mode: WriteMode,
    pub cas_attempts: u32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            elo_base: 1000.0,
            elo_k: 48.0,
            top_target_count: 5,
            top_focus_count: 10,
            top_boundary_delta: 50.0,
            top_missing_pair_limit: 0,

            set_size: SetSize::Triplet,
            pair_history_capacity: 20,
            history_retries: 10,

            negative_score_threshold: 30.0,
            positive_score_threshold: 70.0,
            user_neg_weight: 0.35,
            user_pos_weight: 0.15,
            global_pos_weight: 0.1,
            min_genre_weight: 0.25,
            max_genre_weight: 1.6,

            candidate_pool_size: 50,
            room_ttl_secs: 24 * 60 * 60,

            min_common_ratio: 0.3,
            decision_rounds: 5,
            decision_margin: 10.0,
            outlier_min_participants: 3,

            write_mode: WriteMode::LastWriterWins,
            cas_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    Domain(String),
    Consistency(String),
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamsError::Domain(m) => write!(f, "domain: {m}"),
            ParamsError::Consistency(m) => write!(f, "consistency: {m}"),
        }
    }
}

pub type ParamsResult<T> = Result<T, ParamsError>;

fn finite_non_negative(name: &str, v: f64) -> ParamsResult<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(ParamsError::Domain(format!("{name} must be finite and >= 0, got {v}")))
    }
}

impl EngineParams {
    /// Validate numeric domains and cross-field consistency.
    pub fn validate_domains(&self) -> ParamsResult<()> {
        finite_non_negative("elo_base", self.elo_base)?;
        if !(self.elo_k.is_finite() && self.elo_k > 0.0) {
            return Err(ParamsError::Domain(format!("elo_k must be > 0, got {}", self.elo_k)));
        }
        finite_non_negative("top_boundary_delta", self.top_boundary_delta)?;
        if self.top_target_count == 0 {
            return Err(ParamsError::Domain("top_target_count must be >= 1".into()));
        }
        if self.pair_history_capacity == 0 {
            return Err(ParamsError::Domain("pair_history_capacity must be >= 1".into()));
        }
        if self.history_retries == 0 {
            return Err(ParamsError::Domain("history_retries must be >= 1".into()));
        }

        for (name, v) in [
            ("negative_score_threshold", self.negative_score_threshold),
            ("positive_score_threshold", self.positive_score_threshold),
            ("user_neg_weight", self.user_neg_weight),
            ("user_pos_weight", self.user_pos_weight),
            ("global_pos_weight", self.global_pos_weight),
            ("min_genre_weight", self.min_genre_weight),
            ("max_genre_weight", self.max_genre_weight),
            ("decision_margin", self.decision_margin),
        ] {
            finite_non_negative(name, v)?;
        }
        if self.min_genre_weight <= 0.0 {
            return Err(ParamsError::Domain("min_genre_weight must be > 0".into()));
        }
        if !(self.min_common_ratio > 0.0 && self.min_common_ratio <= 1.0) {
            return Err(ParamsError::Domain(format!(
                "min_common_ratio must be in (0, 1], got {}",
                self.min_common_ratio
            )));
        }
        if self.decision_rounds == 0 {
            return Err(ParamsError::Domain("decision_rounds must be >= 1".into()));
        }
        if self.outlier_min_participants < 2 {
            return Err(ParamsError::Domain(format!(
                "outlier_min_participants must be >= 2, got {}",
                self.outlier_min_participants
            )));
        }
        if self.room_ttl_secs == 0 {
            return Err(ParamsError::Domain("room_ttl_secs must be >= 1".into()));
        }
        if self.cas_attempts == 0 {
            return Err(ParamsError::Domain("cas_attempts must be >= 1".into()));
        }

        // --- Cross-field consistency ---

        if self.top_focus_count < self.top_target_count {
            return Err(ParamsError::Consistency(format!(
                "top_focus_count ({}) below top_target_count ({})",
                self.top_focus_count, self.top_target_count
            )));
        }
        if self.negative_score_threshold >= self.positive_score_threshold {
            return Err(ParamsError::Consistency(
                "negative_score_threshold must be below positive_score_threshold".into(),
            ));
        }
        if self.min_genre_weight > self.max_genre_weight {
            return Err(ParamsError::Consistency(
                "min_genre_weight exceeds max_genre_weight".into(),
            ));
        }
        if self.candidate_pool_size < self.set_size.len() {
            return Err(ParamsError::Consistency(format!(
                "candidate_pool_size ({}) cannot fill a {}-candidate set",
                self.candidate_pool_size,
                self.set_size.len()
            )));
        }
        Ok(())
    }
}
