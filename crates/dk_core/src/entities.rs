//! Room document entities: candidates, vote aggregates, comparisons, bounded
//! histories, and the room state that ties them together.
//!
//! Everything here is plain data plus small invariant-preserving helpers.
//! Algorithms that read these types live in `dk_algo`.

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{CandidateId, RoomId, UserId};
use crate::variables::NG_SCORE;

/* ---------------------------------- Candidates --------------------------------- */

/// A venue in the room's pool. Owned by the candidate source; read-only here.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub genre: Option<String>,
    /// Free-form budget label, e.g. "2001～3000円".
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub budget: Option<String>,
    /// Display metadata (address, photo url, ...). Never read by the engine.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "BTreeMap::is_empty"))]
    pub meta: BTreeMap<String, String>,
}

impl Candidate {
    pub fn new(id: CandidateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            genre: None,
            budget: None,
            meta: BTreeMap::new(),
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_budget(mut self, budget: impl Into<String>) -> Self {
        self.budget = Some(budget.into());
        self
    }
}

/* --------------------------------- Vote entries -------------------------------- */

/// Running per-(user, candidate) aggregate.
///
/// Invariant: `ng == true` implies `sum == 0 && count == 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct VoteEntry {
    pub sum: i64,
    pub count: u32,
    pub last_score: i64,
    pub ng: bool,
}

impl VoteEntry {
    /// The rejected form; always `{0, 0, last, ng}`.
    #[inline]
    pub const fn rejected(last_score: i64) -> Self {
        Self {
            sum: 0,
            count: 0,
            last_score,
            ng: true,
        }
    }

    /// A fresh aggregate holding a single score.
    #[inline]
    pub const fn first(score: i64) -> Self {
        Self {
            sum: score,
            count: 1,
            last_score: score,
            ng: false,
        }
    }

    /// Stored entries used to be bare numbers; normalize them.
    pub const fn from_legacy(score: i64) -> Self {
        if score == NG_SCORE {
            Self::rejected(score)
        } else {
            Self::first(score)
        }
    }

    /// `true` when the entry contributes a usable average.
    #[inline]
    pub const fn is_rated(&self) -> bool {
        !self.ng && self.count > 0
    }

    /// `sum / count`, undefined (None) for rejected or empty entries.
    pub fn average(&self) -> Option<f64> {
        if self.is_rated() {
            Some(self.sum as f64 / f64::from(self.count))
        } else {
            None
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for VoteEntry {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Full {
            sum: i64,
            count: u32,
            last_score: i64,
            #[serde(default)]
            ng: bool,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Bare(i64),
            Full(Full),
        }

        Ok(match Wire::deserialize(d)? {
            Wire::Bare(n) => VoteEntry::from_legacy(n),
            Wire::Full(f) if f.ng => VoteEntry::rejected(f.last_score),
            Wire::Full(f) => VoteEntry {
                sum: f.sum,
                count: f.count,
                last_score: f.last_score,
                ng: false,
            },
        })
    }
}

/// One user's entries keyed by candidate.
pub type UserVotes = BTreeMap<CandidateId, VoteEntry>;
/// All users' entries in a room.
pub type VoteBook = BTreeMap<UserId, UserVotes>;

/* ---------------------------------- Comparisons -------------------------------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Outcome {
    A,
    B,
    Tie,
}

/// Pairwise outcome for one user; `result` names the winning side.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Comparison {
    pub a: CandidateId,
    pub b: CandidateId,
    pub result: Outcome,
}

impl Comparison {
    #[inline]
    pub fn key(&self) -> PairKey {
        PairKey::new(self.a.clone(), self.b.clone())
    }
}

/// Unordered candidate pair, stored as (lo, hi) by id order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PairKey {
    lo: CandidateId,
    hi: CandidateId,
}

impl PairKey {
    pub fn new(a: CandidateId, b: CandidateId) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    #[inline]
    pub fn lo(&self) -> &CandidateId {
        &self.lo
    }

    #[inline]
    pub fn hi(&self) -> &CandidateId {
        &self.hi
    }

    #[inline]
    pub fn contains(&self, id: &CandidateId) -> bool {
        &self.lo == id || &self.hi == id
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.lo, self.hi)
    }
}

/// All unordered pairs of a comparison set, in set order (i < j).
pub fn sub_pairs(set: &[CandidateId]) -> Vec<PairKey> {
    let mut out = Vec::with_capacity(set.len() * set.len().saturating_sub(1) / 2);
    for i in 0..set.len() {
        for j in (i + 1)..set.len() {
            out.push(PairKey::new(set[i].clone(), set[j].clone()));
        }
    }
    out
}

/* ------------------------------- Bounded histories ------------------------------ */

/// Recently co-presented pairs for one user, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PairHistory {
    pairs: VecDeque<PairKey>,
}

impl PairHistory {
    /// Append and evict from the front until `len <= capacity`.
    pub fn push(&mut self, pair: PairKey, capacity: usize) {
        self.pairs.push_back(pair);
        while self.pairs.len() > capacity {
            self.pairs.pop_front();
        }
    }

    #[inline]
    pub fn contains(&self, pair: &PairKey) -> bool {
        self.pairs.iter().any(|p| p == pair)
    }

    /// `true` when any pair of `set` was shown recently.
    pub fn overlaps(&self, set: &[CandidateId]) -> bool {
        sub_pairs(set).iter().any(|p| self.contains(p))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PairKey> {
        self.pairs.iter()
    }
}

/// Top-of-ranking snapshot taken after a vote submission.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RankSnapshot {
    pub timestamp_ms: u64,
    pub top1: CandidateId,
    pub top2: CandidateId,
    pub score_diff: f64,
}

/// Room-wide trailing window of snapshots, oldest first.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RankHistory {
    snapshots: Vec<RankSnapshot>,
}

impl RankHistory {
    /// Append and keep only the most recent `window` snapshots.
    pub fn push(&mut self, snapshot: RankSnapshot, window: usize) {
        self.snapshots.push(snapshot);
        if self.snapshots.len() > window {
            let excess = self.snapshots.len() - window;
            self.snapshots.drain(..excess);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[RankSnapshot] {
        &self.snapshots
    }
}

/* ----------------------------------- Room ----------------------------------- */

/// Inclusive yen range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BudgetRange {
    pub min: u32,
    pub max: u32,
}

impl BudgetRange {
    #[inline]
    pub const fn overlaps(&self, other: &BudgetRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Search conditions fixed at room creation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoomConditions {
    pub area: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub budget_min: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub budget_max: Option<u32>,
}

impl RoomConditions {
    #[inline]
    pub fn has_budget(&self) -> bool {
        self.budget_min.is_some() || self.budget_max.is_some()
    }
}

/// How the current candidate pool was obtained.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FetchMeta {
    pub fetched_count: usize,
    pub filtered_count: usize,
    pub candidate_pool_count: usize,
    pub budget_codes: Vec<String>,
    pub budget_filter_used: bool,
    pub fallback_used: bool,
    pub range: Option<BudgetRange>,
}

/// The whole shared room document.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoomState {
    pub id: RoomId,
    pub conditions: RoomConditions,
    pub created_at_ms: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub candidates: Vec<Candidate>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub fetch_meta: Option<FetchMeta>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub votes: VoteBook,
    /// Users in order of their first vote.
    #[cfg_attr(feature = "serde", serde(default))]
    pub participants: Vec<UserId>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub comparisons: BTreeMap<UserId, Vec<Comparison>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pair_history: BTreeMap<UserId, PairHistory>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rank_history: RankHistory,
    #[cfg_attr(feature = "serde", serde(default))]
    pub decided_id: Option<CandidateId>,
}

impl RoomState {
    pub fn new(id: RoomId, conditions: RoomConditions, created_at_ms: u64) -> Self {
        Self {
            id,
            conditions,
            created_at_ms,
            candidates: Vec::new(),
            fetch_meta: None,
            votes: BTreeMap::new(),
            participants: Vec::new(),
            comparisons: BTreeMap::new(),
            pair_history: BTreeMap::new(),
            rank_history: RankHistory::default(),
            decided_id: None,
        }
    }

    #[inline]
    pub fn is_decided(&self) -> bool {
        self.decided_id.is_some()
    }

    pub fn candidate(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.id == id)
    }

    pub fn candidate_ids(&self) -> Vec<CandidateId> {
        self.candidates.iter().map(|c| c.id.clone()).collect()
    }

    /// Number of candidates this user has any entry for (rejections included).
    pub fn evaluated_count(&self, user: &UserId) -> usize {
        self.votes.get(user).map_or(0, |v| v.len())
    }

    /// Candidates this user marked NG.
    pub fn rejected_by(&self, user: &UserId) -> BTreeSet<CandidateId> {
        self.votes
            .get(user)
            .map(|v| {
                v.iter()
                    .filter(|(_, e)| e.ng)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn user_comparisons(&self, user: &UserId) -> &[Comparison] {
        self.comparisons.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record `user` as a participant if not yet present.
    pub fn note_participant(&mut self, user: &UserId) {
        if !self.participants.contains(user) {
            self.participants.push(user.clone());
        }
    }
}
