//! Candidate source seam. The real search API lives behind this trait; the
//! engine only needs "give me up to `count` venues for this area".

use dk_core::Candidate;
use thiserror::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateQuery {
    pub area: String,
    /// Upstream budget codes (B001..); empty means unfiltered.
    pub budget_codes: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct SourceError(pub String);

pub trait CandidateSource: Send + Sync {
    /// May return duplicates, fewer than `count`, or nothing at all.
    fn fetch(&self, query: &CandidateQuery) -> Result<Vec<Candidate>, SourceError>;
}

/// Fixed in-memory list; ignores area and budget codes.
#[derive(Clone, Debug, Default)]
pub struct StaticSource {
    candidates: Vec<Candidate>,
}

impl StaticSource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }
}

impl CandidateSource for StaticSource {
    fn fetch(&self, query: &CandidateQuery) -> Result<Vec<Candidate>, SourceError> {
        Ok(self.candidates.iter().take(query.count).cloned().collect())
    }
}
