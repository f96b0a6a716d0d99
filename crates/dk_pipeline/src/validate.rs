//! Vote submission shape and the checks that run before any state is touched.

use std::collections::BTreeSet;

use dk_core::{CandidateId, RoomState, UserId};
use serde::{Deserialize, Serialize};

use crate::{PipelineError, PipelineResult};

/// Largest set a single submission may score.
pub const MAX_ITEMS: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteItem {
    pub candidate_id: CandidateId,
    pub score: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSubmission {
    pub user_id: UserId,
    pub items: Vec<VoteItem>,
}

impl VoteSubmission {
    pub fn new(user_id: UserId, items: impl IntoIterator<Item = (CandidateId, i64)>) -> Self {
        Self {
            user_id,
            items: items
                .into_iter()
                .map(|(candidate_id, score)| VoteItem { candidate_id, score })
                .collect(),
        }
    }

    pub fn pairs(&self) -> Vec<(CandidateId, i64)> {
        self.items
            .iter()
            .map(|i| (i.candidate_id.clone(), i.score))
            .collect()
    }
}

/// Shape checks: 1..=3 items, no candidate twice.
pub fn check_shape(sub: &VoteSubmission) -> PipelineResult<()> {
    if sub.items.is_empty() {
        return Err(PipelineError::InvalidInput("votes are required".into()));
    }
    if sub.items.len() > MAX_ITEMS {
        return Err(PipelineError::InvalidInput(format!(
            "at most {MAX_ITEMS} votes per submission, got {}",
            sub.items.len()
        )));
    }
    let mut seen = BTreeSet::new();
    for item in &sub.items {
        if !seen.insert(&item.candidate_id) {
            return Err(PipelineError::InvalidInput(format!(
                "candidate {} voted twice in one submission",
                item.candidate_id
            )));
        }
    }
    Ok(())
}

/// Every voted id must be in the room's pool.
pub fn check_known(sub: &VoteSubmission, room: &RoomState) -> PipelineResult<()> {
    match sub.items.iter().find(|i| room.candidate(&i.candidate_id).is_none()) {
        Some(unknown) => Err(PipelineError::InvalidInput(format!(
            "candidate {} is not in room {}",
            unknown.candidate_id, room.id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dk_core::{Candidate, RoomConditions};

    fn sub(ids: &[&str]) -> VoteSubmission {
        VoteSubmission::new(
            "u1".parse().unwrap(),
            ids.iter().map(|id| (id.parse().unwrap(), 50)),
        )
    }

    #[test]
    fn shape_rules() {
        assert!(check_shape(&sub(&["S1"])).is_ok());
        assert!(check_shape(&sub(&["S1", "S2", "S3"])).is_ok());
        assert!(matches!(check_shape(&sub(&[])), Err(PipelineError::InvalidInput(_))));
        assert!(check_shape(&sub(&["S1", "S2", "S3", "S4"])).is_err());
        assert!(check_shape(&sub(&["S1", "S1"])).is_err());
    }

    #[test]
    fn unknown_candidates_rejected() {
        let mut room = RoomState::new("r".parse().unwrap(), RoomConditions::default(), 0);
        room.candidates.push(Candidate::new("S1".parse().unwrap(), "one"));
        assert!(check_known(&sub(&["S1"]), &room).is_ok());
        assert!(check_known(&sub(&["S1", "S9"]), &room).is_err());
    }
}
