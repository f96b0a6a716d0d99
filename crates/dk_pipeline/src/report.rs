//! Result payload: the group ranking joined back to candidate records.

use dk_algo::tabulation::Ranking;
use dk_core::{Candidate, CandidateId, RoomState};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRow {
    pub candidate: Candidate,
    pub avg_score: f64,
    pub rated_count: usize,
    pub penalty_applied: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AAnalysis {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_a_score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoomResult {
    pub candidates: Vec<ResultRow>,
    pub is_decided: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_id: Option<CandidateId>,
    pub is_voting_complete: bool,
    pub a_analysis: AAnalysis,
}

pub fn build_result(room: &RoomState, ranking: &Ranking) -> RoomResult {
    let candidates = ranking
        .rows
        .iter()
        .filter_map(|row| {
            room.candidate(&row.id).map(|c| ResultRow {
                candidate: c.clone(),
                avg_score: row.avg_score,
                rated_count: row.rated_count,
                penalty_applied: row.penalty_applied,
            })
        })
        .collect();

    RoomResult {
        candidates,
        is_decided: room.is_decided(),
        decided_id: room.decided_id.clone(),
        is_voting_complete: voting_complete(room),
        a_analysis: AAnalysis {
            exists: ranking.analysis.exists(),
            max_a_score: ranking.analysis.max_score,
        },
    }
}

/// Every participant holds an entry (rejections included) for every pooled candidate.
pub fn voting_complete(room: &RoomState) -> bool {
    if room.candidates.is_empty() || room.participants.is_empty() {
        return false;
    }
    room.participants.iter().all(|user| {
        room.votes
            .get(user)
            .is_some_and(|v| room.candidates.iter().all(|c| v.contains_key(&c.id)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dk_core::{RoomConditions, VoteEntry};

    #[test]
    fn completion_needs_every_entry() {
        let mut room = RoomState::new("r".parse().unwrap(), RoomConditions::default(), 0);
        assert!(!voting_complete(&room));

        for id in ["S1", "S2"] {
            room.candidates.push(Candidate::new(id.parse().unwrap(), id));
        }
        let u: dk_core::UserId = "u".parse().unwrap();
        room.note_participant(&u);
        room.votes
            .entry(u.clone())
            .or_default()
            .insert("S1".parse().unwrap(), VoteEntry::first(80));
        assert!(!voting_complete(&room));

        room.votes
            .entry(u)
            .or_default()
            .insert("S2".parse().unwrap(), VoteEntry::rejected(dk_core::NG_SCORE));
        assert!(voting_complete(&room));
    }
}
