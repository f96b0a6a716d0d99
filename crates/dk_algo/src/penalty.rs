//! Negative-voter ("A") detection and the demotion it implies.
//!
//! The ranking pipeline only talks to [`PenaltyPolicy`]; swapping heuristics
//! does not touch ranking code.
//!
//! Default heuristic ([`OutlierNegativeVoter`]):
//! - needs at least `min_participants` users holding a rated entry
//! - each user's floor = lowest own-average score
//! - flagged user = the only one whose floor is at or below the negative
//!   threshold, while every other floor is above it
//! - a candidate is demoted when the flagged user rated it at or below the
//!   threshold and at least one other user rated it too

use dk_core::{CandidateId, EngineParams, UserId, VoteBook};

/// Outcome of a detection pass over the whole vote book.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PenaltyAnalysis {
    pub flagged: Option<UserId>,
    /// Highest own-average score of the flagged user.
    pub max_score: Option<f64>,
}

impl PenaltyAnalysis {
    #[inline]
    pub fn exists(&self) -> bool {
        self.flagged.is_some()
    }
}

pub trait PenaltyPolicy: Send + Sync {
    fn analyze(&self, votes: &VoteBook) -> PenaltyAnalysis;

    fn is_penalized(
        &self,
        analysis: &PenaltyAnalysis,
        candidate: &CandidateId,
        votes: &VoteBook,
    ) -> bool;
}

/// Never demotes anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPenalty;

impl PenaltyPolicy for NoPenalty {
    fn analyze(&self, _votes: &VoteBook) -> PenaltyAnalysis {
        PenaltyAnalysis::default()
    }

    fn is_penalized(&self, _: &PenaltyAnalysis, _: &CandidateId, _: &VoteBook) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlierNegativeVoter {
    negative_threshold: f64,
    min_participants: usize,
}

impl OutlierNegativeVoter {
    pub fn new(negative_threshold: f64, min_participants: usize) -> Self {
        Self {
            negative_threshold,
            min_participants,
        }
    }

    pub fn from_params(params: &EngineParams) -> Self {
        Self::new(params.negative_score_threshold, params.outlier_min_participants)
    }
}

impl PenaltyPolicy for OutlierNegativeVoter {
    fn analyze(&self, votes: &VoteBook) -> PenaltyAnalysis {
        // (user, floor, ceiling) over rated entries only
        let spans: Vec<(&UserId, f64, f64)> = votes
            .iter()
            .filter_map(|(user, entries)| {
                let avgs = entries.values().filter_map(|e| e.average());
                let (lo, hi) = avgs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), a| {
                    (lo.min(a), hi.max(a))
                });
                lo.is_finite().then_some((user, lo, hi))
            })
            .collect();

        if spans.len() < self.min_participants {
            return PenaltyAnalysis::default();
        }

        let mut low = spans
            .iter()
            .filter(|(_, floor, _)| *floor <= self.negative_threshold);
        match (low.next(), low.next()) {
            (Some((user, _, ceiling)), None) => PenaltyAnalysis {
                flagged: Some((*user).clone()),
                max_score: Some(*ceiling),
            },
            _ => PenaltyAnalysis::default(),
        }
    }

    fn is_penalized(
        &self,
        analysis: &PenaltyAnalysis,
        candidate: &CandidateId,
        votes: &VoteBook,
    ) -> bool {
        let Some(flagged) = &analysis.flagged else {
            return false;
        };
        let low_from_flagged = votes
            .get(flagged)
            .and_then(|v| v.get(candidate))
            .and_then(|e| e.average())
            .is_some_and(|a| a <= self.negative_threshold);
        if !low_from_flagged {
            return false;
        }
        votes.iter().any(|(user, entries)| {
            user != flagged && entries.get(candidate).is_some_and(|e| e.is_rated())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dk_core::VoteEntry;

    fn book(rows: &[(&str, &str, i64)]) -> VoteBook {
        let mut b = VoteBook::new();
        for (u, c, s) in rows {
            b.entry(u.parse().unwrap())
                .or_default()
                .insert(c.parse().unwrap(), VoteEntry::first(*s));
        }
        b
    }

    fn cid(s: &str) -> CandidateId {
        s.parse().unwrap()
    }

    #[test]
    fn single_low_floor_is_flagged() {
        let votes = book(&[
            ("u1", "x", 80), ("u1", "y", 60),
            ("u2", "x", 70), ("u2", "y", 50),
            ("hard", "x", 10), ("hard", "y", 55),
        ]);
        let policy = OutlierNegativeVoter::from_params(&EngineParams::default());
        let a = policy.analyze(&votes);
        assert_eq!(a.flagged, Some("hard".parse().unwrap()));
        assert_eq!(a.max_score, Some(55.0));
        assert!(policy.is_penalized(&a, &cid("x"), &votes));
        assert!(!policy.is_penalized(&a, &cid("y"), &votes));
    }

    #[test]
    fn two_low_floors_flag_nobody() {
        let votes = book(&[
            ("u1", "x", 20), ("u2", "x", 10), ("u3", "x", 90),
        ]);
        let a = OutlierNegativeVoter::from_params(&EngineParams::default()).analyze(&votes);
        assert!(!a.exists());
    }

    #[test]
    fn too_few_participants() {
        let votes = book(&[("u1", "x", 10), ("u2", "x", 90)]);
        let a = OutlierNegativeVoter::from_params(&EngineParams::default()).analyze(&votes);
        assert_eq!(a, PenaltyAnalysis::default());
    }

    #[test]
    fn group_size_comes_from_params() {
        let votes = book(&[("u1", "x", 10), ("u2", "x", 90)]);
        let params = EngineParams {
            outlier_min_participants: 2,
            ..EngineParams::default()
        };
        let a = OutlierNegativeVoter::from_params(&params).analyze(&votes);
        assert_eq!(a.flagged, Some("u1".parse().unwrap()));
    }

    #[test]
    fn candidate_only_rated_by_flagged_user_is_not_demoted() {
        let votes = book(&[
            ("u1", "x", 80), ("u2", "x", 70), ("hard", "x", 50), ("hard", "solo", 5),
        ]);
        let policy = OutlierNegativeVoter::from_params(&EngineParams::default());
        let a = policy.analyze(&votes);
        assert!(a.exists());
        assert!(!policy.is_penalized(&a, &cid("solo"), &votes));
    }
}
