//! Group ranking over every user's votes.
//!
//! Inputs:
//! - `pool`: the room's candidates
//! - `votes`: all users' `VoteEntry` aggregates
//! - `comparisons`: all users' comparison logs (pooled Elo tie-break)
//! - `min_common`: minimum number of raters before a candidate may rank
//!
//! Output:
//! - `Ranking { rows, analysis }`, rows in final order
//!
//! Rules in this layer:
//! - A candidate's score is the mean over its raters of each rater's own average.
//! - Rejected entries never count as a rating.
//! - Order: unpenalized first, score desc, pooled rating desc, id asc.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use dk_core::{Candidate, CandidateId, Comparison, EngineParams, UserId, VoteBook};

use crate::penalty::{PenaltyAnalysis, PenaltyPolicy};
use crate::rating::EloModel;

#[derive(Clone, Debug, PartialEq)]
pub struct RankedCandidate {
    pub id: CandidateId,
    pub avg_score: f64,
    pub rated_count: usize,
    pub penalty_applied: bool,
    /// Pooled Elo rating over all users' comparisons.
    pub rating: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ranking {
    pub rows: Vec<RankedCandidate>,
    pub analysis: PenaltyAnalysis,
}

impl Ranking {
    #[inline]
    pub fn top(&self) -> Option<&RankedCandidate> {
        self.rows.first()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Users holding at least one entry.
pub fn participant_count(votes: &VoteBook) -> usize {
    votes.values().filter(|v| !v.is_empty()).count()
}

/// `max(1, round(ratio * participants))`.
pub fn min_common(participants: usize, ratio: f64) -> usize {
    let n = (participants as f64 * ratio).round();
    if n.is_finite() && n >= 1.0 {
        n as usize
    } else {
        1
    }
}

pub fn rank(
    pool: &[Candidate],
    votes: &VoteBook,
    comparisons: &BTreeMap<UserId, Vec<Comparison>>,
    min_common: usize,
    policy: &dyn PenaltyPolicy,
    params: &EngineParams,
) -> Ranking {
    let analysis = policy.analyze(votes);

    let ids: Vec<CandidateId> = pool.iter().map(|c| c.id.clone()).collect();
    let pooled: Vec<Comparison> = comparisons.values().flatten().cloned().collect();
    let ratings = EloModel::from_params(params).compute_ratings(&ids, &pooled, &BTreeSet::new());

    let mut rows: Vec<RankedCandidate> = Vec::new();
    for id in &ids {
        let avgs: Vec<f64> = votes
            .values()
            .filter_map(|v| v.get(id).and_then(|e| e.average()))
            .collect();
        if avgs.is_empty() || avgs.len() < min_common {
            continue;
        }
        rows.push(RankedCandidate {
            id: id.clone(),
            avg_score: avgs.iter().sum::<f64>() / avgs.len() as f64,
            rated_count: avgs.len(),
            penalty_applied: policy.is_penalized(&analysis, id, votes),
            rating: ratings.get(id).copied().unwrap_or(params.elo_base),
        });
    }

    rows.sort_by(cmp_rows);
    Ranking { rows, analysis }
}

fn cmp_rows(x: &RankedCandidate, y: &RankedCandidate) -> Ordering {
    x.penalty_applied
        .cmp(&y.penalty_applied)
        .then_with(|| y.avg_score.total_cmp(&x.avg_score))
        .then_with(|| y.rating.total_cmp(&x.rating))
        .then_with(|| x.id.cmp(&y.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penalty::{NoPenalty, OutlierNegativeVoter};
    use dk_core::{Outcome, VoteEntry, NG_SCORE};

    fn pool(ids: &[&str]) -> Vec<Candidate> {
        ids.iter().map(|s| Candidate::new(s.parse().unwrap(), *s)).collect()
    }

    fn put(b: &mut VoteBook, u: &str, c: &str, e: VoteEntry) {
        b.entry(u.parse().unwrap()).or_default().insert(c.parse().unwrap(), e);
    }

    fn order(r: &Ranking) -> Vec<&str> {
        r.rows.iter().map(|row| row.id.as_str()).collect()
    }

    #[test]
    fn min_common_rounds_and_floors_at_one() {
        assert_eq!(min_common(0, 0.3), 1);
        assert_eq!(min_common(1, 0.3), 1);
        assert_eq!(min_common(7, 0.3), 2);
        assert_eq!(min_common(10, 0.3), 3);
    }

    #[test]
    fn rejected_candidate_never_ranks() {
        let mut b = VoteBook::new();
        put(&mut b, "u", "S1", VoteEntry::first(90));
        put(&mut b, "u", "S2", VoteEntry::rejected(NG_SCORE));
        put(&mut b, "u", "S3", VoteEntry::first(50));
        let r = rank(&pool(&["S1", "S2", "S3"]), &b, &BTreeMap::new(), 1, &NoPenalty, &EngineParams::default());
        assert_eq!(order(&r), ["S1", "S3"]);
    }

    #[test]
    fn min_common_filters_thinly_rated() {
        let mut b = VoteBook::new();
        put(&mut b, "u1", "a", VoteEntry::first(90));
        put(&mut b, "u1", "b", VoteEntry::first(60));
        put(&mut b, "u2", "b", VoteEntry::first(70));
        let r = rank(&pool(&["a", "b"]), &b, &BTreeMap::new(), 2, &NoPenalty, &EngineParams::default());
        assert_eq!(order(&r), ["b"]);
        assert_eq!(r.rows[0].rated_count, 2);
        assert!((r.rows[0].avg_score - 65.0).abs() < 1e-12);
    }

    #[test]
    fn equal_scores_fall_back_to_pooled_rating() {
        let mut b = VoteBook::new();
        put(&mut b, "u", "a", VoteEntry::first(80));
        put(&mut b, "u", "b", VoteEntry::first(80));
        let mut logs = BTreeMap::new();
        logs.insert(
            "u".parse().unwrap(),
            vec![Comparison { a: "a".parse().unwrap(), b: "b".parse().unwrap(), result: Outcome::B }],
        );
        let r = rank(&pool(&["a", "b"]), &b, &logs, 1, &NoPenalty, &EngineParams::default());
        assert_eq!(order(&r), ["b", "a"]);
    }

    #[test]
    fn penalized_candidates_sink() {
        let mut b = VoteBook::new();
        for (u, x, y) in [("u1", 95, 70), ("u2", 95, 70), ("hard", 20, 60)] {
            put(&mut b, u, "x", VoteEntry::first(x));
            put(&mut b, u, "y", VoteEntry::first(y));
        }
        let params = EngineParams::default();
        let policy = OutlierNegativeVoter::from_params(&params);
        let r = rank(&pool(&["x", "y"]), &b, &BTreeMap::new(), 1, &policy, &params);
        // x averages 70 against y's 66.7 but carries the flagged user's low vote
        assert_eq!(order(&r), ["y", "x"]);
        assert!(r.rows[1].penalty_applied);
        assert!(r.analysis.exists());
    }
}
