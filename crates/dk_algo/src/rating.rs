//! Elo ratings recomputed from a user's full comparison log.
//!
//! Every unexcluded candidate starts at `elo_base`; comparisons replay in
//! recorded order and update both sides by `K * (actual - expected)`. No state
//! is kept between calls, so the same log always yields the same ratings.
//!
//! The top-K helpers use a total order (rating desc, id asc).

use std::collections::{BTreeMap, BTreeSet};

use dk_core::determinism::cmp_score_desc_id_asc;
use dk_core::{CandidateId, Comparison, EngineParams, Outcome, PairKey};

pub type Ratings = BTreeMap<CandidateId, f64>;

/// Rating engine configured from `EngineParams`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EloModel {
    base: f64,
    k: f64,
}

impl EloModel {
    pub fn new(base: f64, k: f64) -> Self {
        Self { base, k }
    }

    pub fn from_params(params: &EngineParams) -> Self {
        Self::new(params.elo_base, params.elo_k)
    }

    pub fn compute_ratings(
        &self,
        candidate_ids: &[CandidateId],
        comparisons: &[Comparison],
        excluded: &BTreeSet<CandidateId>,
    ) -> Ratings {
        let mut ratings: Ratings = candidate_ids
            .iter()
            .filter(|id| !excluded.contains(*id))
            .map(|id| (id.clone(), self.base))
            .collect();

        for c in comparisons {
            let (Some(&ra), Some(&rb)) = (ratings.get(&c.a), ratings.get(&c.b)) else {
                continue;
            };
            let ea = expected_score(ra, rb);
            let eb = expected_score(rb, ra);
            let (sa, sb) = match c.result {
                Outcome::A => (1.0, 0.0),
                Outcome::B => (0.0, 1.0),
                Outcome::Tie => (0.5, 0.5),
            };
            ratings.insert(c.a.clone(), ra + self.k * (sa - ea));
            ratings.insert(c.b.clone(), rb + self.k * (sb - eb));
        }
        ratings
    }
}

/// Logistic expected score of `ra` against `rb`.
#[inline]
pub fn expected_score(ra: f64, rb: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rb - ra) / 400.0))
}

/// All rated candidates in canonical order.
pub fn sorted_by_rating(ratings: &Ratings) -> Vec<(CandidateId, f64)> {
    let mut rows: Vec<(CandidateId, f64)> =
        ratings.iter().map(|(id, r)| (id.clone(), *r)).collect();
    rows.sort_by(|x, y| cmp_score_desc_id_asc((&x.0, x.1), (&y.0, y.1)));
    rows
}

/// First `k` ids in canonical order; length is `min(k, ratings.len())`.
pub fn top_k(ratings: &Ratings, k: usize) -> Vec<CandidateId> {
    sorted_by_rating(ratings)
        .into_iter()
        .take(k)
        .map(|(id, _)| id)
        .collect()
}

/// Gap between the k-th and (k+1)-th ratings; `None` without k+1 rated ids.
pub fn boundary_delta(ratings: &Ratings, k: usize) -> Option<f64> {
    if k == 0 || ratings.len() <= k {
        return None;
    }
    let sorted = sorted_by_rating(ratings);
    Some(sorted[k - 1].1 - sorted[k].1)
}

fn compared_pairs(comparisons: &[Comparison]) -> BTreeSet<PairKey> {
    comparisons.iter().map(Comparison::key).collect()
}

/// Pairs within `top` never compared yet, in (i < j) order of `top`.
pub fn missing_top_pairs(top: &[CandidateId], comparisons: &[Comparison]) -> Vec<PairKey> {
    let seen = compared_pairs(comparisons);
    let mut out = Vec::new();
    for i in 0..top.len() {
        for j in (i + 1)..top.len() {
            let key = PairKey::new(top[i].clone(), top[j].clone());
            if !seen.contains(&key) {
                out.push(key);
            }
        }
    }
    out
}

/// Pairs crossing `top` × `next` never compared yet.
pub fn boundary_pairs(
    top: &[CandidateId],
    next: &[CandidateId],
    comparisons: &[Comparison],
) -> Vec<PairKey> {
    let seen = compared_pairs(comparisons);
    let mut out = Vec::new();
    for a in top {
        for b in next {
            if a == b {
                continue;
            }
            let key = PairKey::new(a.clone(), b.clone());
            if !seen.contains(&key) {
                out.push(key);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(s: &str) -> CandidateId {
        s.parse().unwrap()
    }

    fn ids(xs: &[&str]) -> Vec<CandidateId> {
        xs.iter().map(|s| cid(s)).collect()
    }

    fn cmp(a: &str, b: &str, result: Outcome) -> Comparison {
        Comparison { a: cid(a), b: cid(b), result }
    }

    fn model() -> EloModel {
        EloModel::from_params(&EngineParams::default())
    }

    #[test]
    fn expected_is_half_at_equal_ratings() {
        assert!((expected_score(1000.0, 1000.0) - 0.5).abs() < 1e-12);
        assert!(expected_score(1200.0, 1000.0) > 0.75);
    }

    #[test]
    fn single_win_moves_by_half_k() {
        let r = model().compute_ratings(
            &ids(&["a", "b"]),
            &[cmp("a", "b", Outcome::A)],
            &BTreeSet::new(),
        );
        assert!((r[&cid("a")] - 1024.0).abs() < 1e-9);
        assert!((r[&cid("b")] - 976.0).abs() < 1e-9);
    }

    #[test]
    fn tie_between_equals_changes_nothing() {
        let r = model().compute_ratings(
            &ids(&["a", "b"]),
            &[cmp("a", "b", Outcome::Tie)],
            &BTreeSet::new(),
        );
        assert_eq!(r[&cid("a")], 1000.0);
        assert_eq!(r[&cid("b")], 1000.0);
    }

    #[test]
    fn excluded_and_unknown_sides_are_skipped() {
        let excluded: BTreeSet<_> = [cid("b")].into_iter().collect();
        let r = model().compute_ratings(
            &ids(&["a", "b", "c"]),
            &[cmp("a", "b", Outcome::A), cmp("a", "zz", Outcome::A)],
            &excluded,
        );
        assert!(!r.contains_key(&cid("b")));
        assert_eq!(r[&cid("a")], 1000.0);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn replay_is_deterministic_and_order_dependent() {
        let log = [
            cmp("a", "b", Outcome::A),
            cmp("b", "c", Outcome::A),
            cmp("c", "a", Outcome::Tie),
        ];
        let all = ids(&["a", "b", "c"]);
        let m = model();
        let r1 = m.compute_ratings(&all, &log, &BTreeSet::new());
        let r2 = m.compute_ratings(&all, &log, &BTreeSet::new());
        assert_eq!(r1, r2);

        let reversed: Vec<_> = log.iter().rev().cloned().collect();
        let r3 = m.compute_ratings(&all, &reversed, &BTreeSet::new());
        assert_ne!(r1, r3);
    }

    #[test]
    fn top_k_tie_breaks_by_id_and_clamps_length() {
        let r = model().compute_ratings(&ids(&["c", "b", "a"]), &[], &BTreeSet::new());
        assert_eq!(top_k(&r, 2), ids(&["a", "b"]));
        assert_eq!(top_k(&r, 10).len(), 3);
    }

    #[test]
    fn boundary_delta_needs_k_plus_one() {
        let r = model().compute_ratings(
            &ids(&["a", "b"]),
            &[cmp("a", "b", Outcome::A)],
            &BTreeSet::new(),
        );
        assert_eq!(boundary_delta(&r, 2), None);
        let d = boundary_delta(&r, 1).unwrap();
        assert!((d - 48.0).abs() < 1e-9);
    }

    #[test]
    fn missing_and_boundary_pairs() {
        let log = [cmp("b", "a", Outcome::A)];
        let missing = missing_top_pairs(&ids(&["a", "b", "c"]), &log);
        let names: Vec<String> = missing.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["a|c", "b|c"]);

        let cross = boundary_pairs(&ids(&["a"]), &ids(&["b", "d"]), &log);
        let names: Vec<String> = cross.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["a|d"]);
    }
}
