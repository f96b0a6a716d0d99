//! Auto-decision over the trailing rank-history window.
//!
//! A snapshot is recorded after each vote submission whenever the ranking has
//! at least two rows. The room is decided once the window holds `R`
//! snapshots that all agree on top-1 and all clear the confidence margin.

use dk_core::{CandidateId, EngineParams, RankHistory, RankSnapshot};

use crate::tabulation::ranking::Ranking;

/// Window length and margin, taken from `EngineParams`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecisionRule {
    pub window: usize,
    pub margin: f64,
}

impl DecisionRule {
    pub fn from_params(params: &EngineParams) -> Self {
        Self {
            window: params.decision_rounds,
            margin: params.decision_margin,
        }
    }
}

/// Top-1/top-2 snapshot of `ranking`; `None` with fewer than two rows.
pub fn snapshot(ranking: &Ranking, timestamp_ms: u64) -> Option<RankSnapshot> {
    let [first, second, ..] = ranking.rows.as_slice() else {
        return None;
    };
    Some(RankSnapshot {
        timestamp_ms,
        top1: first.id.clone(),
        top2: second.id.clone(),
        score_diff: first.avg_score - second.avg_score,
    })
}

/// Record the current ranking and report the decided candidate, if any.
pub fn check_auto_decision(
    history: &mut RankHistory,
    ranking: &Ranking,
    timestamp_ms: u64,
    rule: DecisionRule,
) -> Option<CandidateId> {
    if let Some(s) = snapshot(ranking, timestamp_ms) {
        history.push(s, rule.window);
    }
    decided_from(history, rule)
}

/// Pure window test without recording.
pub fn decided_from(history: &RankHistory, rule: DecisionRule) -> Option<CandidateId> {
    let window = history.as_slice();
    if rule.window == 0 || window.len() < rule.window {
        return None;
    }
    let first = &window[0].top1;
    let stable = window
        .iter()
        .all(|s| &s.top1 == first && s.score_diff > rule.margin);
    stable.then(|| first.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabulation::ranking::RankedCandidate;

    fn ranking(rows: &[(&str, f64)]) -> Ranking {
        Ranking {
            rows: rows
                .iter()
                .map(|(id, avg)| RankedCandidate {
                    id: id.parse().unwrap(),
                    avg_score: *avg,
                    rated_count: 1,
                    penalty_applied: false,
                    rating: 1000.0,
                })
                .collect(),
            analysis: Default::default(),
        }
    }

    const RULE: DecisionRule = DecisionRule { window: 5, margin: 10.0 };

    #[test]
    fn never_fires_before_window_is_full() {
        let mut h = RankHistory::default();
        let r = ranking(&[("S1", 90.0), ("S2", 40.0)]);
        for t in 0..4 {
            assert_eq!(check_auto_decision(&mut h, &r, t, RULE), None);
        }
        assert_eq!(check_auto_decision(&mut h, &r, 4, RULE), Some("S1".parse().unwrap()));
    }

    #[test]
    fn margin_must_be_cleared_every_round() {
        let mut h = RankHistory::default();
        let wide = ranking(&[("S1", 90.0), ("S2", 40.0)]);
        let narrow = ranking(&[("S1", 50.0), ("S2", 45.0)]);
        for t in 0..4 {
            check_auto_decision(&mut h, &wide, t, RULE);
        }
        assert_eq!(check_auto_decision(&mut h, &narrow, 4, RULE), None);
        // narrow snapshot slides out after five more wide rounds
        for t in 5..9 {
            assert_eq!(check_auto_decision(&mut h, &wide, t, RULE), None);
        }
        assert!(check_auto_decision(&mut h, &wide, 9, RULE).is_some());
    }

    #[test]
    fn leader_change_resets_agreement() {
        let mut h = RankHistory::default();
        let a = ranking(&[("S1", 90.0), ("S2", 40.0)]);
        let b = ranking(&[("S2", 90.0), ("S1", 40.0)]);
        for t in 0..4 {
            check_auto_decision(&mut h, &a, t, RULE);
        }
        assert_eq!(check_auto_decision(&mut h, &b, 4, RULE), None);
    }

    #[test]
    fn single_row_rankings_are_not_recorded() {
        let mut h = RankHistory::default();
        let r = ranking(&[("S1", 90.0)]);
        for t in 0..10 {
            assert_eq!(check_auto_decision(&mut h, &r, t, RULE), None);
        }
        assert!(h.is_empty());
    }

    #[test]
    fn margin_is_strict() {
        let mut h = RankHistory::default();
        let r = ranking(&[("S1", 60.0), ("S2", 50.0)]);
        for t in 0..5 {
            assert_eq!(check_auto_decision(&mut h, &r, t, RULE), None);
        }
    }
}
