//! Vote aggregation and comparison derivation.
//!
//! Inputs:
//! - a user's existing `VoteEntry` (if any) and a new score
//! - one submitted set of 2–3 `(candidate, score)` items
//!
//! Output:
//! - the replacement `VoteEntry` (caller persists it)
//! - pairwise `Comparison`s for every i < j pair of the set
//!
//! Rules in this layer:
//! - `NG_SCORE` always resets the entry to the rejected form.
//! - A rejected or absent entry restarts from the new score.
//! - Rejected loses to non-rejected; mutual rejection ties; equal scores tie.

use dk_core::{CandidateId, Comparison, Outcome, VoteEntry, NG_SCORE};

/// Fold one score into an existing aggregate.
pub fn apply_vote(existing: Option<&VoteEntry>, score: i64) -> VoteEntry {
    if score == NG_SCORE {
        return VoteEntry::rejected(score);
    }
    match existing {
        Some(e) if !e.ng => VoteEntry {
            sum: e.sum.saturating_add(score),
            count: e.count.saturating_add(1),
            last_score: score,
            ng: false,
        },
        _ => VoteEntry::first(score),
    }
}

/// Comparisons implied by one simultaneous submission. A single item yields none.
pub fn build_comparisons(items: &[(CandidateId, i64)]) -> Vec<Comparison> {
    let mut out = Vec::new();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let (a, sa) = &items[i];
            let (b, sb) = &items[j];
            out.push(Comparison {
                a: a.clone(),
                b: b.clone(),
                result: outcome(*sa, *sb),
            });
        }
    }
    out
}

fn outcome(sa: i64, sb: i64) -> Outcome {
    match (sa == NG_SCORE, sb == NG_SCORE) {
        (true, true) => Outcome::Tie,
        (true, false) => Outcome::B,
        (false, true) => Outcome::A,
        (false, false) => match sa.cmp(&sb) {
            core::cmp::Ordering::Greater => Outcome::A,
            core::cmp::Ordering::Less => Outcome::B,
            core::cmp::Ordering::Equal => Outcome::Tie,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cid(s: &str) -> CandidateId {
        s.parse().unwrap()
    }

    #[test]
    fn ng_resets_positive_aggregate() {
        let e = apply_vote(None, 80);
        let e = apply_vote(Some(&e), 60);
        assert_eq!((e.sum, e.count), (140, 2));
        let ng = apply_vote(Some(&e), NG_SCORE);
        assert_eq!(ng, VoteEntry { sum: 0, count: 0, last_score: NG_SCORE, ng: true });
    }

    #[test]
    fn vote_after_ng_starts_fresh() {
        let ng = apply_vote(None, NG_SCORE);
        let e = apply_vote(Some(&ng), 40);
        assert_eq!(e, VoteEntry::first(40));
    }

    #[test]
    fn triplet_yields_three_comparisons() {
        let items = [(cid("S1"), 90), (cid("S2"), NG_SCORE), (cid("S3"), 90)];
        let cs = build_comparisons(&items);
        assert_eq!(cs.len(), 3);
        assert_eq!(cs[0].result, Outcome::A); // S1 beats rejected S2
        assert_eq!(cs[1].result, Outcome::Tie); // S1 = S3
        assert_eq!(cs[2].result, Outcome::B); // rejected S2 loses to S3
    }

    #[test]
    fn mutual_rejection_ties() {
        let items = [(cid("x"), NG_SCORE), (cid("y"), NG_SCORE)];
        assert_eq!(build_comparisons(&items)[0].result, Outcome::Tie);
    }

    #[test]
    fn single_item_no_comparisons() {
        assert!(build_comparisons(&[(cid("x"), 10)]).is_empty());
    }

    proptest! {
        #[test]
        fn sum_and_count_accumulate(scores in proptest::collection::vec(0i64..=100, 1..30)) {
            let mut e: Option<VoteEntry> = None;
            for &s in &scores {
                e = Some(apply_vote(e.as_ref(), s));
            }
            let e = e.unwrap();
            prop_assert_eq!(e.sum, scores.iter().sum::<i64>());
            prop_assert_eq!(e.count as usize, scores.len());
            prop_assert_eq!(e.last_score, *scores.last().unwrap());
        }

        #[test]
        fn ng_anywhere_resets(prefix in proptest::collection::vec(0i64..=100, 0..10),
                              suffix in proptest::collection::vec(0i64..=100, 0..10)) {
            let mut e: Option<VoteEntry> = None;
            for &s in &prefix {
                e = Some(apply_vote(e.as_ref(), s));
            }
            let after_ng = apply_vote(e.as_ref(), NG_SCORE);
            prop_assert!(after_ng.ng);
            prop_assert_eq!((after_ng.sum, after_ng.count), (0, 0));
            let mut e = Some(after_ng);
            for &s in &suffix {
                e = Some(apply_vote(e.as_ref(), s));
            }
            let e = e.unwrap();
            if suffix.is_empty() {
                prop_assert!(e.ng);
            } else {
                prop_assert_eq!(e.sum, suffix.iter().sum::<i64>());
                prop_assert_eq!(e.count as usize, suffix.len());
            }
        }
    }
}
