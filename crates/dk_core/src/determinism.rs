//! Determinism utilities: stable total orders used wherever scores can tie.
//!
//! This module is **I/O-free**. Floats are ordered with `f64::total_cmp`, and
//! every score order falls back to ascending id so two runs over the same data
//! never disagree.

use core::cmp::Ordering;

use crate::ids::CandidateId;

/* -------------------------------------------------------------------------- */
/*                               Stable Ordering                              */
/* -------------------------------------------------------------------------- */

/// Higher score first, then ascending id.
#[inline]
pub fn cmp_score_desc_id_asc(
    a: (&CandidateId, f64),
    b: (&CandidateId, f64),
) -> Ordering {
    match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(b.0),
        o => o,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(s: &str) -> CandidateId {
        s.parse().unwrap()
    }

    #[test]
    fn ties_break_by_id() {
        let (a, b, c) = (cid("a"), cid("b"), cid("c"));
        let mut rows = alloc::vec![(&b, 10.0), (&a, 10.0), (&c, 12.0)];
        rows.sort_by(|x, y| cmp_score_desc_id_asc(*x, *y));
        let order: alloc::vec::Vec<&str> = rows.iter().map(|r| r.0.as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[test]
    fn nan_sorts_first_deterministically() {
        let (a, b) = (cid("a"), cid("b"));
        assert_eq!(cmp_score_desc_id_asc((&a, f64::NAN), (&b, 1.0)), Ordering::Less);
        assert_eq!(cmp_score_desc_id_asc((&a, 1.0), (&a, 1.0)), Ordering::Equal);
    }
}
