//! Genre-bias preference sampler.
//!
//! Per-genre statistics come from the whole candidate pool and every user's
//! votes. A user who keeps rating a genre low sees it less often; genres the
//! group likes get a small boost. Draws are proportional to weight.
//!
//! weight = clamp((1 - uNeg·userNegRate + uPos·userPosRate) · (1 + gPos·globalPosRate), min, max)

use std::collections::BTreeMap;

use dk_core::{Candidate, CandidateId, DrawRng, EngineParams, UserId, VoteBook};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenreCounts {
    pub total: u32,
    pub neg: u32,
    pub pos: u32,
}

impl GenreCounts {
    fn add(&mut self, avg: f64, neg_at: f64, pos_at: f64) {
        self.total += 1;
        if avg <= neg_at {
            self.neg += 1;
        }
        if avg >= pos_at {
            self.pos += 1;
        }
    }

    fn neg_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.neg) / f64::from(self.total)
        }
    }

    fn pos_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.pos) / f64::from(self.total)
        }
    }
}

/// Rated-count statistics per (user, genre) and per genre overall.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenreStats {
    per_user: BTreeMap<UserId, BTreeMap<String, GenreCounts>>,
    global: BTreeMap<String, GenreCounts>,
}

impl GenreStats {
    /// Rejected and zero-count entries do not contribute.
    pub fn build(pool: &[Candidate], votes: &VoteBook, params: &EngineParams) -> Self {
        let genre_of: BTreeMap<&CandidateId, &str> = pool
            .iter()
            .filter_map(|c| c.genre.as_deref().map(|g| (&c.id, g)))
            .collect();

        let mut stats = GenreStats::default();
        for (user, entries) in votes {
            for (cid, entry) in entries {
                let Some(avg) = entry.average() else { continue };
                let Some(genre) = genre_of.get(cid) else { continue };
                let (neg_at, pos_at) = (params.negative_score_threshold, params.positive_score_threshold);
                stats
                    .per_user
                    .entry(user.clone())
                    .or_default()
                    .entry((*genre).to_string())
                    .or_default()
                    .add(avg, neg_at, pos_at);
                stats
                    .global
                    .entry((*genre).to_string())
                    .or_default()
                    .add(avg, neg_at, pos_at);
            }
        }
        stats
    }

    pub fn user_counts(&self, user: &UserId, genre: &str) -> GenreCounts {
        self.per_user
            .get(user)
            .and_then(|m| m.get(genre))
            .copied()
            .unwrap_or_default()
    }

    pub fn global_counts(&self, genre: &str) -> GenreCounts {
        self.global.get(genre).copied().unwrap_or_default()
    }

    /// Sampling weight of `genre` for `user`; candidates without a genre weigh 1.
    pub fn weight(&self, user: &UserId, genre: Option<&str>, params: &EngineParams) -> f64 {
        let Some(genre) = genre else { return 1.0 };
        let mine = self.user_counts(user, genre);
        let all = self.global_counts(genre);
        let raw = (1.0 - params.user_neg_weight * mine.neg_rate()
            + params.user_pos_weight * mine.pos_rate())
            * (1.0 + params.global_pos_weight * all.pos_rate());
        raw.clamp(params.min_genre_weight, params.max_genre_weight)
    }
}

/// Index drawn proportionally to `weights`; uniform when the total is not positive.
/// `None` only for an empty slice.
pub fn pick_weighted(weights: &[f64], rng: &mut DrawRng) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total.is_nan() || total <= 0.0 {
        return rng.choose_index(weights.len());
    }
    let mut r = rng.next_unit() * total;
    for (i, w) in weights.iter().enumerate() {
        r -= w;
        if r <= 0.0 {
            return Some(i);
        }
    }
    Some(weights.len() - 1)
}

/// Sampler bound to one room snapshot.
#[derive(Clone, Debug)]
pub struct GenreSampler<'p> {
    params: &'p EngineParams,
    stats: GenreStats,
}

impl<'p> GenreSampler<'p> {
    pub fn new(params: &'p EngineParams, pool: &[Candidate], votes: &VoteBook) -> Self {
        Self {
            params,
            stats: GenreStats::build(pool, votes, params),
        }
    }

    #[inline]
    pub fn stats(&self) -> &GenreStats {
        &self.stats
    }

    pub fn weight(&self, user: &UserId, candidate: &Candidate) -> f64 {
        self.stats.weight(user, candidate.genre.as_deref(), self.params)
    }

    /// Draw `n` distinct candidates. Each pick removes itself and its weight.
    pub fn select_n<'c>(
        &self,
        user: &UserId,
        candidates: &[&'c Candidate],
        n: usize,
        rng: &mut DrawRng,
    ) -> Option<Vec<&'c Candidate>> {
        if n == 0 || candidates.len() < n {
            return None;
        }
        let mut rest: Vec<&'c Candidate> = candidates.to_vec();
        let mut weights: Vec<f64> = rest.iter().map(|c| self.weight(user, c)).collect();
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let i = pick_weighted(&weights, rng)?;
            out.push(rest.remove(i));
            weights.remove(i);
        }
        Some(out)
    }

    pub fn select_single<'c>(
        &self,
        user: &UserId,
        candidates: &[&'c Candidate],
        rng: &mut DrawRng,
    ) -> Option<&'c Candidate> {
        self.select_n(user, candidates, 1, rng)
            .and_then(|v| v.into_iter().next())
    }

    pub fn select_pair<'c>(
        &self,
        user: &UserId,
        candidates: &[&'c Candidate],
        rng: &mut DrawRng,
    ) -> Option<(&'c Candidate, &'c Candidate)> {
        let v = self.select_n(user, candidates, 2, rng)?;
        Some((v[0], v[1]))
    }
}

/// One-shot pair draw building stats from `pool` and `votes`.
pub fn select_pair<'c>(
    user: &UserId,
    candidates: &[&'c Candidate],
    votes: &VoteBook,
    pool: &[Candidate],
    params: &EngineParams,
    rng: &mut DrawRng,
) -> Option<(&'c Candidate, &'c Candidate)> {
    GenreSampler::new(params, pool, votes).select_pair(user, candidates, rng)
}

/// One-shot single draw building stats from `pool` and `votes`.
pub fn select_single<'c>(
    user: &UserId,
    candidates: &[&'c Candidate],
    votes: &VoteBook,
    pool: &[Candidate],
    params: &EngineParams,
    rng: &mut DrawRng,
) -> Option<&'c Candidate> {
    GenreSampler::new(params, pool, votes).select_single(user, candidates, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dk_core::{UserVotes, VoteEntry};

    fn cand(id: &str, genre: Option<&str>) -> Candidate {
        let c = Candidate::new(id.parse().unwrap(), id);
        match genre {
            Some(g) => c.with_genre(g),
            None => c,
        }
    }

    fn uid(s: &str) -> UserId {
        s.parse().unwrap()
    }

    fn book(rows: &[(&str, &str, i64)]) -> VoteBook {
        let mut b = VoteBook::new();
        for (u, c, s) in rows {
            let e: &mut UserVotes = b.entry(uid(u)).or_default();
            e.insert(c.parse().unwrap(), VoteEntry::first(*s));
        }
        b
    }

    #[test]
    fn single_positive_weight_always_wins() {
        let mut rng = DrawRng::from_seed_u64(5);
        for _ in 0..50 {
            assert_eq!(pick_weighted(&[0.7], &mut rng), Some(0));
        }
        assert_eq!(pick_weighted(&[], &mut rng), None);
    }

    #[test]
    fn zero_total_falls_back_to_uniform() {
        let mut rng = DrawRng::from_seed_u64(11);
        let mut hit = [false; 3];
        for _ in 0..200 {
            hit[pick_weighted(&[0.0, 0.0, 0.0], &mut rng).unwrap()] = true;
        }
        assert!(hit.iter().all(|h| *h));
    }

    #[test]
    fn zero_weight_entries_are_never_drawn_when_total_positive() {
        let mut rng = DrawRng::from_seed_u64(2);
        for _ in 0..200 {
            let i = pick_weighted(&[0.0, 1.0, 0.0], &mut rng).unwrap();
            assert_eq!(i, 1);
        }
    }

    #[test]
    fn disliked_genre_weighs_less() {
        let params = EngineParams::default();
        let pool = [cand("r1", Some("ramen")), cand("r2", Some("ramen")), cand("s1", Some("sushi"))];
        let votes = book(&[("u1", "r1", 10), ("u1", "r2", 20), ("u1", "s1", 90)]);
        let stats = GenreStats::build(&pool, &votes, &params);
        let ramen = stats.weight(&uid("u1"), Some("ramen"), &params);
        let sushi = stats.weight(&uid("u1"), Some("sushi"), &params);
        // ramen: (1 - 0.35) * (1 + 0) ; sushi: (1 + 0.15) * (1 + 0.1)
        assert!((ramen - 0.65).abs() < 1e-12);
        assert!((sushi - 1.265).abs() < 1e-12);
        assert_eq!(stats.weight(&uid("u1"), None, &params), 1.0);
    }

    #[test]
    fn rejected_entries_do_not_count() {
        let params = EngineParams::default();
        let pool = [cand("r1", Some("ramen"))];
        let mut votes = VoteBook::new();
        votes
            .entry(uid("u1"))
            .or_default()
            .insert("r1".parse().unwrap(), VoteEntry::rejected(dk_core::NG_SCORE));
        let stats = GenreStats::build(&pool, &votes, &params);
        assert_eq!(stats.user_counts(&uid("u1"), "ramen").total, 0);
    }

    #[test]
    fn weight_is_clamped() {
        let params = EngineParams {
            user_neg_weight: 5.0,
            ..EngineParams::default()
        };
        let pool = [cand("r1", Some("ramen"))];
        let votes = book(&[("u1", "r1", 0)]);
        let stats = GenreStats::build(&pool, &votes, &params);
        assert_eq!(stats.weight(&uid("u1"), Some("ramen"), &params), 0.25);
    }

    #[test]
    fn pair_draw_is_distinct_and_needs_two() {
        let params = EngineParams::default();
        let pool = [cand("a", None), cand("b", None)];
        let refs: Vec<&Candidate> = pool.iter().collect();
        let mut rng = DrawRng::from_seed_u64(1);
        let votes = VoteBook::new();
        let (x, y) = select_pair(&uid("u"), &refs, &votes, &pool, &params, &mut rng).unwrap();
        assert_ne!(x.id, y.id);
        assert!(select_pair(&uid("u"), &refs[..1], &votes, &pool, &params, &mut rng).is_none());
        assert!(select_single(&uid("u"), &[], &votes, &pool, &params, &mut rng).is_none());
    }
}
