//! Round orchestrator: picks the next comparison set for one user.
//!
//! States, evaluated fresh on every request:
//! 1. Unseen-first: enough never-rated candidates remain to fill a set.
//!    When only a few remain they are topped up from the seen pool,
//!    preferring the user's Elo focus band.
//! 2. Targeted: nothing unseen is left. A missing top-K pair wins first,
//!    then a pair crossing the cut line while the boundary gap is narrow.
//! 3. Refine: weighted draw inside the focus band.
//!
//! Draws avoid pairs in the user's `PairHistory` for up to
//! `history_retries` attempts; the last attempt is accepted regardless.

use std::collections::BTreeSet;

use dk_core::{
    Candidate, CandidateId, Comparison, DrawRng, EngineParams, PairHistory, PairKey, UserId,
    VoteBook,
};

use crate::rating::{
    boundary_delta, boundary_pairs, missing_top_pairs, sorted_by_rating, top_k, EloModel, Ratings,
};
use crate::sampling::GenreSampler;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundMode {
    Unseen,
    MissingTopPair,
    Boundary,
    Refine,
}

/// Chosen set in presentation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NextSet {
    pub ids: Vec<CandidateId>,
    pub mode: RoundMode,
}

/// Read-only view of the room for one user.
#[derive(Clone, Copy, Debug)]
pub struct RoundInput<'a> {
    pub user: &'a UserId,
    pub pool: &'a [Candidate],
    pub votes: &'a VoteBook,
    /// This user's comparison log only.
    pub comparisons: &'a [Comparison],
    pub history: &'a PairHistory,
}

/// `None` when fewer non-rejected candidates than the set size remain.
pub fn plan_next_set(
    input: &RoundInput<'_>,
    params: &EngineParams,
    rng: &mut DrawRng,
) -> Option<NextSet> {
    let n = params.set_size.len();
    let mine = input.votes.get(input.user);

    let rejected: BTreeSet<CandidateId> = mine
        .map(|v| v.iter().filter(|(_, e)| e.ng).map(|(id, _)| id.clone()).collect())
        .unwrap_or_default();
    let available: Vec<&Candidate> = input
        .pool
        .iter()
        .filter(|c| !rejected.contains(&c.id))
        .collect();
    if available.len() < n {
        return None;
    }

    let is_seen = |c: &Candidate| mine.is_some_and(|v| v.contains_key(&c.id));
    let (seen, unseen): (Vec<&Candidate>, Vec<&Candidate>) =
        available.iter().copied().partition(|c| is_seen(*c));

    let sampler = GenreSampler::new(params, input.pool, input.votes);
    let ids: Vec<CandidateId> = available.iter().map(|c| c.id.clone()).collect();
    let ratings = EloModel::from_params(params).compute_ratings(&ids, input.comparisons, &rejected);
    let focus = top_k(&ratings, params.top_focus_count);
    let retries = params.history_retries;

    if unseen.len() >= n {
        let set = draw_avoiding(input.history, retries, rng, |rng| {
            sampler
                .select_n(input.user, &unseen, n, rng)
                .map(|v| v.into_iter().map(|c| c.id.clone()).collect())
        })?;
        return Some(NextSet { ids: set, mode: RoundMode::Unseen });
    }

    if !unseen.is_empty() {
        let need = n - unseen.len();
        let focus_seen: Vec<&Candidate> = seen
            .iter()
            .copied()
            .filter(|c| focus.contains(&c.id))
            .collect();
        let fill_pool = if focus_seen.len() >= need { focus_seen } else { seen };
        let fresh: Vec<CandidateId> = unseen.iter().map(|c| c.id.clone()).collect();
        let set = draw_avoiding(input.history, retries, rng, |rng| {
            let fill = sampler.select_n(input.user, &fill_pool, need, rng)?;
            let mut set = fresh.clone();
            set.extend(fill.into_iter().map(|c| c.id.clone()));
            Some(set)
        })?;
        return Some(NextSet { ids: set, mode: RoundMode::Unseen });
    }

    targeted(input, params, rng, &sampler, &available, &ratings, &focus)
}

/// Push every sub-pair of a shown set into the user's history.
pub fn record_shown(history: &mut PairHistory, set: &[CandidateId], capacity: usize) {
    for pair in dk_core::entities::sub_pairs(set) {
        history.push(pair, capacity);
    }
}

fn targeted(
    input: &RoundInput<'_>,
    params: &EngineParams,
    rng: &mut DrawRng,
    sampler: &GenreSampler<'_>,
    available: &[&Candidate],
    ratings: &Ratings,
    focus: &[CandidateId],
) -> Option<NextSet> {
    let n = params.set_size.len();
    let k = params.top_target_count;
    let top = top_k(ratings, k);
    let next: Vec<CandidateId> = focus.iter().skip(top.len()).cloned().collect();

    let missing = missing_top_pairs(&top, input.comparisons);
    let base = if missing.len() > params.top_missing_pair_limit {
        pick_pair(&missing, input.history, params.history_retries, rng)
            .map(|p| (p, RoundMode::MissingTopPair))
    } else {
        match boundary_delta(ratings, k) {
            Some(delta) if delta < params.top_boundary_delta => {
                let mut cross = boundary_pairs(&top, &next, input.comparisons);
                if cross.is_empty() {
                    let sorted = sorted_by_rating(ratings);
                    cross.push(PairKey::new(sorted[k - 1].0.clone(), sorted[k].0.clone()));
                }
                pick_pair(&cross, input.history, params.history_retries, rng)
                    .map(|p| (p, RoundMode::Boundary))
            }
            _ => None,
        }
    };

    let Some((pair, mode)) = base else {
        let band: Vec<&Candidate> = available
            .iter()
            .copied()
            .filter(|c| focus.contains(&c.id))
            .collect();
        let band = if band.len() >= n { band } else { available.to_vec() };
        let set = draw_avoiding(input.history, params.history_retries, rng, |rng| {
            sampler
                .select_n(input.user, &band, n, rng)
                .map(|v| v.into_iter().map(|c| c.id.clone()).collect())
        })?;
        return Some(NextSet { ids: set, mode: RoundMode::Refine });
    };

    let mut set = vec![pair.lo().clone(), pair.hi().clone()];
    if n == 3 {
        let third = pick_third(input, sampler, available, focus, &pair, rng)?;
        set.push(third);
    }
    Some(NextSet { ids: set, mode })
}

/// Third member for a targeted triplet: focus band first, then anything left;
/// candidates adding no recently shown pair are preferred.
fn pick_third(
    input: &RoundInput<'_>,
    sampler: &GenreSampler<'_>,
    available: &[&Candidate],
    focus: &[CandidateId],
    pair: &PairKey,
    rng: &mut DrawRng,
) -> Option<CandidateId> {
    let rest: Vec<&Candidate> = available
        .iter()
        .copied()
        .filter(|c| !pair.contains(&c.id))
        .collect();
    let in_focus: Vec<&Candidate> = rest
        .iter()
        .copied()
        .filter(|c| focus.contains(&c.id))
        .collect();
    let pool = if in_focus.is_empty() { rest } else { in_focus };

    let fresh: Vec<&Candidate> = pool
        .iter()
        .copied()
        .filter(|c| {
            !input.history.contains(&PairKey::new(c.id.clone(), pair.lo().clone()))
                && !input.history.contains(&PairKey::new(c.id.clone(), pair.hi().clone()))
        })
        .collect();
    let from = if fresh.is_empty() { pool } else { fresh };
    sampler
        .select_single(input.user, &from, rng)
        .map(|c| c.id.clone())
}

/// Uniform pick among `pairs`, retrying away from history.
fn pick_pair(
    pairs: &[PairKey],
    history: &PairHistory,
    retries: u32,
    rng: &mut DrawRng,
) -> Option<PairKey> {
    let mut last = None;
    for _ in 0..retries.max(1) {
        let pair = &pairs[rng.choose_index(pairs.len())?];
        if !history.contains(pair) {
            return Some(pair.clone());
        }
        last = Some(pair.clone());
    }
    last
}

/// Repeat `draw` until a set with no recently shown pair comes up, at most
/// `retries` times; the final draw is kept even if it repeats.
fn draw_avoiding<F>(
    history: &PairHistory,
    retries: u32,
    rng: &mut DrawRng,
    mut draw: F,
) -> Option<Vec<CandidateId>>
where
    F: FnMut(&mut DrawRng) -> Option<Vec<CandidateId>>,
{
    let mut last = None;
    for _ in 0..retries.max(1) {
        let Some(set) = draw(rng) else { break };
        if !history.overlaps(&set) {
            return Some(set);
        }
        last = Some(set);
    }
    last
}
