//! Candidate pool population, run once per room on the first next-comparison
//! request that finds an empty pool.
//!
//! fetch(area, budget codes) → on error or empty: one unfiltered retry →
//! dedup by id → budget-label filter (skipped if it would empty the pool) →
//! cap at pool size → record `FetchMeta`.

use std::collections::BTreeSet;

use dk_algo::budget::{budget_codes_for_range, filter_by_budget_range, normalize_budget_range};
use dk_core::{Candidate, EngineParams, FetchMeta, RoomState};
use tracing::{info, warn};

use crate::source::{CandidateQuery, CandidateSource};
use crate::{PipelineError, PipelineResult};

/// Fill `room.candidates` from `source`. A room that already has a pool is left alone.
pub fn populate_pool(
    room: &mut RoomState,
    source: &dyn CandidateSource,
    params: &EngineParams,
) -> PipelineResult<()> {
    if !room.candidates.is_empty() {
        return Ok(());
    }

    let range = normalize_budget_range(room.conditions.budget_min, room.conditions.budget_max);
    let budget_codes = budget_codes_for_range(range.as_ref());
    let query = CandidateQuery {
        area: room.conditions.area.clone(),
        budget_codes: budget_codes.clone(),
        count: params.candidate_pool_size,
    };

    let (fetched, fallback_used) = match source.fetch(&query) {
        Ok(list) if !list.is_empty() => (list, false),
        first => {
            match &first {
                Ok(_) => warn!(room = %room.id, "candidate fetch returned nothing; retrying unfiltered"),
                Err(e) => warn!(room = %room.id, error = %e, "candidate fetch failed; retrying unfiltered"),
            }
            let retry = CandidateQuery {
                budget_codes: Vec::new(),
                ..query
            };
            let list = source
                .fetch(&retry)
                .map_err(|e| PipelineError::UpstreamUnavailable(e.to_string()))?;
            (list, true)
        }
    };
    let fetched_count = fetched.len();

    let deduped = dedup_by_id(fetched);
    let filtered = filter_by_budget_range(deduped.clone(), range.as_ref());
    let filtered_count = filtered.len();
    let budget_filter_used = range.is_some() && !filtered.is_empty();
    let mut pool = if budget_filter_used { filtered } else { deduped };
    pool.truncate(params.candidate_pool_size);

    info!(
        room = %room.id,
        fetched = fetched_count,
        pool = pool.len(),
        fallback_used,
        "candidate pool populated"
    );
    room.fetch_meta = Some(FetchMeta {
        fetched_count,
        filtered_count,
        candidate_pool_count: pool.len(),
        budget_codes,
        budget_filter_used,
        fallback_used,
        range,
    });
    room.candidates = pool;
    Ok(())
}

/// First occurrence of each id wins; order preserved.
fn dedup_by_id(list: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = BTreeSet::new();
    list.into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}
