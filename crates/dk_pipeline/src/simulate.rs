//! Seeded synthetic group: hidden per-venue quality, per-user bias and noise,
//! voting through a full in-memory engine until the room decides or the round
//! cap is hit. Same seed, same run.

use std::sync::Arc;

use dk_core::{Candidate, CandidateId, DrawRng, EngineParams, RoomConditions, UserId, NG_SCORE};
use dk_io::clock::ManualClock;
use dk_io::store::MemoryStore;
use tracing::info;

use crate::engine::{Engine, NextStep};
use crate::report::RoomResult;
use crate::source::StaticSource;
use crate::validate::VoteSubmission;
use crate::{PipelineError, PipelineResult};

const GENRES: [&str; 6] = ["ramen", "sushi", "izakaya", "italian", "curry", "yakiniku"];
/// Scores at or below this are sent as a rejection.
const REJECT_AT: f64 = 15.0;
const VOTE_GAP_MS: u64 = 1_000;

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub users: usize,
    pub candidates: usize,
    pub max_rounds: usize,
    pub seed: u64,
    /// Half-width of the uniform per-vote noise.
    pub noise: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            users: 3,
            candidates: 12,
            max_rounds: 60,
            seed: 1,
            noise: 8.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationReport {
    /// Rounds started (every user asked once per round).
    pub rounds: usize,
    pub submissions: usize,
    pub decided_id: Option<CandidateId>,
    /// Highest hidden quality.
    pub true_best: CandidateId,
    pub result: RoomResult,
}

struct Voter {
    id: UserId,
    bias: f64,
}

pub fn simulate(cfg: &SimulationConfig, params: EngineParams) -> PipelineResult<SimulationReport> {
    if cfg.users == 0 {
        return Err(PipelineError::InvalidInput("simulation needs at least one user".into()));
    }
    if cfg.candidates < params.set_size.len() {
        return Err(PipelineError::InvalidInput(format!(
            "simulation needs at least {} candidates",
            params.set_size.len()
        )));
    }
    let mut rng = DrawRng::from_seed_u64(cfg.seed);

    let mut pool = Vec::with_capacity(cfg.candidates);
    let mut quality: Vec<(CandidateId, f64)> = Vec::with_capacity(cfg.candidates);
    for i in 1..=cfg.candidates {
        let id = parse_id::<CandidateId>(format!("S{i:02}"))?;
        quality.push((id.clone(), 20.0 + 70.0 * rng.next_unit()));
        pool.push(Candidate::new(id, format!("Shop {i}")).with_genre(GENRES[(i - 1) % GENRES.len()]));
    }
    let voters = (1..=cfg.users)
        .map(|j| -> PipelineResult<Voter> {
            Ok(Voter {
                id: parse_id::<UserId>(format!("u{j}"))?,
                bias: (rng.next_unit() - 0.5) * 10.0,
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    let clock = Arc::new(ManualClock::new(0));
    let engine = Engine::new(
        Arc::new(MemoryStore::with_clock(clock.clone())),
        Arc::new(StaticSource::new(pool)),
        params,
    )?
    .with_clock(clock.clone());
    let room = engine.open_room(
        RoomConditions {
            area: "simulation".into(),
            ..RoomConditions::default()
        },
        &mut rng,
    )?;

    let mut rounds = 0;
    let mut submissions = 0;
    let mut decided = false;
    while rounds < cfg.max_rounds && !decided {
        rounds += 1;
        let mut shown_any = false;
        for voter in &voters {
            let next = engine.next_comparison(&room, &voter.id, &mut rng)?;
            let candidates = match next.step {
                NextStep::Set { candidates, .. } => candidates,
                NextStep::Decided => {
                    decided = true;
                    break;
                }
                NextStep::Waiting => continue,
            };
            shown_any = true;
            let items: Vec<(CandidateId, i64)> = candidates
                .into_iter()
                .map(|c| {
                    let q = quality
                        .iter()
                        .find(|(id, _)| *id == c.id)
                        .map_or(50.0, |(_, q)| *q);
                    let noisy = q + voter.bias + cfg.noise * (2.0 * rng.next_unit() - 1.0);
                    (c.id, score_of(noisy))
                })
                .collect();
            let receipt = engine.submit_votes(&room, &VoteSubmission::new(voter.id.clone(), items))?;
            submissions += 1;
            clock.advance_ms(VOTE_GAP_MS);
            if receipt.is_decided {
                decided = true;
                break;
            }
        }
        if !shown_any {
            break;
        }
    }

    let result = engine.result(&room)?;
    let true_best = quality
        .iter()
        .fold(None::<&(CandidateId, f64)>, |best, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        })
        .map(|(id, _)| id.clone())
        .ok_or_else(|| PipelineError::InvalidInput("empty simulation pool".into()))?;

    info!(
        rounds,
        submissions,
        decided = ?result.decided_id,
        %true_best,
        "simulation finished"
    );
    Ok(SimulationReport {
        rounds,
        submissions,
        decided_id: result.decided_id.clone(),
        true_best,
        result,
    })
}

fn score_of(noisy: f64) -> i64 {
    if noisy <= REJECT_AT {
        NG_SCORE
    } else {
        noisy.round().clamp(0.0, 100.0) as i64
    }
}

fn parse_id<T: TryFrom<String>>(s: String) -> PipelineResult<T> {
    let shown = s.clone();
    T::try_from(s).map_err(|_| PipelineError::InvalidInput(format!("bad synthetic id {shown}")))
}
