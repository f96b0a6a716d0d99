//! `Engine`: the room service. Each public operation is one read-modify-write
//! cycle against the room store.
//!
//! Write modes:
//! - `LastWriterWins`: get → mutate → set. A concurrent writer may overwrite
//!   an update made between our get and set.
//! - `Versioned`: get (with stamp) → mutate → compare-and-set; on a stamp
//!   mismatch the mutation is re-run on a fresh read, up to `cas_attempts`.

use std::sync::Arc;
use std::time::Duration;

use dk_algo::decision::{check_auto_decision, DecisionRule};
use dk_algo::penalty::{OutlierNegativeVoter, PenaltyPolicy};
use dk_algo::rounds::{plan_next_set, record_shown, RoundInput, RoundMode};
use dk_algo::tabulation::{apply_vote, build_comparisons, min_common, participant_count, rank, Ranking};
use dk_core::{
    Candidate, CandidateId, DrawRng, EngineParams, PairHistory, RoomConditions, RoomId, RoomState,
    UserId, WriteMode,
};
use dk_io::clock::{Clock, SystemClock};
use dk_io::store::RoomStore;
use serde::Serialize;
use tracing::{debug, info};

use crate::populate::populate_pool;
use crate::report::{build_result, RoomResult};
use crate::source::CandidateSource;
use crate::validate::{check_known, check_shape, VoteSubmission};
use crate::{PipelineError, PipelineResult};

const ROOM_ID_LEN: usize = 8;
const ROOM_ID_ATTEMPTS: u32 = 8;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Per-user progress echoed with every next-comparison answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub evaluated: usize,
    pub total: usize,
    pub is_decided: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_id: Option<CandidateId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextStep {
    /// Room is finalized; no more sets.
    Decided,
    /// Show these candidates, in order.
    Set {
        candidates: Vec<Candidate>,
        mode: &'static str,
    },
    /// No legal set right now (pool smaller than the set size after rejections).
    Waiting,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NextComparison {
    #[serde(flatten)]
    pub step: NextStep,
    pub progress: Progress,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    pub is_decided: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_id: Option<CandidateId>,
}

pub fn mode_label(mode: RoundMode) -> &'static str {
    match mode {
        RoundMode::Unseen => "unseen",
        RoundMode::MissingTopPair => "missing_top_pair",
        RoundMode::Boundary => "boundary",
        RoundMode::Refine => "refine",
    }
}

pub struct Engine {
    store: Arc<dyn RoomStore>,
    source: Arc<dyn CandidateSource>,
    params: EngineParams,
    clock: Arc<dyn Clock>,
    policy: Box<dyn PenaltyPolicy>,
}

impl Engine {
    /// Validates `params`; uses the system clock and the outlier-negative-voter policy.
    pub fn new(
        store: Arc<dyn RoomStore>,
        source: Arc<dyn CandidateSource>,
        params: EngineParams,
    ) -> PipelineResult<Self> {
        params.validate_domains()?;
        let policy = Box::new(OutlierNegativeVoter::from_params(&params));
        Ok(Self {
            store,
            source,
            params,
            clock: Arc::new(SystemClock),
            policy,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn PenaltyPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[inline]
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.params.room_ttl_secs)
    }

    /* ------------------------------- Operations ------------------------------- */

    /// Create an empty room under a fresh 8-character base36 id.
    pub fn open_room(&self, conditions: RoomConditions, rng: &mut DrawRng) -> PipelineResult<RoomId> {
        for _ in 0..ROOM_ID_ATTEMPTS {
            let id = random_room_id(rng)?;
            if self.store.get(&id)?.is_some() {
                continue;
            }
            let room = RoomState::new(id.clone(), conditions, self.clock.now_ms());
            self.store.set(&room, self.ttl())?;
            info!(room = %id, area = %room.conditions.area, "room opened");
            return Ok(id);
        }
        Err(PipelineError::Store(dk_io::IoError::Store(
            "could not allocate an unused room id".into(),
        )))
    }

    /// Raw room document, if live.
    pub fn room(&self, id: &RoomId) -> PipelineResult<RoomState> {
        self.store
            .get(id)?
            .map(|s| s.room)
            .ok_or_else(|| PipelineError::NotFound(id.clone()))
    }

    /// Fold one submission into the room, re-rank, and run the decision rule.
    /// Votes against a decided room are ignored.
    pub fn submit_votes(&self, id: &RoomId, sub: &VoteSubmission) -> PipelineResult<VoteReceipt> {
        check_shape(sub)?;
        let items = sub.pairs();
        let rule = DecisionRule::from_params(&self.params);

        self.mutate(id, |room| {
            if room.is_decided() {
                debug!(room = %room.id, user = %sub.user_id, "vote on decided room ignored");
                return Ok((receipt(room), false));
            }
            check_known(sub, room)?;

            let user_votes = room.votes.entry(sub.user_id.clone()).or_default();
            for (cid, score) in &items {
                let next = apply_vote(user_votes.get(cid), *score);
                user_votes.insert(cid.clone(), next);
            }
            room.note_participant(&sub.user_id);

            let comps = build_comparisons(&items);
            if !comps.is_empty() {
                room.comparisons
                    .entry(sub.user_id.clone())
                    .or_default()
                    .extend(comps);
            }

            let ranking = self.rank_room(room);
            let now = self.clock.now_ms();
            if let Some(winner) = check_auto_decision(&mut room.rank_history, &ranking, now, rule) {
                info!(room = %room.id, decided = %winner, "room decided");
                room.decided_id = Some(winner);
            }
            debug!(room = %room.id, user = %sub.user_id, items = items.len(), "votes applied");
            Ok((receipt(room), true))
        })
    }

    /// Next set for `user`, populating the pool on first use.
    pub fn next_comparison(
        &self,
        id: &RoomId,
        user: &UserId,
        rng: &mut DrawRng,
    ) -> PipelineResult<NextComparison> {
        self.mutate(id, |room| {
            if room.is_decided() {
                return Ok((
                    NextComparison {
                        step: NextStep::Decided,
                        progress: progress(room, user),
                    },
                    false,
                ));
            }

            let mut dirty = !room.participants.contains(user);
            room.note_participant(user);
            if room.candidates.is_empty() {
                populate_pool(room, self.source.as_ref(), &self.params)?;
                dirty = true;
            }

            let planned = {
                let empty = PairHistory::default();
                let input = RoundInput {
                    user,
                    pool: &room.candidates,
                    votes: &room.votes,
                    comparisons: room.user_comparisons(user),
                    history: room.pair_history.get(user).unwrap_or(&empty),
                };
                plan_next_set(&input, &self.params, rng)
            };

            let step = match planned {
                Some(set) => {
                    let history = room.pair_history.entry(user.clone()).or_default();
                    record_shown(history, &set.ids, self.params.pair_history_capacity);
                    dirty = true;
                    debug!(room = %room.id, %user, mode = mode_label(set.mode), "set planned");
                    NextStep::Set {
                        candidates: set
                            .ids
                            .iter()
                            .filter_map(|cid| room.candidate(cid).cloned())
                            .collect(),
                        mode: mode_label(set.mode),
                    }
                }
                None => {
                    debug!(room = %room.id, %user, "no legal set; waiting");
                    NextStep::Waiting
                }
            };
            Ok((
                NextComparison {
                    step,
                    progress: progress(room, user),
                },
                dirty,
            ))
        })
    }

    /// Full group ranking plus decision and penalty metadata. Read-only.
    pub fn result(&self, id: &RoomId) -> PipelineResult<RoomResult> {
        let room = self.room(id)?;
        let ranking = self.rank_room(&room);
        Ok(build_result(&room, &ranking))
    }

    /* -------------------------------- Internals -------------------------------- */

    fn rank_room(&self, room: &RoomState) -> Ranking {
        let needed = min_common(participant_count(&room.votes), self.params.min_common_ratio);
        rank(
            &room.candidates,
            &room.votes,
            &room.comparisons,
            needed,
            self.policy.as_ref(),
            &self.params,
        )
    }

    /// One read-modify-write cycle. `f` returns the answer and whether the room
    /// changed; unchanged rooms are not written back.
    fn mutate<T>(
        &self,
        id: &RoomId,
        mut f: impl FnMut(&mut RoomState) -> PipelineResult<(T, bool)>,
    ) -> PipelineResult<T> {
        let ttl = self.ttl();
        match self.params.write_mode {
            WriteMode::LastWriterWins => {
                let mut room = self.room(id)?;
                let (out, dirty) = f(&mut room)?;
                if dirty {
                    self.store.set(&room, ttl)?;
                }
                Ok(out)
            }
            WriteMode::Versioned => {
                for attempt in 1..=self.params.cas_attempts {
                    let stored = self
                        .store
                        .get(id)?
                        .ok_or_else(|| PipelineError::NotFound(id.clone()))?;
                    let mut room = stored.room;
                    let (out, dirty) = f(&mut room)?;
                    if !dirty {
                        return Ok(out);
                    }
                    if self.store.compare_and_set(&room, &stored.version, ttl)?.is_some() {
                        return Ok(out);
                    }
                    debug!(room = %id, attempt, "stale room version; retrying");
                }
                Err(PipelineError::Conflict {
                    room: id.clone(),
                    attempts: self.params.cas_attempts,
                })
            }
        }
    }
}

fn receipt(room: &RoomState) -> VoteReceipt {
    VoteReceipt {
        is_decided: room.is_decided(),
        decided_id: room.decided_id.clone(),
    }
}

fn progress(room: &RoomState, user: &UserId) -> Progress {
    Progress {
        evaluated: room.evaluated_count(user),
        total: room.candidates.len(),
        is_decided: room.is_decided(),
        decided_id: room.decided_id.clone(),
    }
}

fn random_room_id(rng: &mut DrawRng) -> PipelineResult<RoomId> {
    let mut s = String::with_capacity(ROOM_ID_LEN);
    for _ in 0..ROOM_ID_LEN {
        let i = rng.gen_range(BASE36.len() as u64).unwrap_or(0) as usize;
        s.push(char::from(BASE36[i]));
    }
    RoomId::try_from(s).map_err(|e| PipelineError::InvalidInput(format!("room id: {e}")))
}
