// crates/dk_cli/src/args.rs
//
// CLI argument surface. Every subcommand works against a file-backed room
// store (`--store-dir`); `simulate` runs fully in memory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dk_core::{CandidateId, RoomId, UserId, NG_SCORE};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "dokoiku",
    version,
    disable_help_subcommand = true,
    about = "Adaptive restaurant comparison and ranking for groups"
)]
pub struct Args {
    /// Directory holding room documents.
    #[arg(long, global = true, default_value = ".dokoiku")]
    pub store_dir: PathBuf,

    /// Engine params JSON; absent fields keep their defaults.
    #[arg(long, global = true)]
    pub params: Option<PathBuf>,

    /// RNG seed (decimal u64 or 0x-hex). Omit for an entropy seed.
    #[arg(long, global = true, value_parser = parse_seed)]
    pub seed: Option<u64>,

    /// Log at info level (RUST_LOG still wins).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create an empty room and print its id.
    Open {
        #[arg(long)]
        area: String,
        #[arg(long)]
        budget_min: Option<u32>,
        #[arg(long)]
        budget_max: Option<u32>,
    },
    /// Print the next comparison set for a user.
    Next {
        #[arg(long, value_parser = parse_room)]
        room: RoomId,
        #[arg(long, value_parser = parse_user)]
        user: UserId,
        /// Candidate list JSON used when the room's pool is still empty.
        #[arg(long)]
        candidates: Option<PathBuf>,
    },
    /// Submit 1 to 3 scores as ID=SCORE (SCORE may be `ng`).
    Vote {
        #[arg(long, value_parser = parse_room)]
        room: RoomId,
        #[arg(long, value_parser = parse_user)]
        user: UserId,
        #[arg(long = "item", value_parser = parse_vote_item, num_args = 1.., required = true)]
        items: Vec<(CandidateId, i64)>,
    },
    /// Print the group ranking and decision state.
    Result {
        #[arg(long, value_parser = parse_room)]
        room: RoomId,
    },
    /// Run a seeded synthetic group through an in-memory room.
    Simulate {
        #[arg(long, default_value_t = 3)]
        users: usize,
        #[arg(long, default_value_t = 12)]
        candidates: usize,
        #[arg(long, default_value_t = 60)]
        max_rounds: usize,
        #[arg(long, default_value_t = 8.0)]
        noise: f64,
    },
}

/// Decimal u64 or 0x-hex (1..=16 nybbles).
pub fn parse_seed(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty seed".into());
    }
    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if rest.is_empty() || rest.len() > 16 || !rest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("hex seed must be 1..16 hex digits".into());
        }
        u64::from_str_radix(rest, 16).map_err(|_| "hex seed out of range".into())
    } else {
        s.parse::<u64>().map_err(|_| "decimal seed must be a valid u64".into())
    }
}

fn parse_room(s: &str) -> Result<RoomId, String> {
    s.parse().map_err(|e| format!("room id: {e}"))
}

fn parse_user(s: &str) -> Result<UserId, String> {
    s.parse().map_err(|e| format!("user id: {e}"))
}

/// `ID=SCORE` where SCORE is an integer or `ng`. Splits on the last `=`.
pub fn parse_vote_item(s: &str) -> Result<(CandidateId, i64), String> {
    let (id, score) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected ID=SCORE, got {s:?}"))?;
    let id: CandidateId = id.trim().parse().map_err(|e| format!("candidate id: {e}"))?;
    let score = score.trim();
    let score = if score.eq_ignore_ascii_case("ng") {
        NG_SCORE
    } else {
        score
            .parse::<i64>()
            .map_err(|_| format!("score must be an integer or `ng`, got {score:?}"))?
    };
    Ok((id, score))
}
