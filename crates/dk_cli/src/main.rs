// crates/dk_cli/src/main.rs
//
// Wires CLI parsing, logging, the file-backed engine, and exit codes.
// Payloads go to stdout as pretty JSON; diagnostics go to stderr.

mod args;

mod exitcodes {
    pub const OK: u8 = 0;
    pub const VALIDATION: u8 = 2;
    pub const NOT_FOUND: u8 = 3;
    pub const IO: u8 = 4;
    pub const CONFLICT: u8 = 5;
}

use std::fmt;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dk_core::{DrawRng, EngineParams, RoomConditions};
use dk_io::loader;
use dk_io::store::FileStore;
use dk_pipeline::{
    simulate, CandidateSource, Engine, PipelineError, SimulationConfig, StaticSource,
    VoteSubmission,
};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use args::{Args, Command};

/// CLI error buckets; each maps to one exit code.
#[derive(Debug)]
enum MainError {
    Validation(String),
    NotFound(String),
    Io(String),
    Conflict(String),
}

impl MainError {
    fn code(&self) -> u8 {
        match self {
            MainError::Validation(_) => exitcodes::VALIDATION,
            MainError::NotFound(_) => exitcodes::NOT_FOUND,
            MainError::Io(_) => exitcodes::IO,
            MainError::Conflict(_) => exitcodes::CONFLICT,
        }
    }
}

impl fmt::Display for MainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MainError::Validation(m) => write!(f, "invalid input: {m}"),
            MainError::NotFound(m) => write!(f, "not found: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Conflict(m) => write!(f, "conflict: {m}"),
        }
    }
}

impl From<PipelineError> for MainError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::NotFound(_) => MainError::NotFound(e.to_string()),
            PipelineError::InvalidInput(_) | PipelineError::Params(_) => {
                MainError::Validation(e.to_string())
            }
            PipelineError::Conflict { .. } => MainError::Conflict(e.to_string()),
            PipelineError::Store(io) => map_io_err(io),
            PipelineError::UpstreamUnavailable(_) => MainError::Io(e.to_string()),
        }
    }
}

fn map_io_err(e: dk_io::IoError) -> MainError {
    use dk_io::IoError::*;
    match e {
        Json { .. } | Params(_) | Invalid(_) => MainError::Validation(e.to_string()),
        Path(_) | Store(_) => MainError::Io(e.to_string()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::from(exitcodes::OK),
        Err(e) => {
            eprintln!("dokoiku: error: {e}");
            ExitCode::from(e.code())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<(), MainError> {
    let params = match &args.params {
        Some(path) => loader::load_params(path).map_err(map_io_err)?,
        None => EngineParams::default(),
    };
    let mut rng = match args.seed {
        Some(seed) => DrawRng::from_seed_u64(seed),
        None => DrawRng::from_entropy(),
    };

    match &args.command {
        Command::Open {
            area,
            budget_min,
            budget_max,
        } => {
            let engine = file_engine(args, params, Arc::new(StaticSource::default()))?;
            let conditions = RoomConditions {
                area: area.clone(),
                budget_min: *budget_min,
                budget_max: *budget_max,
            };
            let room = engine.open_room(conditions, &mut rng)?;
            emit(&json!({ "room_id": room }))
        }
        Command::Next {
            room,
            user,
            candidates,
        } => {
            let source = match candidates {
                Some(path) => StaticSource::new(loader::load_candidates(path).map_err(map_io_err)?),
                None => StaticSource::default(),
            };
            let engine = file_engine(args, params, Arc::new(source))?;
            emit(&engine.next_comparison(room, user, &mut rng)?)
        }
        Command::Vote { room, user, items } => {
            let engine = file_engine(args, params, Arc::new(StaticSource::default()))?;
            let sub = VoteSubmission::new(user.clone(), items.iter().cloned());
            emit(&engine.submit_votes(room, &sub)?)
        }
        Command::Result { room } => {
            let engine = file_engine(args, params, Arc::new(StaticSource::default()))?;
            emit(&engine.result(room)?)
        }
        Command::Simulate {
            users,
            candidates,
            max_rounds,
            noise,
        } => {
            let cfg = SimulationConfig {
                users: *users,
                candidates: *candidates,
                max_rounds: *max_rounds,
                seed: args.seed.unwrap_or(SimulationConfig::default().seed),
                noise: *noise,
            };
            let report = simulate(&cfg, params)?;
            let ranking: Vec<_> = report
                .result
                .candidates
                .iter()
                .map(|r| json!({ "id": r.candidate.id, "avg_score": r.avg_score, "rated_count": r.rated_count }))
                .collect();
            emit(&json!({
                "rounds": report.rounds,
                "submissions": report.submissions,
                "decided_id": report.decided_id,
                "true_best": report.true_best,
                "ranking": ranking,
            }))
        }
    }
}

fn file_engine(
    args: &Args,
    params: EngineParams,
    source: Arc<dyn CandidateSource>,
) -> Result<Engine, MainError> {
    debug!(dir = %args.store_dir.display(), "using file store");
    let store = Arc::new(FileStore::new(args.store_dir.clone()));
    Ok(Engine::new(store, source, params)?)
}

fn emit<T: serde::Serialize>(value: &T) -> Result<(), MainError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| MainError::Io(e.to_string()))?;
    println!("{text}");
    Ok(())
}
