//! Loader: read local JSON inputs (engine params, candidate lists) into typed
//! values. Params are filled from defaults, then domain-checked. No network I/O.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use dk_core::{Candidate, EngineParams};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{IoError, IoResult};

/// Largest input file accepted.
pub const MAX_INPUT_BYTES: u64 = 8 * 1024 * 1024;

fn read_json_value(path: &Path) -> IoResult<Value> {
    let file = File::open(path).map_err(|e| IoError::Path(format!("{}: {e}", path.display())))?;
    let mut raw = Vec::new();
    file.take(MAX_INPUT_BYTES + 1).read_to_end(&mut raw)?;
    if raw.len() as u64 > MAX_INPUT_BYTES {
        return Err(IoError::Invalid(format!(
            "{}: larger than {MAX_INPUT_BYTES} bytes",
            path.display()
        )));
    }
    Ok(serde_json::from_slice(&raw)?)
}

// ----------------------------- Params -----------------------------

pub fn load_params(path: &Path) -> IoResult<EngineParams> {
    let v = read_json_value(path)?;
    let params = params_from_value(v)?;
    debug!(path = %path.display(), "params loaded");
    Ok(params)
}

/// Parse params from a JSON string; absent fields take their defaults.
pub fn parse_params_str(s: &str) -> IoResult<EngineParams> {
    params_from_value(serde_json::from_str(s)?)
}

fn params_from_value(v: Value) -> IoResult<EngineParams> {
    if !v.is_object() {
        return Err(IoError::Json {
            pointer: "/".into(),
            msg: "params must be a JSON object".into(),
        });
    }
    let params: EngineParams = serde_json::from_value(v).map_err(|e| IoError::Json {
        pointer: "/".into(),
        msg: e.to_string(),
    })?;
    params.validate_domains()?;
    Ok(params)
}

// ----------------------------- Candidates -----------------------------

/// A JSON array of candidates, or an object with a `candidates` array.
/// Repeated ids are kept as given; pool population dedups them. Records that
/// do not decode as a candidate are skipped with a warning.
pub fn load_candidates(path: &Path) -> IoResult<Vec<Candidate>> {
    let v = read_json_value(path)?;
    let list = match v {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("candidates") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(IoError::Json {
                    pointer: "/candidates".into(),
                    msg: "missing candidates array".into(),
                })
            }
        },
        _ => {
            return Err(IoError::Json {
                pointer: "/".into(),
                msg: "expected an array or an object".into(),
            })
        }
    };

    let total = list.len();
    let mut candidates = Vec::with_capacity(total);
    for (i, item) in list.into_iter().enumerate() {
        match serde_json::from_value::<Candidate>(item) {
            Ok(c) => candidates.push(c),
            Err(e) => warn!(path = %path.display(), index = i, error = %e, "skipping candidate record"),
        }
    }
    debug!(path = %path.display(), count = candidates.len(), skipped = total - candidates.len(), "candidates loaded");
    Ok(candidates)
}
