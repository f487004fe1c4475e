use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::Channel;

/// Failures outside the analysis core: reading config or session files.
#[derive(Error, Debug)]
pub enum LapLensError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Conditions the core absorbs locally. They never abort a run; they are
/// collected on the processed session so a caller can report them.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    #[error("channel {channel} is not present; dependent fields omitted")]
    MissingChannel { channel: Channel },
    #[error("{what} needs at least {needed} laps, found {found}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        found: usize,
    },
    #[error("vehicle id {raw:?} does not match GR86-<chassis>-<car>")]
    MalformedIdentifier { raw: String },
    #[error("unparseable timestamp {value:?} at row {row}")]
    UnparseableTimestamp { row: usize, value: String },
}
