//! On-disk state schema, legacy migration, and atomic load/save.
//!
//! Loading never fails: a missing file is the first-run condition and a
//! malformed file is logged and replaced by an empty state. Saving fails
//! loudly — an unsaved mutation can be redone, a corrupted file breaks every
//! future run. Writes go through a temp file in the same directory and a
//! rename, so a kill mid-save never leaves a half-written state file.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use signalscout_common::ScoutError;
use tracing::warn;

use crate::stage::Stage;
use crate::state::TopicRecord;

// ---------------------------------------------------------------------------
// Canonical schema
// ---------------------------------------------------------------------------

/// The full persisted state. Profile and stage maps are insertion-ordered,
/// which is the iteration order the query engine guarantees to callers.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    pub profiles: IndexMap<String, ProfileEntry>,
    pub pipeline: PipelineMeta,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub stages: IndexMap<Stage, DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PipelineMeta {
    /// Pipeline-wide watermark: when each stage last completed a batch.
    pub last_run: IndexMap<Stage, DateTime<Utc>>,
    pub topics_mined: IndexMap<String, TopicRecord>,
}

// ---------------------------------------------------------------------------
// Raw schema — tolerates the legacy topics form and stray stage keys
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RawStateFile {
    #[serde(default)]
    profiles: IndexMap<String, RawProfileEntry>,
    #[serde(default)]
    pipeline: RawPipelineMeta,
}

#[derive(Debug, Default, Deserialize)]
struct RawProfileEntry {
    #[serde(default)]
    stages: IndexMap<String, DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPipelineMeta {
    #[serde(default)]
    last_run: IndexMap<String, DateTime<Utc>>,
    #[serde(default)]
    topics_mined: RawTopics,
}

/// `topics_mined` was once a flat list of topic names. Both forms must load.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTopics {
    Legacy(Vec<String>),
    Current(IndexMap<String, TopicRecord>),
}

impl Default for RawTopics {
    fn default() -> Self {
        RawTopics::Current(IndexMap::new())
    }
}

/// Upgrade a raw state to the canonical form. Pure, and run exactly once at
/// load time, so no accessor can trigger migration on its own schedule.
///
/// Legacy topic names become completed records with zero results; stage keys
/// that are not part of the pipeline are dropped with a warning rather than
/// poisoning the whole file.
fn migrate(raw: RawStateFile) -> StateFile {
    let profiles = raw
        .profiles
        .into_iter()
        .map(|(handle, entry)| {
            let stages = entry
                .stages
                .into_iter()
                .filter_map(|(key, ts)| match key.parse::<Stage>() {
                    Ok(stage) => Some((stage, ts)),
                    Err(_) => {
                        warn!(handle = handle.as_str(), stage = key.as_str(), "Dropping unknown stage key");
                        None
                    }
                })
                .collect();
            (handle, ProfileEntry { stages })
        })
        .collect();

    let last_run = raw
        .pipeline
        .last_run
        .into_iter()
        .filter_map(|(key, ts)| match key.parse::<Stage>() {
            Ok(stage) => Some((stage, ts)),
            Err(_) => {
                warn!(stage = key.as_str(), "Dropping unknown last_run stage key");
                None
            }
        })
        .collect();

    let topics_mined = match raw.pipeline.topics_mined {
        RawTopics::Current(topics) => topics,
        RawTopics::Legacy(names) => {
            warn!(count = names.len(), "Migrating legacy topic list to record map");
            names
                .into_iter()
                .map(|name| (name, TopicRecord::legacy()))
                .collect()
        }
    };

    StateFile {
        profiles,
        pipeline: PipelineMeta {
            last_run,
            topics_mined,
        },
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Read the state file, or return an empty state when it is missing or
/// unparseable. The pipeline must always be able to start cold.
pub fn load_state(path: &Path) -> StateFile {
    let raw = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StateFile::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read state file, starting empty");
            return StateFile::default();
        }
    };

    match serde_json::from_str::<RawStateFile>(&raw) {
        Ok(parsed) => migrate(parsed),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "State file is corrupt, starting empty");
            StateFile::default()
        }
    }
}

/// Write the full state, overwriting the previous version atomically.
pub fn save_state(path: &Path, state: &StateFile) -> Result<(), ScoutError> {
    let io_err = |source: std::io::Error| ScoutError::StateIo {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let json = serde_json::to_string_pretty(state).map_err(|e| io_err(std::io::Error::other(e)))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(json.as_bytes()).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
