//! Stage dataset files: each stage reads its predecessor's JSON file and
//! writes its own. Saves merge by handle so a partial re-run never drops
//! rows written by an earlier run.

use std::path::Path;

use signalscout_common::{Profile, ScoutError};
use tracing::warn;

/// Load a profile dataset. Missing file means the stage has not produced
/// output yet; an unreadable file is logged and treated the same way.
pub fn load_profiles(path: &Path) -> Vec<Profile> {
    let raw = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read dataset, treating as empty");
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(profiles) => profiles,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Dataset is corrupt, treating as empty");
            Vec::new()
        }
    }
}

pub fn save_profiles(path: &Path, profiles: &[Profile]) -> Result<(), ScoutError> {
    let io_err = |source: std::io::Error| ScoutError::StateIo {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(profiles)
        .map_err(|e| io_err(std::io::Error::other(e)))?;
    std::fs::write(path, json).map_err(io_err)
}

/// Merge `updates` into `existing` by handle: updated rows replace their
/// previous version in place, new rows append in order.
pub fn upsert_by_handle(existing: Vec<Profile>, updates: Vec<Profile>) -> Vec<Profile> {
    let mut merged = existing;
    for update in updates {
        match merged.iter_mut().find(|p| p.handle == update.handle) {
            Some(slot) => *slot = update,
            None => merged.push(update),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dataset_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_profiles(&dir.path().join("nope.json")).is_empty());
    }

    #[test]
    fn corrupt_dataset_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[{").unwrap();
        assert!(load_profiles(&path).is_empty());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles_raw.json");
        let profiles = vec![Profile::skeleton("alice", Some("ai agents"))];
        save_profiles(&path, &profiles).unwrap();

        let loaded = load_profiles(&path);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].handle, "alice");
        assert_eq!(loaded[0].source_topic.as_deref(), Some("ai agents"));
    }

    #[test]
    fn upsert_replaces_in_place_and_appends_new() {
        let existing = vec![
            Profile::skeleton("alice", None),
            Profile::skeleton("bob", None),
        ];
        let mut updated_alice = Profile::skeleton("alice", None);
        updated_alice.bio = Some("builder".to_string());

        let merged = upsert_by_handle(
            existing,
            vec![updated_alice, Profile::skeleton("carol", None)],
        );
        let handles: Vec<&str> = merged.iter().map(|p| p.handle.as_str()).collect();
        assert_eq!(handles, vec!["alice", "bob", "carol"]);
        assert_eq!(merged[0].bio.as_deref(), Some("builder"));
    }
}
