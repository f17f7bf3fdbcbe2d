//! Last-run state files.
//!
//! Each adapter keeps one JSON file, `{"last_fetch": <epoch seconds>}`. The
//! file is read before a fetch cycle and replaced after it.

use anyhow::{Context, Result};
use sa_core::LastRun;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and writes the last-run state of one adapter.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `adapter` inside `dir`, or the platform data directory.
    pub fn for_adapter(dir: Option<&Path>, adapter: &str) -> Self {
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(default_state_dir);
        Self::new(dir.join(format!("{}-last-run.json", adapter)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the state; a missing file means the first run.
    pub fn load(&self) -> Result<LastRun> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No state file, starting first run");
            return Ok(LastRun::first_run());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))
    }

    /// Writes the state to a temporary file and renames it into place.
    pub fn save(&self, last_run: &LastRun) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string(last_run)?)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;
        debug!(path = %self.path.display(), last_fetch = ?last_run.last_fetch, "Saved state");
        Ok(())
    }
}

fn default_state_dir() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "soar-adapters", "soar-adapters") {
        dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from("state")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_core::Watermark;

    #[test]
    fn test_missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::for_adapter(Some(dir.path()), "xmatters");
        assert!(store.load().unwrap().is_first_run());
        assert_eq!(store.path(), dir.path().join("xmatters-last-run.json"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("cisco.json"));

        store
            .save(&LastRun::at(Watermark::from_epoch_secs(1_589_884_500)))
            .unwrap();

        let written = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(written, r#"{"last_fetch":1589884500}"#);
        assert_eq!(
            store.load().unwrap().last_fetch,
            Some(Watermark::from_epoch_secs(1_589_884_500))
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        std::fs::write(store.path(), "not json").unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }
}
