use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;

use crate::models::BotState;

/// Durable home of [`BotState`], one JSON file under `storage/`.
///
/// Reads degrade: a missing or unreadable file yields the default state, so
/// the relay keeps running at the cost of possibly re-notifying posts it had
/// already seen. Writes go through a temp file and rename so a crash
/// mid-save leaves either the old state or the new one, never a torn file.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> BotState {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return BotState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read state file, starting fresh");
                return BotState::default();
            }
        };
        match serde_json::from_str(&data) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file is corrupt, starting fresh");
                BotState::default()
            }
        }
    }

    pub fn save(&self, state: &BotState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(state)?;

        // Write atomically via temp file
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
