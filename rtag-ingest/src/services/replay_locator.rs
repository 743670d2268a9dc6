//! Most-recently-played replay lookup
//!
//! The game saves multiplayer replays under
//! `<accounts>/<account>/<profile>/Replays/Multiplayer/*.<ext>`.

use rtag_common::config::TomlConfig;
use rtag_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

/// Depth of a replay file below the accounts directory
const REPLAY_DEPTH: usize = 5;

pub struct ReplayLocator {
    accounts_dir: PathBuf,
    extension: String,
}

impl ReplayLocator {
    pub fn new(accounts_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            accounts_dir: accounts_dir.into(),
            extension: extension.into(),
        }
    }

    /// Locator for the configured or platform-default accounts directory
    ///
    /// # Errors
    /// `Config` on platforms without a known default when no override is set.
    pub fn from_config(config: &TomlConfig) -> Result<Self> {
        let accounts_dir = config
            .accounts_dir
            .clone()
            .or_else(Self::default_accounts_dir)
            .ok_or_else(|| {
                Error::Config(
                    "No default replay location on this platform; set accounts_dir".to_string(),
                )
            })?;
        Ok(Self::new(accounts_dir, config.replay_extension()))
    }

    pub fn default_accounts_dir() -> Option<PathBuf> {
        if cfg!(target_os = "macos") {
            dirs::home_dir().map(|home| {
                home.join("Library/Application Support/Blizzard/StarCraft II/Accounts")
            })
        } else if cfg!(target_os = "windows") {
            dirs::document_dir().map(|docs| docs.join("StarCraft II").join("Accounts"))
        } else {
            None
        }
    }

    pub fn accounts_dir(&self) -> &Path {
        &self.accounts_dir
    }

    /// Newest multiplayer replay by modification time, if any exist
    pub fn find_most_recent(&self) -> Result<Option<PathBuf>> {
        if !self.accounts_dir.is_dir() {
            debug!(dir = %self.accounts_dir.display(), "Accounts directory missing");
            return Ok(None);
        }

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        let walker = WalkDir::new(&self.accounts_dir)
            .min_depth(REPLAY_DEPTH)
            .max_depth(REPLAY_DEPTH)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    None
                }
            });

        for entry in walker {
            if !entry.file_type().is_file() || !self.is_multiplayer_replay(entry.path()) {
                continue;
            }

            let modified = entry.metadata().map_err(std::io::Error::from)?.modified()?;
            if newest.as_ref().map_or(true, |(time, _)| modified > *time) {
                newest = Some((modified, entry.into_path()));
            }
        }

        Ok(newest.map(|(_, path)| path))
    }

    fn is_multiplayer_replay(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.as_str()));
        let parent = path.parent();
        let in_multiplayer = parent
            .and_then(Path::file_name)
            .is_some_and(|name| name == "Multiplayer");
        let in_replays = parent
            .and_then(Path::parent)
            .and_then(Path::file_name)
            .is_some_and(|name| name == "Replays");

        has_extension && in_multiplayer && in_replays
    }
}
