//! Configuration loading and root folder resolution
//!
//! The root folder holds everything rtag owns: the replay archive and the
//! record database. Resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `RTAG_ROOT_FOLDER`
//! 3. `root_folder` in the module's TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Missing or unreadable config files never abort startup; they log a
//! warning and fall back to defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "RTAG_ROOT_FOLDER";

/// Subdirectory of the root folder holding canonical replay copies
pub const ARCHIVE_SUBDIRECTORY: &str = "replay_archive";

/// Record database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "replays.db";

/// Default replay file extension
pub const DEFAULT_REPLAY_EXTENSION: &str = "SC2Replay";

/// Built-in defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("rtag"))
            .unwrap_or_else(|| PathBuf::from("./rtag_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// External replay parser invocation
///
/// The parser is run as `command args... <replay path>` and must print the
/// replay telemetry as JSON on stdout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

/// TOML configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Replay file extension used for archive names and directory scans
    #[serde(default)]
    pub replay_extension: Option<String>,

    /// Override for the game's accounts directory (most-recent replay lookup)
    #[serde(default)]
    pub accounts_dir: Option<PathBuf>,
}

impl TomlConfig {
    pub fn replay_extension(&self) -> &str {
        self.replay_extension
            .as_deref()
            .unwrap_or(DEFAULT_REPLAY_EXTENSION)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Path of a module's TOML config file: `<config_dir>/rtag/<module>.toml`
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rtag").join(format!("{}.toml", module_name)))
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load a module's TOML config, falling back to defaults
///
/// A missing file is silent; an unreadable or malformed one logs a warning.
pub fn load_module_config(module_name: &str) -> TomlConfig {
    let Some(path) = config_file_path(module_name) else {
        return TomlConfig::default();
    };

    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{} - using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Resolves the root folder following the priority order above
pub struct RootFolderResolver {
    module_name: String,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
        }
    }

    /// Resolve using environment, config file, and compiled default
    pub fn resolve(&self) -> PathBuf {
        self.resolve_with(None, None)
    }

    /// Resolve with an optional CLI argument and an already-loaded config
    pub fn resolve_with(&self, cli_arg: Option<&Path>, config: Option<&TomlConfig>) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        let loaded;
        let config = match config {
            Some(config) => config,
            None => {
                loaded = load_module_config(&self.module_name);
                &loaded
            }
        };
        if let Some(root) = &config.root_folder {
            return root.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout and names the files inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root_folder.join(ARCHIVE_SUBDIRECTORY)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Create the root folder and archive subdirectory (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.archive_path())?;
        Ok(())
    }
}
