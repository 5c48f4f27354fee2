//! System configuration shared by the CLI and the web service.
//!
//! Resolution order (later wins): built-in defaults, `config.toml` in the
//! Hyperlens home, environment variables, then CLI flags applied by the
//! caller.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::defaults::{
    DEFAULT_BIND_ADDR, DEFAULT_ENGINE_PROGRAM, DEFAULT_ENGINE_SCRIPT, DEFAULT_LOG_FILTER,
    LOG_MAX_FILES, LOG_MAX_FILE_BYTES, MAX_UPLOAD_BYTES, STAGING_RETENTION_SECS,
    SWEEP_INTERVAL_SECS,
};
use crate::paths::{default_config_path, default_staging_dir};

pub const ENV_ENGINE: &str = "HYPERLENS_ENGINE";
pub const ENV_BIND: &str = "HYPERLENS_BIND";
pub const ENV_STAGING_DIR: &str = "HYPERLENS_STAGING_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// How to launch the inspection engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Program to execute (interpreter or standalone engine binary).
    pub program: PathBuf,
    /// Leading arguments placed before the operation verb (e.g. the helper script).
    pub args: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_ENGINE_PROGRAM),
            args: vec![DEFAULT_ENGINE_SCRIPT.to_string()],
        }
    }
}

impl EngineSettings {
    /// A standalone engine executable that takes the operation verb directly.
    pub fn standalone(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingSettings {
    pub dir: PathBuf,
    pub max_upload_bytes: u64,
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            retention_secs: STAGING_RETENTION_SECS,
            sweep_interval_secs: SWEEP_INTERVAL_SECS,
        }
    }
}

impl StagingSettings {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Log file rotation and the default filter. `RUST_LOG` still wins over
/// `filter` when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
    pub max_files: usize,
    pub max_file_bytes: u64,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            max_files: LOG_MAX_FILES,
            max_file_bytes: LOG_MAX_FILE_BYTES,
        }
    }
}

/// Canonical configuration used by every Hyperlens entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperlensConfig {
    pub engine: EngineSettings,
    pub server: ServerSettings,
    pub staging: StagingSettings,
    pub logging: LoggingSettings,
}

impl HyperlensConfig {
    /// Load from the default config path, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file_or_default(&default_config_path())?;
        config.apply_env();
        Ok(config)
    }

    /// Parse `path` if it exists; a missing file yields the defaults.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var_os(ENV_ENGINE).map(PathBuf::from),
            std::env::var(ENV_BIND).ok(),
            std::env::var_os(ENV_STAGING_DIR).map(PathBuf::from),
        );
    }

    /// Apply explicit overrides. An engine override names a standalone
    /// executable, so the configured leading args are dropped.
    pub fn apply_overrides(
        &mut self,
        engine: Option<PathBuf>,
        bind: Option<String>,
        staging_dir: Option<PathBuf>,
    ) {
        if let Some(program) = engine {
            self.engine = EngineSettings::standalone(program);
        }
        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        if let Some(dir) = staging_dir {
            self.staging.dir = dir;
        }
    }
}
