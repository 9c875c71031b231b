//! Process configuration: CLI flags with `LIBCAT_*` environment fallbacks,
//! plus an optional YAML file carrying the security header settings.

use clap::Parser;
use libcat_core::{default_log_level, SecuritySettings};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Database location that keeps everything in memory.
pub const IN_MEMORY_DB: &str = ":memory:";

#[derive(Parser, Debug, Clone)]
#[command(name = "libcat_server", version, about = "Library catalog HTTP service")]
pub struct Args {
    /// Socket address to listen on
    #[arg(long, env = "LIBCAT_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// SQLite database file, or `:memory:`
    #[arg(long, env = "LIBCAT_DB", default_value = "libcat.sqlite3")]
    pub db: String,

    /// One of trace|debug|info|warn|error
    #[arg(long, env = "LIBCAT_LOG_LEVEL", default_value = default_log_level())]
    pub log_level: String,

    /// Absolute directory for rotating log files; stderr when unset
    #[arg(long, env = "LIBCAT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// YAML file with security header settings
    #[arg(long, env = "LIBCAT_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn uses_in_memory_db(&self) -> bool {
        self.db == IN_MEMORY_DB
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Yaml { path: PathBuf, source: serde_yaml::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Yaml { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Yaml { source, .. } => Some(source),
        }
    }
}

/// Settings used when no config file is given: XSS filter on, no CSP.
pub fn default_security_settings() -> SecuritySettings {
    SecuritySettings {
        secure_browser_xss_filter: true,
        ..SecuritySettings::default()
    }
}

/// Loads security settings from `path`, or the defaults when `None`.
///
/// Keys missing from the file are off/empty.
pub fn load_security_settings(path: Option<&Path>) -> Result<SecuritySettings, ConfigError> {
    let Some(path) = path else {
        return Ok(default_security_settings());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_security_settings(&raw).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_security_settings(raw: &str) -> Result<SecuritySettings, serde_yaml::Error> {
    if raw.trim().is_empty() {
        return Ok(SecuritySettings::default());
    }
    serde_yaml::from_str(raw)
}
