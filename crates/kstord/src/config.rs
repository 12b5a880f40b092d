//! Daemon configuration, loaded from YAML with per-field defaults.
//!
//! ```yaml
//! database: /var/lib/kstor/kstor.db
//! socket: /run/kstor/kstor.socket
//! nworkers: 5
//! session_idle_timeout: 900
//! session_life_timeout: 14400
//! log_level: warn
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_socket")]
    pub socket: PathBuf,
    #[serde(default = "default_nworkers")]
    pub nworkers: usize,
    /// Seconds of inactivity after which a session dies.
    #[serde(default = "default_idle_timeout")]
    pub session_idle_timeout: u64,
    /// Absolute session lifetime, seconds.
    #[serde(default = "default_life_timeout")]
    pub session_life_timeout: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database() -> PathBuf {
    PathBuf::from("kstor.db")
}

fn default_socket() -> PathBuf {
    PathBuf::from("kstor.socket")
}

fn default_nworkers() -> usize {
    5
}

fn default_idle_timeout() -> u64 {
    900
}

fn default_life_timeout() -> u64 {
    14400
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            socket: default_socket(),
            nworkers: default_nworkers(),
            session_idle_timeout: default_idle_timeout(),
            session_life_timeout: default_life_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening config {}", path.display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.nworkers, 5);
        assert_eq!(config.session_idle_timeout, 900);
        assert_eq!(config.session_life_timeout, 14400);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn partial_file_overrides_some_fields() {
        let config: Config =
            serde_yaml::from_str("nworkers: 2\nsocket: /tmp/k.sock\n").unwrap();
        assert_eq!(config.nworkers, 2);
        assert_eq!(config.socket, PathBuf::from("/tmp/k.sock"));
        assert_eq!(config.session_idle_timeout, 900);
    }
}
