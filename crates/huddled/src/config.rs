//! Server configuration.
//!
//! Settings are layered, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`ServerConfig::default`])
//! 2. An optional TOML file
//! 3. Environment (`HUDDLE_HOST`)
//! 4. The port given on the command line
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 4000
//! shutdown_keyword = "EXIT"
//! shutdown_grace_ms = 500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable overriding the bind host.
pub const HOST_ENV: &str = "HUDDLE_HOST";

/// Default bind host (all interfaces).
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default operator console shutdown keyword.
pub const DEFAULT_SHUTDOWN_KEYWORD: &str = "EXIT";

/// Default time allowed for writers to flush on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 500;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Relay server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// TCP port to listen on (0 picks an ephemeral port)
    pub port: u16,

    /// Console line that shuts the server down
    pub shutdown_keyword: String,

    /// Milliseconds allowed for queued frames to drain on shutdown
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            shutdown_keyword: DEFAULT_SHUTDOWN_KEYWORD.to_string(),
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl ServerConfig {
    /// Parses a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Pass `|key| std::env::var(key).ok()` for the process environment.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV).filter(|host| !host.is_empty()) {
            self.host = host;
        }
        self
    }

    /// Sets the listening port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Address string passed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shutdown grace period as a `Duration`.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.shutdown_keyword, "EXIT");
        assert_eq!(config.shutdown_grace(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml_str("port = 4000\n").unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.shutdown_keyword, DEFAULT_SHUTDOWN_KEYWORD);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = ServerConfig::from_toml_str("colour = \"blue\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"127.0.0.1\"").unwrap();
        writeln!(file, "shutdown_keyword = \"QUIT\"").unwrap();
        writeln!(file, "shutdown_grace_ms = 50").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.shutdown_keyword, "QUIT");
        assert_eq!(config.shutdown_grace_ms, 50);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ServerConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_env_and_port_override() {
        let config = ServerConfig::default()
            .with_env_overrides(|key| (key == HOST_ENV).then(|| "10.0.0.5".to_string()))
            .with_port(7000);

        assert_eq!(config.bind_addr(), "10.0.0.5:7000");
    }

    #[test]
    fn test_empty_env_ignored() {
        let config = ServerConfig::default().with_env_overrides(|_| Some(String::new()));
        assert_eq!(config.host, DEFAULT_HOST);
    }
}
