/*!
 * Configuration for smbfs clients
 */

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SmbError};

/// Client configuration threaded into connection and stream constructors.
///
/// There is deliberately no global settings object; whoever builds a
/// `CredentialScope` decides the configuration for everything derived
/// from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmbConfig {
    /// Upper bound, in seconds, on how long a single read or write may sit
    /// in pending-retry before it fails hard. This is the only tunable the
    /// stream engine consumes.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Server port for direct-TCP transports
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_session_timeout_secs() -> u64 {
    45
}

fn default_port() -> u16 {
    445
}

impl Default for SmbConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout_secs(),
            port: default_port(),
        }
    }
}

impl SmbConfig {
    /// Session timeout as a `Duration`, the form the retry policy consumes
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| SmbError::Config(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SmbConfig::default();
        assert_eq!(config.session_timeout_secs, 45);
        assert_eq!(config.port, 445);
        assert_eq!(config.session_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: SmbConfig = toml::from_str("session_timeout_secs = 10").unwrap();
        assert_eq!(config.session_timeout_secs, 10);
        assert_eq!(config.port, 445);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "session_timeout_secs = 5\nport = 4455").unwrap();

        let config = SmbConfig::load(file.path()).unwrap();
        assert_eq!(config.session_timeout_secs, 5);
        assert_eq!(config.port, 4455);
    }
}
