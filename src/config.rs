use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A backup appliance the CLI can talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub url: String,
    pub username: String,
}

/// Local client settings, read from `~/.config/cloudbackup-ctl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    pub default_profile: Option<String>,
    /// Per-request timeout; unset means requests never time out.
    pub request_timeout_secs: Option<u64>,
    pub log_poll_interval_ms: u64,
    pub log_lines: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_profile: None,
            request_timeout_secs: None,
            log_poll_interval_ms: 1000,
            log_lines: 50,
        }
    }
}

impl ClientSettings {
    pub fn path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config/cloudbackup-ctl/config.toml"))
    }

    /// Loads settings, falling back to defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn log_poll_interval(&self) -> Duration {
        Duration::from_millis(self.log_poll_interval_ms.max(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = ClientSettings::parse("").unwrap();
        assert_eq!(settings, ClientSettings::default());
        assert_eq!(settings.log_poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings = ClientSettings::parse("default_profile = \"nas\"\nlog_lines = 200\n").unwrap();
        assert_eq!(settings.default_profile.as_deref(), Some("nas"));
        assert_eq!(settings.log_lines, 200);
        assert_eq!(settings.request_timeout(), None);
    }

    #[test]
    fn test_timeout_is_opt_in() {
        let settings = ClientSettings::parse("request_timeout_secs = 30\n").unwrap();
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(30)));
    }
}
