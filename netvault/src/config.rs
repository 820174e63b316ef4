//! Run configuration.
//!
//! A [`RunConfig`] is built once at start-up and handed by reference to the
//! fleet orchestrator; nothing in the crate reads process-wide settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;

use crate::error::ConfigError;

/// Placeholder in the command list replaced by the NTP source address.
pub const NTP_PLACEHOLDER: &str = "$NTP_IP_ADDRESS$";

/// Built-in TextFSM template for `show cdp neighbors detail`.
pub const CDP_NEIGHBOR_TEMPLATE: &str =
    include_str!("../templates/cisco_ios_show_cdp_neighbors_detail.textfsm");

/// Configuration for one orchestration run.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use netvault::RunConfig;
///
/// let config = RunConfig::new("/var/backups/network")
///     .ntp_server("10.0.0.123")
///     .workers(8)
///     .command_timeout(Duration::from_secs(60));
/// assert_eq!(config.workers, 8);
/// ```
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root directory holding one sub-directory per hostname.
    pub backup_root: PathBuf,

    /// Address pinged before, and configured during, NTP convergence.
    pub ntp_server: String,

    /// Maximum number of simultaneously active device sessions.
    pub workers: usize,

    /// Bound on every device session operation.
    pub command_timeout: Duration,

    /// TextFSM template applied to `show cdp neighbors detail`.
    pub neighbor_template: String,
}

impl RunConfig {
    /// Create a configuration rooted at `backup_root` with default settings.
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
            ntp_server: "192.168.0.1".to_string(),
            workers: 4,
            command_timeout: Duration::from_secs(30),
            neighbor_template: CDP_NEIGHBOR_TEMPLATE.to_string(),
        }
    }

    /// Set the NTP source address.
    pub fn ntp_server(mut self, address: impl Into<String>) -> Self {
        self.ntp_server = address.into();
        self
    }

    /// Set the worker limit (at least one).
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the per-operation session timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Replace the neighbor template.
    pub fn neighbor_template(mut self, template: impl Into<String>) -> Self {
        self.neighbor_template = template.into();
        self
    }

    /// Replace the neighbor template with the contents of a file.
    pub fn neighbor_template_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let template = read_to_string(path.as_ref())?;
        Ok(self.neighbor_template(template))
    }
}

/// Declarative configuration commands pushed during NTP convergence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSet {
    commands: Vec<String>,
}

impl CommandSet {
    /// Build a command set from newline-delimited text.
    ///
    /// Lines are trimmed, blank lines dropped, and every
    /// [`NTP_PLACEHOLDER`] is replaced with `ntp_server`.
    pub fn parse(text: &str, ntp_server: &str) -> Self {
        let commands = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.replace(NTP_PLACEHOLDER, ntp_server))
            .collect();
        Self { commands }
    }

    /// Load a command set from a file.
    pub fn from_file(path: impl AsRef<Path>, ntp_server: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let set = Self::parse(&read_to_string(path)?, ntp_server);
        if set.is_empty() {
            return Err(ConfigError::Invalid {
                message: format!("{} contains no commands", path.display()),
            });
        }
        info!("Loaded {} config commands from {}", set.len(), path.display());
        Ok(set)
    }

    /// The substituted commands, in file order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CommandSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().map(Into::into).collect(),
        }
    }
}

fn read_to_string(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::new("backups");
        assert_eq!(config.workers, 4);
        assert_eq!(config.ntp_server, "192.168.0.1");
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert!(config.neighbor_template.contains("Device ID"));
    }

    #[test]
    fn test_workers_at_least_one() {
        assert_eq!(RunConfig::new("b").workers(0).workers, 1);
    }

    #[test]
    fn test_placeholder_substitution() {
        let text = "ntp server $NTP_IP_ADDRESS$\n\n  ntp update-calendar  \nclock timezone UTC 0\n";
        let set = CommandSet::parse(text, "10.1.1.1");
        assert_eq!(
            set.commands(),
            [
                "ntp server 10.1.1.1",
                "ntp update-calendar",
                "clock timezone UTC 0"
            ]
        );
    }

    #[test]
    fn test_from_file_missing_is_error() {
        let err = CommandSet::from_file("/nonexistent/commands.txt", "1.1.1.1").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_from_file_empty_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.txt");
        std::fs::write(&path, "\n   \n").unwrap();
        assert!(matches!(
            CommandSet::from_file(&path, "1.1.1.1"),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
