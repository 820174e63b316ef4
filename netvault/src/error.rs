//! Error types for netvault.
//!
//! Errors are layered by concern. Everything below [`Error`] is caught at the
//! device pipeline boundary and folded into that device's summary row; only
//! [`InventoryError`] and [`ConfigError`] abort a run, and only before any
//! device work has started.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netvault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Device session errors (connect, command round trips, timeouts)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Backup store errors (snapshot persistence and lookup)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Fact extraction errors
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Inventory loading errors
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Run configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Device session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session could not be opened.
    #[error("Connection to {host}:{port} failed: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    /// Authentication was rejected by the device.
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// A single command round trip failed.
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// A bounded wait on a session operation was exceeded.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The remote side closed the channel.
    #[error("Session disconnected")]
    Disconnected,

    /// SSH protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),
}

impl SessionError {
    /// Build a [`SessionError::CommandFailed`] for `command`.
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Backup store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing a snapshot or change artifact failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stored snapshot name does not carry a parseable timestamp.
    #[error("Malformed snapshot name {file:?}: {reason}")]
    MalformedSnapshotName { file: String, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Fact extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The expected pattern is absent from the command output.
    #[error("No {fact} found in command output")]
    PatternNotFound { fact: &'static str },

    /// The structured text template could not be compiled or applied.
    #[error("Template error: {0}")]
    Template(String),
}

/// Inventory loading errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// The inventory file could not be read.
    #[error("Failed to read inventory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A row could not be decoded.
    #[error("Malformed inventory row: {0}")]
    Row(#[from] csv::Error),

    /// A row decoded but failed validation.
    #[error("Invalid device on line {line}: {message}")]
    InvalidDevice { line: u64, message: String },

    /// Two rows share a hostname.
    #[error("Duplicate hostname '{hostname}' in inventory")]
    DuplicateHostname { hostname: String },
}

/// Run configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Result type alias using netvault's Error.
pub type Result<T> = std::result::Result<T, Error>;
