//! Device session capability.
//!
//! The pipeline talks to devices only through [`Connector`] and
//! [`DeviceSession`]. [`SshConnector`] is the production implementation;
//! [`TimedConnector`] wraps any connector so that every operation carries a
//! bounded wait.

mod buffer;
pub mod prompt;
mod ssh;
#[cfg(test)]
pub(crate) mod testing;

pub use buffer::PatternBuffer;
pub use ssh::{SshConnector, SshOptions, SshSession};

use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::error::SessionError;
use crate::inventory::Device;

/// One authenticated command channel to a device.
pub trait DeviceSession: Send {
    /// Send a command in privileged EXEC and return its normalized output.
    fn send_command(
        &mut self,
        command: &str,
    ) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Enter configuration mode, send every command, and leave again.
    ///
    /// Returns the combined output of the configuration commands.
    fn send_config_set(
        &mut self,
        commands: &[String],
    ) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Close the session.
    fn close(&mut self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Opens sessions to devices.
pub trait Connector: Send + Sync {
    /// Session type produced by this connector.
    type Session: DeviceSession;

    /// Open and authenticate a session to `device`.
    fn open(
        &self,
        device: &Device,
    ) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}

/// Connector adapter that bounds `open` and every session call.
#[derive(Debug, Clone)]
pub struct TimedConnector<C> {
    inner: C,
    timeout: Duration,
}

impl<C> TimedConnector<C> {
    /// Wrap `inner`, failing any operation that exceeds `timeout`.
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The wrapped connector.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: Connector> Connector for TimedConnector<C> {
    type Session = TimedSession<C::Session>;

    async fn open(&self, device: &Device) -> Result<Self::Session, SessionError> {
        let session = bounded("open", self.timeout, self.inner.open(device)).await?;
        Ok(TimedSession {
            inner: session,
            timeout: self.timeout,
            expired: None,
        })
    }
}

/// Session whose every operation is bounded by a timeout.
///
/// A timed-out operation leaves the rest of its reply in flight, so the
/// session is retired: every later command fails with the original
/// `Timeout` instead of reading another command's output. `close` is still
/// attempted.
#[derive(Debug)]
pub struct TimedSession<S> {
    inner: S,
    timeout: Duration,
    expired: Option<(&'static str, Duration)>,
}

impl<S> TimedSession<S> {
    /// Whether an earlier operation timed out.
    pub fn is_expired(&self) -> bool {
        self.expired.is_some()
    }

    fn ensure_usable(&self) -> Result<(), SessionError> {
        match self.expired {
            Some((operation, after)) => Err(SessionError::Timeout { operation, after }),
            None => Ok(()),
        }
    }

    fn track<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(SessionError::Timeout { operation, after }) = &result {
            warn!("{operation} timed out after {after:?}, session retired");
            self.expired = Some((*operation, *after));
        }
        result
    }
}

impl<S: DeviceSession> DeviceSession for TimedSession<S> {
    async fn send_command(&mut self, command: &str) -> Result<String, SessionError> {
        self.ensure_usable()?;
        let result =
            bounded("send_command", self.timeout, self.inner.send_command(command)).await;
        self.track(result)
    }

    async fn send_config_set(&mut self, commands: &[String]) -> Result<String, SessionError> {
        self.ensure_usable()?;
        let result = bounded(
            "send_config_set",
            self.timeout,
            self.inner.send_config_set(commands),
        )
        .await;
        self.track(result)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        bounded("close", self.timeout, self.inner.close()).await
    }
}

async fn bounded<T>(
    operation: &'static str,
    after: Duration,
    fut: impl Future<Output = Result<T, SessionError>>,
) -> Result<T, SessionError> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| SessionError::Timeout { operation, after })?
}
