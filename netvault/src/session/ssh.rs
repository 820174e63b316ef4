//! SSH device session using russh.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use regex::bytes::Regex;
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg, Disconnect};
use secrecy::ExposeSecret;

use super::buffer::PatternBuffer;
use super::prompt::{
    ANY_PROMPT, CONFIG_PROMPT, ENABLE_RESPONSE, EXEC_PROMPT, ON_OPEN_COMMANDS, PASSWORD_PROMPT,
    PRIVILEGED_PROMPT, detect_failure, normalize_output,
};
use super::{Connector, DeviceSession};
use crate::error::SessionError;
use crate::inventory::Device;

/// Options for [`SshConnector`].
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Bound on TCP connect plus SSH handshake.
    pub connect_timeout: Duration,

    /// Bound on waiting for a prompt after sending a command.
    pub read_timeout: Duration,

    /// Terminal width for the PTY.
    pub terminal_width: u32,

    /// Terminal height for the PTY.
    pub terminal_height: u32,

    /// Bytes from the end of the output searched for the prompt.
    pub search_depth: usize,

    /// Reject hosts whose key is not in the user's `known_hosts`.
    pub verify_host_key: bool,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            search_depth: 1000,
            verify_host_key: false,
        }
    }
}

/// Opens [`SshSession`]s to Cisco IOS devices.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    options: SshOptions,
}

impl SshConnector {
    /// Create a connector with the given options.
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    /// Get the connector options.
    pub fn options(&self) -> &SshOptions {
        &self.options
    }
}

impl Connector for SshConnector {
    type Session = SshSession;

    async fn open(&self, device: &Device) -> Result<SshSession, SessionError> {
        SshSession::connect(device, &self.options).await
    }
}

/// Interactive shell session in privileged exec.
pub struct SshSession {
    hostname: String,
    handle: Handle<SshHandler>,
    channel: Channel<Msg>,
    buffer: PatternBuffer,
    read_timeout: Duration,
    /// Set when a read gave up before the prompt; the channel is then out
    /// of step with the commands sent.
    desynced: bool,
    closed: bool,
}

impl SshSession {
    /// Connect, authenticate, reach privileged exec and disable paging.
    pub async fn connect(device: &Device, options: &SshOptions) -> Result<Self, SessionError> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(options.read_timeout),
            ..Default::default()
        });

        let handler = SshHandler {
            host: device.address.clone(),
            port: device.port,
            verify_host_key: options.verify_host_key,
        };

        let connection_failed = |reason: String| SessionError::ConnectionFailed {
            host: device.address.clone(),
            port: device.port,
            reason,
        };

        debug!("{}: connecting to {}:{}", device.hostname, device.address, device.port);
        let mut handle = tokio::time::timeout(
            options.connect_timeout,
            client::connect(config, (device.address.as_str(), device.port), handler),
        )
        .await
        .map_err(|_| SessionError::Timeout {
            operation: "connect",
            after: options.connect_timeout,
        })?
        .map_err(|e| connection_failed(e.to_string()))?;

        let auth = handle
            .authenticate_password(device.username.as_str(), device.password.expose_secret())
            .await?;
        if !auth.success() {
            return Err(SessionError::AuthenticationFailed {
                user: device.username.clone(),
            });
        }

        let channel = handle.channel_open_session().await?;
        channel
            .request_pty(
                true,
                "xterm",
                options.terminal_width,
                options.terminal_height,
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(true).await?;

        let mut session = Self {
            hostname: device.hostname.clone(),
            handle,
            channel,
            buffer: PatternBuffer::new(options.search_depth),
            read_timeout: options.read_timeout,
            desynced: false,
            closed: false,
        };

        if let Err(e) = session.prepare(device).await {
            if let Err(close) = session.close().await {
                debug!("{}: close after failed setup: {}", session.hostname, close);
            }
            return Err(e);
        }

        debug!("{}: session ready", session.hostname);
        Ok(session)
    }

    /// Wait for the first prompt, escalate if needed, and disable paging.
    async fn prepare(&mut self, device: &Device) -> Result<(), SessionError> {
        let banner = self.read_until(&ANY_PROMPT).await?;
        if EXEC_PROMPT.is_match(banner.as_bytes()) {
            self.enable(device).await?;
        }

        for command in ON_OPEN_COMMANDS {
            self.exchange(command, &ANY_PROMPT).await?;
        }
        Ok(())
    }

    /// Escalate from exec to privileged exec.
    async fn enable(&mut self, device: &Device) -> Result<(), SessionError> {
        self.write_line("enable").await?;
        let response = self.read_until(&ENABLE_RESPONSE).await?;

        let response = if PASSWORD_PROMPT.is_match(response.as_bytes()) {
            self.write_line(device.secret.expose_secret()).await?;
            self.read_until(&ANY_PROMPT).await?
        } else {
            response
        };

        if !PRIVILEGED_PROMPT.is_match(response.as_bytes()) {
            return Err(SessionError::command(
                "enable",
                "privileged exec not reached",
            ));
        }
        Ok(())
    }

    /// Send one line and wait for `prompt`, returning normalized output.
    async fn exchange(&mut self, command: &str, prompt: &Regex) -> Result<String, SessionError> {
        trace!("{}: >> {}", self.hostname, command);
        self.write_line(command).await?;
        let raw = self.read_until(prompt).await?;
        let output = normalize_output(&raw, command);

        if let Some(marker) = detect_failure(&output) {
            return Err(SessionError::command(command, marker));
        }
        Ok(output)
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SessionError> {
        if self.desynced {
            return Err(SessionError::Timeout {
                operation: "read",
                after: self.read_timeout,
            });
        }
        self.buffer.clear();
        let data = format!("{line}\n");
        self.channel.data(data.as_bytes()).await?;
        Ok(())
    }

    /// Read channel data until `pattern` matches the buffer tail.
    async fn read_until(&mut self, pattern: &Regex) -> Result<String, SessionError> {
        let deadline = tokio::time::Instant::now() + self.read_timeout;

        loop {
            if self.buffer.tail_contains(pattern) {
                return Ok(self.buffer.take_string());
            }

            let Ok(msg) = tokio::time::timeout_at(deadline, self.channel.wait()).await else {
                warn!(
                    "{}: no prompt within {:?}, session retired",
                    self.hostname, self.read_timeout
                );
                self.desynced = true;
                return Err(SessionError::Timeout {
                    operation: "read",
                    after: self.read_timeout,
                });
            };

            match msg {
                Some(ChannelMsg::Data { data }) => self.buffer.extend(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => self.buffer.extend(&data),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(SessionError::Disconnected);
                }
                Some(_) => {}
            }
        }
    }
}

impl DeviceSession for SshSession {
    async fn send_command(&mut self, command: &str) -> Result<String, SessionError> {
        self.exchange(command, &ANY_PROMPT).await
    }

    async fn send_config_set(&mut self, commands: &[String]) -> Result<String, SessionError> {
        self.exchange("configure terminal", &CONFIG_PROMPT).await?;

        let mut output = String::new();
        for command in commands {
            match self.exchange(command, &CONFIG_PROMPT).await {
                Ok(result) => {
                    output.push_str(&result);
                    output.push('\n');
                }
                Err(e) => {
                    // Leave config mode so the session stays usable.
                    if let Err(end) = self.exchange("end", &PRIVILEGED_PROMPT).await {
                        warn!("{}: failed to leave config mode: {}", self.hostname, end);
                    }
                    return Err(e);
                }
            }
        }

        self.exchange("end", &PRIVILEGED_PROMPT).await?;
        Ok(output)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        debug!("{}: session closed", self.hostname);
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("{}: SshSession dropped without close()", self.hostname);
        }
    }
}

/// russh client handler; only host key checking is customised.
struct SshHandler {
    host: String,
    port: u16,
    verify_host_key: bool,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        if !self.verify_host_key {
            return Ok(true);
        }

        match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!("Host key for {}:{} is not in known_hosts", self.host, self.port);
                Ok(false)
            }
            Err(e) => {
                warn!("Host key check for {}:{} failed: {}", self.host, self.port, e);
                Ok(false)
            }
        }
    }
}
