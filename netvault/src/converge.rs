//! NTP configuration convergence.
//!
//! Linear and single-shot: ping the NTP source, apply the command set and
//! save, then verify synchronization. Nothing is pushed when the ping
//! fails.

use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::CommandSet;
use crate::error::SessionError;
use crate::session::DeviceSession;

/// Marker of a fully successful reachability check.
pub const PING_SUCCESS_MARKER: &str = "Success rate is 100 percent";

/// Marker of a synchronized clock in `show ntp status`.
pub const SYNCHRONIZED_MARKER: &str = "Clock is synchronized";

pub const SAVE_COMMAND: &str = "write memory";
pub const SHOW_NTP_STATUS: &str = "show ntp status";

/// Outcome of one convergence attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConvergenceResult {
    Synchronized,
    NotSynchronized,
    SourceUnreachable,
}

impl fmt::Display for ConvergenceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synchronized => write!(f, "NTP is sync"),
            Self::NotSynchronized => write!(f, "NTP not sync"),
            Self::SourceUnreachable => write!(f, "NTP unavailable"),
        }
    }
}

/// Converge the device's NTP configuration towards `commands`.
///
/// Any failed command aborts the remaining steps and is returned as is.
pub async fn converge(
    session: &mut impl DeviceSession,
    ntp_server: &str,
    commands: &CommandSet,
) -> Result<ConvergenceResult, SessionError> {
    let ping = session.send_command(&format!("ping {ntp_server}")).await?;
    if !ping.contains(PING_SUCCESS_MARKER) {
        warn!("NTP source {ntp_server} unreachable, configuration not applied");
        return Ok(ConvergenceResult::SourceUnreachable);
    }

    if !commands.is_empty() {
        session.send_config_set(commands.commands()).await?;
        debug!("applied {} configuration commands", commands.len());
    }
    session.send_command(SAVE_COMMAND).await?;

    let status = session.send_command(SHOW_NTP_STATUS).await?;
    let result = if status.contains(SYNCHRONIZED_MARKER) {
        ConvergenceResult::Synchronized
    } else {
        ConvergenceResult::NotSynchronized
    };
    info!("NTP status: {result}");
    Ok(result)
}
