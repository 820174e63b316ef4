//! Per-device workflow.
//!
//! open → backup → facts → converge → close → drift. Every step after open
//! is attempted regardless of earlier failures, and close is always
//! attempted once the session exists. Failures are folded into the
//! device's [`RunSummary`].

use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::config::{CommandSet, RunConfig};
use crate::converge::converge;
use crate::drift::{DriftStatus, compare};
use crate::error::Error;
use crate::extract::TemplateParser;
use crate::facts::{collect_neighbors, collect_platform, collect_version};
use crate::inventory::Device;
use crate::report::RunSummary;
use crate::session::{Connector, DeviceSession};
use crate::store::{BackupStore, RunTimestamp, Snapshot};

pub const SHOW_RUNNING_CONFIG: &str = "show running-config";

/// Runs the workflow for one device at a time.
///
/// Holds only shared references; one pipeline value serves every device in
/// a run.
pub struct DevicePipeline<'a, C> {
    connector: &'a C,
    parser: &'a dyn TemplateParser,
    store: &'a BackupStore,
    config: &'a RunConfig,
    commands: &'a CommandSet,
}

impl<'a, C: Connector> DevicePipeline<'a, C> {
    pub fn new(
        connector: &'a C,
        parser: &'a dyn TemplateParser,
        store: &'a BackupStore,
        config: &'a RunConfig,
        commands: &'a CommandSet,
    ) -> Self {
        Self {
            connector,
            parser,
            store,
            config,
            commands,
        }
    }

    /// Run every step for `device` and summarize the result.
    pub async fn run(&self, device: &Device, timestamp: RunTimestamp) -> RunSummary {
        let hostname = device.hostname.as_str();

        let mut session = match self.connector.open(device).await {
            Ok(session) => session,
            Err(e) => {
                error!("{hostname}: could not open session: {e}");
                return RunSummary::failed(hostname, e.to_string());
            }
        };
        info!("{hostname}: session opened to {}", device.address);

        let mut summary = RunSummary::new(hostname);

        let backup = match self.backup(&mut session, hostname, timestamp).await {
            Ok(snapshot) => {
                info!("{hostname}: backup written to {}", snapshot.path.display());
                Some(snapshot.path)
            }
            Err(e) => {
                error!("{hostname}: backup failed: {e}");
                summary.note("backup", &e);
                None
            }
        };
        summary.backup = backup.clone();

        self.collect_facts(&mut session, &mut summary).await;

        match converge(&mut session, &self.config.ntp_server, self.commands).await {
            Ok(result) => summary.convergence = Some(result),
            Err(e) => {
                warn!("{hostname}: convergence failed: {e}");
                summary.note("converge", &e);
            }
        }

        match session.close().await {
            Ok(()) => debug!("{hostname}: session closed"),
            Err(e) => {
                warn!("{hostname}: close failed: {e}");
                summary.note("close", &e);
            }
        }

        if let Some(current) = backup {
            match self.detect_drift(hostname, current).await {
                Ok(status) => summary.drift = Some(status),
                Err(e) => {
                    error!("{hostname}: drift detection failed: {e}");
                    summary.note("drift", &e);
                }
            }
        }

        summary
    }

    async fn backup(
        &self,
        session: &mut C::Session,
        hostname: &str,
        timestamp: RunTimestamp,
    ) -> Result<Snapshot, Error> {
        let config = session.send_command(SHOW_RUNNING_CONFIG).await?;
        Ok(self.store.write_snapshot(hostname, timestamp, &config).await?)
    }

    /// Each fact degrades to unknown on its own.
    async fn collect_facts(&self, session: &mut C::Session, summary: &mut RunSummary) {
        let hostname = summary.hostname.clone();

        match collect_version(session).await {
            Ok(version) => summary.version = Some(version),
            Err(e) => {
                warn!("{hostname}: version unavailable: {e}");
                summary.note("version", &e);
            }
        }

        match collect_platform(session).await {
            Ok(platform) => summary.platform = Some(platform),
            Err(e) => {
                warn!("{hostname}: platform unavailable: {e}");
                summary.note("platform", &e);
            }
        }

        match collect_neighbors(session, self.parser, &self.config.neighbor_template).await {
            Ok(neighbors) => summary.neighbors = Some(neighbors),
            Err(e) => {
                warn!("{hostname}: neighbor status unavailable: {e}");
                summary.note("neighbors", &e);
            }
        }
    }

    async fn detect_drift(&self, hostname: &str, current: PathBuf) -> Result<DriftStatus, Error> {
        let previous = self.store.previous_snapshot(hostname, &current).await?;
        let report = compare(hostname, previous.as_deref(), &current).await?;
        Ok(report.status)
    }
}
