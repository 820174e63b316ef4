//! Fleet orchestration.
//!
//! Runs one [`DevicePipeline`] per device with at most
//! [`RunConfig::workers`] in flight, and always returns exactly one
//! [`RunSummary`] per input device. A pipeline that panics becomes a failed
//! row; its siblings keep running.
//!
//! Every session operation is bounded by [`RunConfig::command_timeout`].

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::{FutureExt, StreamExt, stream};
use log::{error, info};

use crate::config::{CommandSet, RunConfig};
use crate::extract::TemplateParser;
use crate::inventory::Device;
use crate::pipeline::DevicePipeline;
use crate::report::RunSummary;
use crate::session::{Connector, TimedConnector};
use crate::store::{BackupStore, RunTimestamp};

/// Runs device pipelines concurrently across a fleet.
pub struct Fleet<C> {
    config: RunConfig,
    commands: CommandSet,
    connector: TimedConnector<C>,
    parser: Box<dyn TemplateParser>,
    store: BackupStore,
}

impl<C: Connector> Fleet<C> {
    /// Build a fleet; `connector` is wrapped so that `open` and every
    /// session call are bounded by `config.command_timeout`.
    pub fn new(
        config: RunConfig,
        commands: CommandSet,
        connector: C,
        parser: impl TemplateParser + 'static,
    ) -> Self {
        let store = BackupStore::new(&config.backup_root);
        let connector = TimedConnector::new(connector, config.command_timeout);
        Self {
            config,
            commands,
            connector,
            parser: Box::new(parser),
            store,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    /// Process every device and collect their summaries.
    ///
    /// Summaries arrive in completion order, not input order.
    pub async fn run(&self, devices: &[Device], timestamp: RunTimestamp) -> Vec<RunSummary> {
        info!(
            "Processing {} devices with {} workers (run {timestamp})",
            devices.len(),
            self.config.workers
        );

        let pipeline = DevicePipeline::new(
            &self.connector,
            self.parser.as_ref(),
            &self.store,
            &self.config,
            &self.commands,
        );
        let pipeline = &pipeline;

        let summaries: Vec<RunSummary> = stream::iter(devices)
            .map(|device| async move {
                match AssertUnwindSafe(pipeline.run(device, timestamp))
                    .catch_unwind()
                    .await
                {
                    Ok(summary) => summary,
                    Err(panic) => {
                        let reason = panic_message(panic.as_ref());
                        error!("{}: pipeline panicked: {reason}", device.hostname);
                        RunSummary::failed(&device.hostname, format!("panicked: {reason}"))
                    }
                }
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let failed = summaries.iter().filter(|s| s.is_failed()).count();
        info!(
            "Run {timestamp} finished: {} devices, {failed} failed",
            summaries.len()
        );
        summaries
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
