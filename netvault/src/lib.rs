//! # netvault
//!
//! Configuration backup, drift detection and NTP convergence for fleets of
//! Cisco IOS devices.
//!
//! Each device runs through the same pipeline: open a session, back up the
//! running configuration, extract version, platform and CDP facts, converge
//! NTP settings, close the session, and diff the new backup against the
//! previous one. Devices are processed concurrently with a bounded number of
//! open sessions, and one device's failure never stops the others.
//!
//! ## Features
//!
//! - Async SSH sessions via russh, with per-operation timeouts
//! - Timestamped snapshots under one directory per hostname
//! - Zero-context unified diffs written next to changed snapshots
//! - TextFSM-driven neighbor parsing
//! - One summary row per device, rendered as a table or JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use netvault::{
//!     CommandSet, Fleet, RunConfig, RunTimestamp, SshConnector, TextFsmParser, inventory, report,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netvault::Error> {
//!     let devices = inventory::load_devices("devices.csv")?;
//!     let config = RunConfig::new("backups")
//!         .ntp_server("10.0.0.123")
//!         .command_timeout(Duration::from_secs(30));
//!     let commands = CommandSet::from_file("config.commands.txt", &config.ntp_server)?;
//!
//!     let fleet = Fleet::new(config, commands, SshConnector::default(), TextFsmParser);
//!
//!     let summaries = fleet.run(&devices, RunTimestamp::now()).await;
//!     print!("{}", report::render_table(&summaries));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod converge;
pub mod drift;
pub mod error;
pub mod extract;
pub mod facts;
pub mod fleet;
pub mod inventory;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod store;

// Re-export main types for convenience
pub use config::{CommandSet, RunConfig};
pub use converge::ConvergenceResult;
pub use drift::{ChangeReport, DriftStatus};
pub use error::Error;
pub use extract::{TemplateParser, TextFsmParser};
pub use facts::{ImageClass, NeighborFacts, VersionFacts};
pub use fleet::Fleet;
pub use inventory::Device;
pub use pipeline::DevicePipeline;
pub use report::{Outcome, RunSummary};
pub use session::{Connector, DeviceSession, SshConnector, SshOptions, TimedConnector};
pub use store::{BackupStore, RunTimestamp, Snapshot};
