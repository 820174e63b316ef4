//! Per-device run summaries and their rendering.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::converge::ConvergenceResult;
use crate::drift::DriftStatus;
use crate::facts::{NeighborFacts, VersionFacts};

/// Rendered in place of any fact that could not be collected.
pub const UNKNOWN: &str = "unknown";

/// Whether a device pipeline ran to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every step was attempted. Individual facts may still be missing.
    Completed,
    /// The pipeline stopped early: the session never opened, or it panicked.
    Failed(String),
}

/// One row of the fleet report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub hostname: String,
    pub platform: Option<String>,
    pub version: Option<VersionFacts>,
    pub neighbors: Option<NeighborFacts>,
    pub convergence: Option<ConvergenceResult>,
    pub backup: Option<PathBuf>,
    pub drift: Option<DriftStatus>,
    pub outcome: Outcome,
    /// Per-step failures that degraded this row.
    pub notes: Vec<String>,
}

impl RunSummary {
    /// An empty completed row for `hostname`.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            platform: None,
            version: None,
            neighbors: None,
            convergence: None,
            backup: None,
            drift: None,
            outcome: Outcome::Completed,
            notes: Vec::new(),
        }
    }

    /// A row for a device whose pipeline could not run.
    pub fn failed(hostname: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed(reason.into()),
            ..Self::new(hostname)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    /// Record a degraded step.
    pub fn note(&mut self, step: &str, error: impl fmt::Display) {
        self.notes.push(format!("{step}: {error}"));
    }
}

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| UNKNOWN.to_string(), |v| v.to_string())
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let image = or_unknown(self.version.as_ref().map(|v| &v.image));
        let class = or_unknown(self.version.as_ref().map(|v| v.class));
        let status = match &self.outcome {
            Outcome::Completed => "ok".to_string(),
            Outcome::Failed(reason) => format!("FAILED: {reason}"),
        };

        write!(
            f,
            "{:10} | {:10} | {:30} | {:7} | {:23} | {:15} | {:18} | {}",
            self.hostname,
            or_unknown(self.platform.as_deref()),
            image,
            class,
            or_unknown(self.neighbors),
            or_unknown(self.convergence),
            or_unknown(self.drift),
            status,
        )
    }
}

/// Render summaries as a fixed-width table with a header.
pub fn render_table(summaries: &[RunSummary]) -> String {
    let header = format!(
        "{:10} | {:10} | {:30} | {:7} | {:23} | {:15} | {:18} | {}",
        "HOSTNAME", "PLATFORM", "IMAGE", "CLASS", "NEIGHBORS", "NTP", "DRIFT", "STATUS"
    );
    let rule = "-".repeat(header.len());

    let mut out = String::new();
    out.push_str(&header);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    for summary in summaries {
        out.push_str(&summary.to_string());
        out.push('\n');
    }
    out
}

/// Render summaries as a pretty-printed JSON array.
pub fn render_json(summaries: &[RunSummary]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summaries)
}
