//! Drift detection between consecutive snapshots.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use similar::{ChangeTag, TextDiff};

use crate::error::StoreError;
use crate::store::{changes_path, persist};

/// Outcome of comparing the current snapshot with its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriftStatus {
    NoPreviousBackup,
    Unchanged,
    Changed,
}

impl fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPreviousBackup => write!(f, "no previous backup"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Changed => write!(f, "changed"),
        }
    }
}

/// Result of one drift comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    pub hostname: String,
    pub current: PathBuf,
    pub previous: Option<PathBuf>,
    /// Unified diff text, present only when the status is `Changed`.
    pub diff: Option<String>,
    /// Where the diff was written, present only when the status is `Changed`.
    pub changes_path: Option<PathBuf>,
    pub added: usize,
    pub removed: usize,
    pub status: DriftStatus,
}

impl ChangeReport {
    fn without_diff(
        hostname: &str,
        previous: Option<&Path>,
        current: &Path,
        status: DriftStatus,
    ) -> Self {
        Self {
            hostname: hostname.to_string(),
            current: current.to_path_buf(),
            previous: previous.map(Path::to_path_buf),
            diff: None,
            changes_path: None,
            added: 0,
            removed: 0,
            status,
        }
    }
}

/// Compare `current` against `previous` and record any difference.
///
/// Byte-identical snapshots are `Unchanged` and leave no artifact. Otherwise
/// a zero-context unified diff is written next to `current` with the
/// `.changes` extension.
pub async fn compare(
    hostname: &str,
    previous: Option<&Path>,
    current: &Path,
) -> Result<ChangeReport, StoreError> {
    let Some(previous) = previous else {
        info!("{hostname}: no previous backup to compare against");
        return Ok(ChangeReport::without_diff(
            hostname,
            None,
            current,
            DriftStatus::NoPreviousBackup,
        ));
    };

    let old = read(previous).await?;
    let new = read(current).await?;

    if old == new {
        info!("{hostname}: no configuration changes");
        return Ok(ChangeReport::without_diff(
            hostname,
            Some(previous),
            current,
            DriftStatus::Unchanged,
        ));
    }

    let old = String::from_utf8_lossy(&old);
    let new = String::from_utf8_lossy(&new);
    let (diff, added, removed) = unified_diff(previous, current, &old, &new);

    let artifact = changes_path(current);
    persist(&artifact, &diff).await?;
    info!(
        "{hostname}: configuration changed (+{added} -{removed}), diff in {}",
        artifact.display()
    );

    Ok(ChangeReport {
        hostname: hostname.to_string(),
        current: current.to_path_buf(),
        previous: Some(previous.to_path_buf()),
        diff: Some(diff),
        changes_path: Some(artifact),
        added,
        removed,
        status: DriftStatus::Changed,
    })
}

/// Line diff of `old` to `new` with no context lines.
///
/// Returns the diff text and the inserted and deleted line counts.
fn unified_diff(
    old_path: &Path,
    new_path: &Path,
    old: &str,
    new: &str,
) -> (String, usize, usize) {
    let diff = TextDiff::from_lines(old, new);

    let (mut added, mut removed) = (0, 0);
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }

    let text = diff
        .unified_diff()
        .context_radius(0)
        .header(&display_name(old_path), &display_name(new_path))
        .to_string();
    debug!("diff: {} bytes", text.len());

    (text, added, removed)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn read(path: &Path) -> Result<Vec<u8>, StoreError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| StoreError::io(path, e))
}
