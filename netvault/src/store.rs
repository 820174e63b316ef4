//! Backup store.
//!
//! Snapshots live under one directory per hostname:
//!
//! ```text
//! <root>/<hostname>/<hostname>-<YYYY_MM_DD-HH_MM_SS>.txt
//! <root>/<hostname>/<hostname>-<YYYY_MM_DD-HH_MM_SS>.changes
//! ```
//!
//! The timestamp embedded in the file name is the only ordering key, so
//! every `.txt` file in a host directory must carry a parseable one.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, SubsecRound};
use log::{debug, trace};

use crate::error::StoreError;

/// Format of the timestamp embedded in snapshot file names.
pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d-%H_%M_%S";

/// Extension of snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "txt";

/// Extension of change artifacts.
pub const CHANGES_EXTENSION: &str = "changes";

/// Second-resolution local timestamp identifying one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunTimestamp(NaiveDateTime);

impl RunTimestamp {
    /// The current local time, truncated to whole seconds.
    pub fn now() -> Self {
        Self(Local::now().naive_local().trunc_subsecs(0))
    }

    /// Parse a `YYYY_MM_DD-HH_MM_SS` string.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map(Self)
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }
}

impl From<NaiveDateTime> for RunTimestamp {
    fn from(value: NaiveDateTime) -> Self {
        Self(value.trunc_subsecs(0))
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// A persisted copy of a device's running configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub hostname: String,
    pub taken_at: RunTimestamp,
    pub path: PathBuf,
}

/// File-system store for configuration snapshots.
#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every snapshot of `hostname`.
    pub fn host_dir(&self, hostname: &str) -> PathBuf {
        self.root.join(hostname)
    }

    /// Snapshot path for `hostname` at `timestamp`, creating the host
    /// directory if needed.
    ///
    /// Directory creation tolerates concurrent creators.
    pub async fn path_for(
        &self,
        hostname: &str,
        timestamp: RunTimestamp,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.host_dir(hostname);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let path = dir.join(format!("{hostname}-{timestamp}.{SNAPSHOT_EXTENSION}"));
        trace!("{hostname}: snapshot path {}", path.display());
        Ok(path)
    }

    /// Write a snapshot of `config` for `hostname` taken at `timestamp`.
    pub async fn write_snapshot(
        &self,
        hostname: &str,
        timestamp: RunTimestamp,
        config: &str,
    ) -> Result<Snapshot, StoreError> {
        let path = self.path_for(hostname, timestamp).await?;
        persist(&path, config).await?;
        debug!("{hostname}: snapshot persisted at {}", path.display());

        Ok(Snapshot {
            hostname: hostname.to_string(),
            taken_at: timestamp,
            path,
        })
    }

    /// Find the most recent snapshot of `hostname` older than `current`.
    ///
    /// `current` itself is excluded. Returns `Ok(None)` when no older
    /// snapshot exists. Any other `.txt` file in the host directory whose
    /// name does not parse is an error: skipping it could pick the wrong
    /// baseline.
    pub async fn previous_snapshot(
        &self,
        hostname: &str,
        current: &Path,
    ) -> Result<Option<PathBuf>, StoreError> {
        let current_name = file_name(current);
        let current_ts = snapshot_timestamp(hostname, &current_name)?;

        let dir = self.host_dir(hostname);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let mut best: Option<(RunTimestamp, PathBuf)> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&dir, e))?
        {
            let path = entry.path();
            let name = file_name(&path);
            if name == current_name || !is_snapshot(&path) {
                continue;
            }

            let ts = snapshot_timestamp(hostname, &name)?;
            if ts >= current_ts {
                continue;
            }
            if best.as_ref().is_none_or(|(best_ts, _)| ts > *best_ts) {
                best = Some((ts, path));
            }
        }

        Ok(best.map(|(_, path)| path))
    }
}

/// Write `contents` to `path` so readers see either nothing or all of it.
pub async fn persist(path: &Path, contents: &str) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

/// Path of the change artifact next to `snapshot`.
pub fn changes_path(snapshot: &Path) -> PathBuf {
    snapshot.with_extension(CHANGES_EXTENSION)
}

/// Parse the timestamp out of `<hostname>-<timestamp>.txt`.
pub fn snapshot_timestamp(hostname: &str, file_name: &str) -> Result<RunTimestamp, StoreError> {
    let malformed = |reason: String| StoreError::MalformedSnapshotName {
        file: file_name.to_string(),
        reason,
    };

    let stem = file_name
        .strip_suffix(&format!(".{SNAPSHOT_EXTENSION}"))
        .ok_or_else(|| malformed(format!("missing .{SNAPSHOT_EXTENSION} extension")))?;
    let stamp = stem
        .strip_prefix(hostname)
        .and_then(|rest| rest.strip_prefix('-'))
        .ok_or_else(|| malformed(format!("expected prefix '{hostname}-'")))?;

    RunTimestamp::parse(stamp).map_err(|e| malformed(e.to_string()))
}

fn is_snapshot(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> RunTimestamp {
        RunTimestamp::parse(s).unwrap()
    }

    #[test]
    fn test_timestamp_round_trip_format() {
        let stamp = ts("2026_10_19-08_30_05");
        assert_eq!(stamp.to_string(), "2026_10_19-08_30_05");
        assert!(RunTimestamp::parse("2026-10-19 08:30:05").is_err());
    }

    #[test]
    fn test_snapshot_timestamp() {
        let parsed = snapshot_timestamp("r1", "r1-2026_10_19-08_30_05.txt").unwrap();
        assert_eq!(parsed, ts("2026_10_19-08_30_05"));

        // Hostnames containing '-' are handled by prefix, not by splitting.
        let parsed = snapshot_timestamp("core-sw-1", "core-sw-1-2026_01_02-03_04_05.txt").unwrap();
        assert_eq!(parsed, ts("2026_01_02-03_04_05"));
    }

    #[test]
    fn test_snapshot_timestamp_malformed() {
        let err = snapshot_timestamp("r1", "r1-yesterday.txt").unwrap_err();
        assert!(matches!(err, StoreError::MalformedSnapshotName { .. }));

        let err = snapshot_timestamp("r1", "r2-2026_10_19-08_30_05.txt").unwrap_err();
        assert!(matches!(err, StoreError::MalformedSnapshotName { .. }));
    }

    #[test]
    fn test_changes_path() {
        let path = Path::new("/b/r1/r1-2026_10_19-08_30_05.txt");
        assert_eq!(
            changes_path(path),
            Path::new("/b/r1/r1-2026_10_19-08_30_05.changes")
        );
    }

    #[tokio::test]
    async fn test_path_for_creates_dir_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let stamp = ts("2026_10_19-08_30_05");

        let first = store.path_for("r1", stamp).await.unwrap();
        let second = store.path_for("r1", stamp).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            dir.path().join("r1").join("r1-2026_10_19-08_30_05.txt")
        );
        assert!(dir.path().join("r1").is_dir());
    }

    #[tokio::test]
    async fn test_concurrent_dir_creation() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let stamp = ts("2026_10_19-08_30_05");

        let (a, b) = tokio::join!(store.path_for("r1", stamp), store.path_for("r1", stamp));
        tokio_test::assert_ok!(a);
        tokio_test::assert_ok!(b);
    }

    #[tokio::test]
    async fn test_write_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());

        let snapshot = store
            .write_snapshot("r1", ts("2026_10_19-08_30_05"), "hostname r1\n")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&snapshot.path).unwrap(),
            "hostname r1\n"
        );

        // No temporary file left behind
        let names: Vec<_> = std::fs::read_dir(dir.path().join("r1"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("r1.txt");
        let err = persist(&path, "x").await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[tokio::test]
    async fn test_previous_snapshot_picks_latest_older() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());

        let t1 = store.write_snapshot("r1", ts("2026_10_17-08_00_00"), "a").await.unwrap();
        let t2 = store.write_snapshot("r1", ts("2026_10_18-08_00_00"), "b").await.unwrap();
        let t3 = store.write_snapshot("r1", ts("2026_10_19-08_00_00"), "c").await.unwrap();

        let previous = store.previous_snapshot("r1", &t3.path).await.unwrap();
        assert_eq!(previous, Some(t2.path.clone()));

        let previous = store.previous_snapshot("r1", &t2.path).await.unwrap();
        assert_eq!(previous, Some(t1.path.clone()));

        assert_eq!(store.previous_snapshot("r1", &t1.path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_previous_snapshot_ignores_changes_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());

        let t1 = store.write_snapshot("r1", ts("2026_10_18-08_00_00"), "a").await.unwrap();
        let t2 = store.write_snapshot("r1", ts("2026_10_19-08_00_00"), "b").await.unwrap();
        std::fs::write(changes_path(&t2.path), "-a\n+b").unwrap();

        let previous = store.previous_snapshot("r1", &t2.path).await.unwrap();
        assert_eq!(previous, Some(t1.path));
    }

    #[tokio::test]
    async fn test_previous_snapshot_only_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());

        let only = store.write_snapshot("r1", ts("2026_10_19-08_00_00"), "a").await.unwrap();
        assert_eq!(store.previous_snapshot("r1", &only.path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_previous_snapshot_malformed_name_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());

        let current = store.write_snapshot("r1", ts("2026_10_19-08_00_00"), "a").await.unwrap();
        std::fs::write(dir.path().join("r1").join("r1-old.txt"), "x").unwrap();

        let err = store.previous_snapshot("r1", &current.path).await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedSnapshotName { file, .. } if file == "r1-old.txt"));
    }
}
