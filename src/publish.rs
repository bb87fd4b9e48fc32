//! Snapshot publishing. A failed publish never leaves a partial file at the target path.

use crate::types::FleetSnapshot;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_OUTPUT: &str = "server-status.json";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write snapshot to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Write `snapshot` as pretty JSON to `path`, replacing any previous file atomically.
///
/// The document is staged in a temporary file in the destination directory and renamed
/// over `path` only after it is fully written and synced.
pub fn write_snapshot(path: &Path, snapshot: &FleetSnapshot) -> Result<(), PublishError> {
    let body = serde_json::to_vec_pretty(snapshot)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let io_err = |source: std::io::Error| PublishError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&body).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Log the enabled-world totals of a published snapshot.
pub fn log_summary(snapshot: &FleetSnapshot) {
    let s = snapshot.summary();
    info!(
        "Login servers: {}/{} online",
        s.logins_online, s.logins_total
    );
    info!(
        "Channels: {}/{} online",
        s.channels_online, s.channels_total
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelResult, Endpoint, GroupResult, LoginResult, ProbeOutcome};

    fn snapshot() -> FleetSnapshot {
        FleetSnapshot {
            groups: vec![GroupResult {
                id: "ain".into(),
                display_name: "Ain".into(),
                icon: "*".into(),
                disabled: false,
                login: LoginResult::new(&Endpoint::new("127.0.0.1", 8484), ProbeOutcome::Online),
                channels: vec![ChannelResult {
                    id: 1,
                    outcome: ProbeOutcome::Offline,
                }],
            }],
            generated_at: "2026-01-01T00:00:00.000Z".into(),
            probe_interval_seconds: 60,
        }
    }

    #[test]
    fn writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_OUTPUT);
        std::fs::write(&path, "old").unwrap();

        let snap = snapshot();
        write_snapshot(&path, &snap).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: FleetSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snap);
        // Only the target remains; the staging file was renamed, not copied.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join(DEFAULT_OUTPUT);
        let err = write_snapshot(&path, &snapshot()).unwrap_err();
        assert!(matches!(err, PublishError::Io { .. }));
        assert!(!path.exists());
    }
}
