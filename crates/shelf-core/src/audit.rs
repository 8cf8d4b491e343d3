//! Audit trail for library state transitions.
//!
//! Every successful transition emits one [`AuditRecord`]. Records are
//! append-only.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::library::{SetId, UserId};
use crate::version::ReleaseKind;

/// Errors from recording audit entries.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Failed to write the audit log.
    #[error("audit log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode or decode a record.
    #[error("audit record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The recorder is unreachable (used by test doubles).
    #[error("audit recorder unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// What happened to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    /// A library or draft was created.
    Created,
    /// A draft or set was edited.
    Updated,
    /// A draft was released as a new major version.
    VersionedMajor,
    /// A draft was released as a new minor version.
    VersionedMinor,
}

impl From<ReleaseKind> for AuditKind {
    fn from(kind: ReleaseKind) -> Self {
        match kind {
            ReleaseKind::Major => Self::VersionedMajor,
            ReleaseKind::Minor => Self::VersionedMinor,
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Updated => write!(f, "UPDATED"),
            Self::VersionedMajor => write!(f, "VERSIONED_MAJOR"),
            Self::VersionedMinor => write!(f, "VERSIONED_MINOR"),
        }
    }
}

/// One entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the action was recorded.
    pub timestamp: DateTime<Utc>,
    /// The library set acted on.
    pub target_id: SetId,
    /// The action.
    pub kind: AuditKind,
    /// Who acted.
    pub user: UserId,
}

/// Appends audit records.
pub trait AuditRecorder: Send + Sync {
    /// Record `kind` performed by `user` on `target`.
    ///
    /// Returns whether the record was accepted.
    fn record(&self, target: &SetId, kind: AuditKind, user: &UserId) -> AuditResult<bool>;
}

/// Audit log stored as JSON lines, one record per line.
#[derive(Debug, Clone)]
pub struct JsonlAuditLog {
    path: Utf8PathBuf,
}

impl JsonlAuditLog {
    /// Use the log at `path`, creating its directory if needed.
    pub fn open(path: impl AsRef<Utf8Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Append a fully-formed record.
    pub fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        FileExt::lock_exclusive(&file)?;
        let written = file.write_all(line.as_bytes()).and_then(|()| file.flush());
        let _ = FileExt::unlock(&file);
        written?;
        Ok(())
    }

    /// Read back every record. A missing file is an empty log.
    pub fn records(&self) -> AuditResult<Vec<AuditRecord>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl AuditRecorder for JsonlAuditLog {
    #[instrument(skip(self), fields(path = %self.path))]
    fn record(&self, target: &SetId, kind: AuditKind, user: &UserId) -> AuditResult<bool> {
        self.append(&AuditRecord {
            timestamp: Utc::now(),
            target_id: *target,
            kind,
            user: user.clone(),
        })?;
        debug!("audit record appended");
        Ok(true)
    }
}

/// In-memory audit recorder for tests.
///
/// Clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    inner: Arc<Mutex<MemoryAuditInner>>,
}

#[derive(Debug, Default)]
struct MemoryAuditInner {
    records: Vec<AuditRecord>,
    failing: bool,
}

impl MemoryAuditLog {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder that rejects every record with [`AuditError::Unavailable`].
    pub fn failing() -> Self {
        let log = Self::default();
        log.lock().failing = true;
        log
    }

    /// Records accepted so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().records.clone()
    }

    /// Kinds of the records accepted so far, in order.
    pub fn kinds(&self) -> Vec<AuditKind> {
        self.lock().records.iter().map(|r| r.kind).collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryAuditInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuditRecorder for MemoryAuditLog {
    fn record(&self, target: &SetId, kind: AuditKind, user: &UserId) -> AuditResult<bool> {
        let mut inner = self.lock();
        if inner.failing {
            return Err(AuditError::Unavailable("audit sink is down".into()));
        }
        inner.records.push(AuditRecord {
            timestamp: Utc::now(),
            target_id: *target,
            kind,
            user: user.clone(),
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn kind_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&AuditKind::VersionedMajor).unwrap(),
            "\"VERSIONED_MAJOR\""
        );
        assert_eq!(AuditKind::from(ReleaseKind::Minor), AuditKind::VersionedMinor);
        assert_eq!(AuditKind::Created.to_string(), "CREATED");
    }

    #[test]
    fn jsonl_log_appends_lines() {
        let tmp = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("nested").join("audit.jsonl")).unwrap();
        let log = JsonlAuditLog::open(&path).unwrap();
        let set = SetId::new();
        let alice = UserId::new("alice");

        assert!(log.record(&set, AuditKind::Created, &alice).unwrap());
        assert!(log.record(&set, AuditKind::VersionedMajor, &alice).unwrap());

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["kind"], "CREATED");
        assert_eq!(first["user"], "alice");
        assert_eq!(first["target_id"], set.to_string());

        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].kind, AuditKind::VersionedMajor);
    }

    #[test]
    fn missing_log_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("audit.jsonl")).unwrap();
        assert!(JsonlAuditLog::open(path).unwrap().records().unwrap().is_empty());
    }

    #[test]
    fn memory_log_can_fail() {
        let log = MemoryAuditLog::failing();
        let result = log.record(&SetId::new(), AuditKind::Updated, &UserId::new("a"));
        assert!(matches!(result, Err(AuditError::Unavailable(_))));
        assert!(log.records().is_empty());
    }
}
