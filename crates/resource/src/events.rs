//! Lifecycle journal for resource observability.
//!
//! Every acquire, commit, rollback, release and suppressed error is recorded
//! as an [`Entry`] in a [`Journal`] and mirrored to `tracing` at the same
//! level. The journal is the audit trail: a scope that swallows an error
//! still leaves a record of it here.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// Severity of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Level {
    /// Routine detail
    Debug,
    /// Normal lifecycle step
    Info,
    /// Something was discarded or re-raised
    Warn,
    /// A failure, suppressed or not
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceEvent
// ---------------------------------------------------------------------------

/// Events emitted during resource lifecycle operations.
///
/// All variants carry a `resource_id` identifying the resource that
/// triggered the event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum ResourceEvent {
    /// The handle was opened.
    Acquired {
        /// The resource identifier.
        resource_id: String,
    },
    /// The handle could not be opened.
    AcquireFailed {
        /// The resource identifier.
        resource_id: String,
        /// Human-readable error description.
        error: String,
    },
    /// Pending work was committed on normal exit.
    Committed {
        /// The resource identifier.
        resource_id: String,
    },
    /// Commit failed.
    CommitFailed {
        /// The resource identifier.
        resource_id: String,
        /// Human-readable error description.
        error: String,
    },
    /// Pending work was rolled back on abnormal exit.
    RolledBack {
        /// The resource identifier.
        resource_id: String,
    },
    /// Rollback failed.
    RollbackFailed {
        /// The resource identifier.
        resource_id: String,
        /// Human-readable error description.
        error: String,
    },
    /// The handle was released.
    Released {
        /// The resource identifier.
        resource_id: String,
    },
    /// Releasing the handle failed. The resource is closed regardless.
    ReleaseFailed {
        /// The resource identifier.
        resource_id: String,
        /// Human-readable error description.
        error: String,
    },
    /// An error that ended the scope was swallowed by its policy.
    Suppressed {
        /// The resource identifier.
        resource_id: String,
        /// Human-readable error description.
        error: String,
    },
    /// An error that ended the scope is being re-raised after cleanup.
    Propagated {
        /// The resource identifier.
        resource_id: String,
        /// Human-readable error description.
        error: String,
    },
    /// The resource is being unwound without a normal exit, e.g. because a
    /// later acquisition in the same stack failed.
    Aborted {
        /// The resource identifier.
        resource_id: String,
        /// Human-readable error description.
        error: String,
    },
}

impl ResourceEvent {
    /// The resource this event is about.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        match self {
            Self::Acquired { resource_id }
            | Self::AcquireFailed { resource_id, .. }
            | Self::Committed { resource_id }
            | Self::CommitFailed { resource_id, .. }
            | Self::RolledBack { resource_id }
            | Self::RollbackFailed { resource_id, .. }
            | Self::Released { resource_id }
            | Self::ReleaseFailed { resource_id, .. }
            | Self::Suppressed { resource_id, .. }
            | Self::Propagated { resource_id, .. }
            | Self::Aborted { resource_id, .. } => resource_id,
        }
    }

    /// The level this event is journaled at.
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::Acquired { .. }
            | Self::Committed { .. }
            | Self::RolledBack { .. }
            | Self::Released { .. } => Level::Info,
            Self::Propagated { .. } | Self::Aborted { .. } => Level::Warn,
            Self::AcquireFailed { .. }
            | Self::CommitFailed { .. }
            | Self::RollbackFailed { .. }
            | Self::ReleaseFailed { .. }
            | Self::Suppressed { .. } => Level::Error,
        }
    }

    /// Whether this event ended a handle's life (successfully or not).
    #[must_use]
    pub fn is_release(&self) -> bool {
        matches!(self, Self::Released { .. } | Self::ReleaseFailed { .. })
    }
}

impl fmt::Display for ResourceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquired { resource_id } => write!(f, "acquired '{resource_id}'"),
            Self::AcquireFailed { resource_id, error } => {
                write!(f, "failed to acquire '{resource_id}': {error}")
            }
            Self::Committed { resource_id } => write!(f, "committed '{resource_id}'"),
            Self::CommitFailed { resource_id, error } => {
                write!(f, "commit failed on '{resource_id}': {error}")
            }
            Self::RolledBack { resource_id } => write!(f, "rolled back '{resource_id}'"),
            Self::RollbackFailed { resource_id, error } => {
                write!(f, "rollback failed on '{resource_id}': {error}")
            }
            Self::Released { resource_id } => write!(f, "released '{resource_id}'"),
            Self::ReleaseFailed { resource_id, error } => {
                write!(f, "release failed on '{resource_id}': {error}")
            }
            Self::Suppressed { resource_id, error } => {
                write!(f, "suppressed error in '{resource_id}': {error}")
            }
            Self::Propagated { resource_id, error } => {
                write!(f, "propagating error from '{resource_id}': {error}")
            }
            Self::Aborted { resource_id, error } => {
                write!(f, "aborting '{resource_id}': {error}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One timestamped journal record.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entry {
    /// Monotonic sequence number within the journal.
    pub seq: u64,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: Level,
    /// What happened.
    pub event: ResourceEvent,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<5} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.event
        )
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    next_seq: u64,
    entries: Vec<Entry>,
}

/// Shared, append-only record of lifecycle events.
///
/// Cloning a journal yields another handle to the same record.
#[derive(Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<Inner>>,
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event at its natural level and mirror it to `tracing`.
    pub fn record(&self, event: ResourceEvent) {
        let level = event.level();
        match level {
            Level::Debug => tracing::debug!(resource_id = event.resource_id(), "{event}"),
            Level::Info => tracing::info!(resource_id = event.resource_id(), "{event}"),
            Level::Warn => tracing::warn!(resource_id = event.resource_id(), "{event}"),
            Level::Error => tracing::error!(resource_id = event.resource_id(), "{event}"),
        }

        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push(Entry {
            seq,
            timestamp: Utc::now(),
            level,
            event,
        });
    }

    /// Snapshot of every entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Entry> {
        self.inner.lock().entries.clone()
    }

    /// Snapshot of the events only, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<ResourceEvent> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|e| e.event.clone())
            .collect()
    }

    /// Resource IDs in the order their handles were released.
    #[must_use]
    pub fn released(&self) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.event.is_release())
            .map(|e| e.event.resource_id().to_string())
            .collect()
    }

    /// Number of entries recorded at exactly `level`.
    #[must_use]
    pub fn count_level(&self, level: Level) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.level == level)
            .count()
    }

    /// Number of entries matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&ResourceEvent) -> bool) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| predicate(&e.event))
            .count()
    }

    /// Total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries. Sequence numbers keep increasing.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journal")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn released(id: &str) -> ResourceEvent {
        ResourceEvent::Released {
            resource_id: id.to_string(),
        }
    }

    #[test]
    fn record_assigns_increasing_sequence() {
        let journal = Journal::new();
        journal.record(released("a"));
        journal.record(released("b"));

        let entries = journal.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].seq < entries[1].seq);
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn clones_share_the_same_record() {
        let journal = Journal::new();
        let other = journal.clone();
        other.record(released("db"));
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn released_lists_release_events_in_order() {
        let journal = Journal::new();
        journal.record(ResourceEvent::Acquired {
            resource_id: "x".into(),
        });
        journal.record(released("c"));
        journal.record(ResourceEvent::ReleaseFailed {
            resource_id: "b".into(),
            error: "boom".into(),
        });
        journal.record(released("a"));

        assert_eq!(journal.released(), vec!["c", "b", "a"]);
    }

    #[test]
    fn suppressed_is_logged_at_error_level() {
        let journal = Journal::new();
        journal.record(ResourceEvent::Suppressed {
            resource_id: "tmp".into(),
            error: "boom".into(),
        });
        assert_eq!(journal.count_level(Level::Error), 1);
        assert_eq!(journal.count_level(Level::Info), 0);
    }

    #[test]
    fn entry_display_contains_level_and_message() {
        let journal = Journal::new();
        journal.record(released("log.txt"));
        let line = journal.entries()[0].to_string();
        assert!(line.contains("INFO"));
        assert!(line.contains("released 'log.txt'"));
    }

    #[test]
    fn clear_keeps_sequence_monotonic() {
        let journal = Journal::new();
        journal.record(released("a"));
        journal.clear();
        assert!(journal.is_empty());
        journal.record(released("b"));
        assert_eq!(journal.entries()[0].seq, 1);
    }
}
