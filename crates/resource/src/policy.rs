//! Exit policies for scoped resources.
//!
//! | Policy        | Normal exit         | Abnormal exit                  | Re-raises? |
//! |---------------|---------------------|--------------------------------|------------|
//! | Suppress      | release             | log error, release             | no         |
//! | Propagate     | release             | release, re-raise              | yes        |
//! | Transactional | commit, release     | rollback, release              | `propagate`|
//!
//! There is no default policy: swallowing errors has to be asked for.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-resource rule for what happens when its scope exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "policy", rename_all = "snake_case"))]
pub enum Policy {
    /// Log the error, release, and let the scope exit normally.
    Suppress,
    /// Release, then re-raise the error.
    Propagate,
    /// Commit on normal exit, roll back on abnormal exit, then release.
    Transactional {
        /// Re-raise the error after rolling back.
        propagate: bool,
    },
}

impl Policy {
    /// Whether an error ending the scope reaches the caller.
    #[must_use]
    pub fn propagates(self) -> bool {
        match self {
            Self::Suppress => false,
            Self::Propagate => true,
            Self::Transactional { propagate } => propagate,
        }
    }

    /// Whether commit/rollback run before release.
    #[must_use]
    pub fn is_transactional(self) -> bool {
        matches!(self, Self::Transactional { .. })
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suppress => write!(f, "suppress"),
            Self::Propagate => write!(f, "propagate"),
            Self::Transactional { propagate: true } => write!(f, "transactional(propagate)"),
            Self::Transactional { propagate: false } => write!(f, "transactional(suppress)"),
        }
    }
}

/// How a scope body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// The body returned `Ok`.
    Normal,
    /// The body returned `Err` (or a later acquisition failed).
    Abnormal,
}

impl ExitKind {
    /// Classify a body result.
    #[must_use]
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Self::Normal
        } else {
            Self::Abnormal
        }
    }
}
