//! Core resource traits
//!
//! [`Resource`] is the capability every scoped handle exposes: release, and
//! optionally commit/rollback. [`Acquire`] adds the constructor side so a
//! [`Guard`](crate::Guard) or [`ResourceStack`](crate::ResourceStack) can
//! open a handle from its [`Config`].

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration trait for resource types.
pub trait Config {
    /// Validate the configuration, returning an error if invalid.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// What sort of external thing a resource wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ResourceKind {
    /// An open file
    File,
    /// A (simulated) database connection
    Connection,
    /// A named lock
    Lock,
    /// A unit of work that commits or rolls back
    Transaction,
    /// A timing span
    Timer,
    /// Anything else
    Custom,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::File => "file",
            Self::Connection => "connection",
            Self::Lock => "lock",
            Self::Transaction => "transaction",
            Self::Timer => "timer",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// An open handle that can be released exactly once.
///
/// Implementations free their handle in [`release`](Resource::release).
/// Callers never invoke `release` twice; [`Guard`](crate::Guard) enforces
/// that. `commit` and `rollback` are only meaningful for transactional
/// resources and default to no-ops.
pub trait Resource: 'static {
    /// Identifier used in logs and errors.
    fn name(&self) -> &str;

    /// The kind of resource.
    fn kind(&self) -> ResourceKind;

    /// Flush and free the underlying handle.
    fn release(&mut self) -> Result<()>;

    /// Make pending work durable. Called on normal exit of a transactional scope.
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Discard pending work. Called on abnormal exit of a transactional scope.
    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A resource that can be opened from a configuration.
pub trait Acquire: Resource + Sized {
    /// The configuration type for this resource.
    type Config: Config;

    /// Open the underlying handle.
    ///
    /// Fails with [`Error::Acquisition`](crate::Error::Acquisition) when the
    /// handle cannot be opened. No release is owed in that case.
    fn acquire(name: &str, config: &Self::Config) -> Result<Self>;
}
