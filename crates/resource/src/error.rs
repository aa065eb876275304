//! Error types for scoped resource management
use thiserror::Error;

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while acquiring, using, or releasing a scoped resource.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// The resource could not be opened; no release is owed for it.
    #[error("Acquisition failed for resource '{resource_id}': {reason}")]
    Acquisition {
        /// The resource identifier
        resource_id: String,
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// A unit of work inside the scope failed. The handle stays open.
    #[error("Operation failed on resource '{resource_id}': {reason}")]
    Operation {
        /// The resource identifier
        resource_id: String,
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// Cleanup (release, commit or rollback) failed.
    #[error("Release failed for resource '{resource_id}': {reason}")]
    Release {
        /// The resource identifier
        resource_id: String,
        /// The cleanup failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// The handle was used after it was closed.
    #[error("Resource '{resource_id}' is {state}")]
    InvalidState {
        /// The resource identifier
        resource_id: String,
        /// The state the resource is in
        state: String,
    },

    /// Resource state error
    #[error("Invalid state transition for resource '{resource_id}': {from} -> {to}")]
    InvalidStateTransition {
        /// The resource identifier
        resource_id: String,
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Several cleanup steps failed during one unwind.
    #[error("{} cleanup failure(s) during unwind: {}", .failures.len(), join(.failures))]
    Unwind {
        /// Every cleanup failure, in the order it happened
        failures: Vec<Error>,
    },

    /// A body or acquisition error plus the cleanup failures that followed it.
    #[error("{primary}; cleanup also failed: {}", join(.failures))]
    Composite {
        /// The error that ended the scope
        primary: Box<Error>,
        /// Cleanup failures recorded while unwinding
        failures: Vec<Error>,
    },
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Configuration`]
    Configuration,
    /// See [`Error::Acquisition`]
    Acquisition,
    /// See [`Error::Operation`]
    Operation,
    /// See [`Error::Release`]
    Release,
    /// See [`Error::InvalidState`] and [`Error::InvalidStateTransition`]
    State,
    /// See [`Error::Unwind`]
    Unwind,
    /// See [`Error::Composite`]
    Composite,
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an acquisition error without an underlying cause.
    pub fn acquisition(resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Acquisition {
            resource_id: resource_id.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create an operation error without an underlying cause.
    pub fn operation(resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Operation {
            resource_id: resource_id.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a release error without an underlying cause.
    pub fn release(resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Release {
            resource_id: resource_id.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Attach an underlying cause. No-op for variants without a source slot.
    #[must_use]
    pub fn with_source<E>(mut self, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match &mut self {
            Self::Acquisition { source, .. }
            | Self::Operation { source, .. }
            | Self::Release { source, .. } => *source = Some(Box::new(err)),
            _ => {}
        }
        self
    }

    /// Attach cleanup failures to the error that ended a scope.
    #[must_use]
    pub fn with_cleanup(self, failures: Vec<Error>) -> Error {
        if failures.is_empty() {
            self
        } else {
            Self::Composite {
                primary: Box::new(self),
                failures,
            }
        }
    }

    /// Merge the error that ended a scope with the cleanup failures that
    /// followed it.
    ///
    /// Returns `None` only when there is nothing to report.
    #[must_use]
    pub fn combine(primary: Option<Error>, mut failures: Vec<Error>) -> Option<Error> {
        match (primary, failures.len()) {
            (None, 0) => None,
            (None, 1) => failures.pop(),
            (None, _) => Some(Self::Unwind { failures }),
            (Some(primary), _) => Some(primary.with_cleanup(failures)),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Acquisition { .. } => ErrorKind::Acquisition,
            Self::Operation { .. } => ErrorKind::Operation,
            Self::Release { .. } => ErrorKind::Release,
            Self::InvalidState { .. } | Self::InvalidStateTransition { .. } => ErrorKind::State,
            Self::Unwind { .. } => ErrorKind::Unwind,
            Self::Composite { .. } => ErrorKind::Composite,
        }
    }

    /// The error that ended the scope, looking through a [`Error::Composite`].
    #[must_use]
    pub fn primary(&self) -> &Error {
        match self {
            Self::Composite { primary, .. } => &**primary,
            other => other,
        }
    }

    /// Cleanup failures carried by this error.
    ///
    /// A standalone [`Error::Release`] counts as one failure.
    #[must_use]
    pub fn cleanup_failures(&self) -> Vec<&Error> {
        match self {
            Self::Unwind { failures } | Self::Composite { failures, .. } => {
                failures.iter().collect()
            }
            Self::Release { .. } => vec![self],
            _ => Vec::new(),
        }
    }

    /// Get the resource ID associated with this error (if any)
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } | Self::Unwind { .. } => None,
            Self::Composite { primary, .. } => primary.resource_id(),
            Self::Acquisition { resource_id, .. }
            | Self::Operation { resource_id, .. }
            | Self::Release { resource_id, .. }
            | Self::InvalidState { resource_id, .. }
            | Self::InvalidStateTransition { resource_id, .. } => Some(resource_id),
        }
    }
}
