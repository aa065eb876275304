//! RAII guard for a scoped resource
//!
//! A [`Guard`] owns one open handle. Its release step runs at most once:
//! explicitly through [`Guard::release`], [`Guard::complete`] or
//! [`Guard::fail`], or implicitly
//! when the guard is dropped while still open.

use std::fmt;

use crate::error::{Error, ErrorKind, Result};
use crate::events::{Journal, ResourceEvent};
use crate::policy::Policy;
use crate::resource::{Acquire, Config, Resource, ResourceKind};

/// Whether the guarded handle is still usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The handle is open.
    Open,
    /// The handle was released and invalidated.
    Closed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// What a policy decided about the error that ended a scope.
#[derive(Debug)]
pub enum Verdict {
    /// The error keeps travelling towards the caller.
    Carried(Error),
    /// The policy swallowed the error (already journaled).
    Suppressed(Error),
}

/// What [`Guard::fail`] produced.
#[derive(Debug)]
pub struct Finish {
    /// Fate of the error that ended the scope
    pub verdict: Verdict,
    /// Rollback or release failures. Never swallowed.
    pub failures: Vec<Error>,
}

/// RAII guard that owns an open resource.
pub struct Guard<R: Resource> {
    name: String,
    kind: ResourceKind,
    resource: Option<R>,
    journal: Journal,
}

impl<R: Acquire> Guard<R> {
    /// Validate `config` and open the resource.
    ///
    /// A configuration that fails validation is reported as an
    /// acquisition failure, with the validation error as its source.
    pub fn acquire(
        name: impl Into<String>,
        config: &R::Config,
        journal: &Journal,
    ) -> Result<Self> {
        let name = name.into();
        let opened = config
            .validate()
            .map_err(|e| Error::acquisition(&name, "invalid configuration").with_source(e))
            .and_then(|()| R::acquire(&name, config));

        match opened {
            Ok(resource) => Ok(Self::opened(name, resource, journal)),
            Err(err) => {
                journal.record(ResourceEvent::AcquireFailed {
                    resource_id: name,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }
}

impl<R: Resource> Guard<R> {
    /// Take ownership of a handle that was opened elsewhere.
    pub fn adopt(resource: R, journal: &Journal) -> Self {
        let name = resource.name().to_string();
        Self::opened(name, resource, journal)
    }

    fn opened(name: String, resource: R, journal: &Journal) -> Self {
        journal.record(ResourceEvent::Acquired {
            resource_id: name.clone(),
        });
        Self {
            kind: resource.kind(),
            name,
            resource: Some(resource),
            journal: journal.clone(),
        }
    }

    /// Resource identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Current state.
    pub fn state(&self) -> State {
        if self.resource.is_some() {
            State::Open
        } else {
            State::Closed
        }
    }

    /// Whether the handle is still open.
    pub fn is_open(&self) -> bool {
        self.resource.is_some()
    }

    /// Borrow the open handle.
    pub fn get(&self) -> Result<&R> {
        self.resource.as_ref().ok_or_else(|| self.closed())
    }

    /// Mutably borrow the open handle.
    pub fn get_mut(&mut self) -> Result<&mut R> {
        match self.resource.as_mut() {
            Some(resource) => Ok(resource),
            None => Err(Error::InvalidState {
                resource_id: self.name.clone(),
                state: State::Closed.to_string(),
            }),
        }
    }

    fn closed(&self) -> Error {
        Error::InvalidState {
            resource_id: self.name.clone(),
            state: State::Closed.to_string(),
        }
    }

    /// Commit pending work on the open handle.
    pub fn commit(&mut self) -> Result<()> {
        let Some(resource) = self.resource.as_mut() else {
            return Err(self.closed());
        };
        match resource.commit() {
            Ok(()) => {
                self.journal.record(ResourceEvent::Committed {
                    resource_id: self.name.clone(),
                });
                Ok(())
            }
            Err(err) => {
                self.journal.record(ResourceEvent::CommitFailed {
                    resource_id: self.name.clone(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Discard pending work on the open handle.
    pub fn rollback(&mut self) -> Result<()> {
        let Some(resource) = self.resource.as_mut() else {
            return Err(self.closed());
        };
        match resource.rollback() {
            Ok(()) => {
                self.journal.record(ResourceEvent::RolledBack {
                    resource_id: self.name.clone(),
                });
                Ok(())
            }
            Err(err) => {
                self.journal.record(ResourceEvent::RollbackFailed {
                    resource_id: self.name.clone(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Release the handle.
    ///
    /// The first call frees the handle and closes the guard, even when the
    /// underlying release fails. Later calls are no-ops.
    pub fn release(&mut self) -> Result<()> {
        let Some(mut resource) = self.resource.take() else {
            return Ok(());
        };
        let result = resource.release();
        drop(resource);

        match result {
            Ok(()) => {
                self.journal.record(ResourceEvent::Released {
                    resource_id: self.name.clone(),
                });
                Ok(())
            }
            Err(err) => {
                self.journal.record(ResourceEvent::ReleaseFailed {
                    resource_id: self.name.clone(),
                    error: err.to_string(),
                });
                Err(self.as_cleanup_failure("release", err))
            }
        }
    }

    /// Close the guard after its scope ended normally.
    ///
    /// Transactional policies commit first. Returns the cleanup failures,
    /// which are never swallowed.
    pub fn complete(&mut self, policy: Policy) -> Vec<Error> {
        let mut failures = Vec::new();
        if policy.is_transactional()
            && self.is_open()
            && let Err(err) = self.commit()
        {
            failures.push(self.as_cleanup_failure("commit", err));
        }
        if let Err(err) = self.release() {
            failures.push(err);
        }
        failures
    }

    /// Close the guard after `err` ended its scope, and let `policy` decide
    /// whether `err` travels on.
    ///
    /// Transactional policies roll back first. Cleanup failures are
    /// collected rather than returned early so release always gets its turn.
    pub fn fail(&mut self, policy: Policy, err: Error) -> Finish {
        let mut failures = Vec::new();
        if policy.is_transactional()
            && self.is_open()
            && let Err(rb) = self.rollback()
        {
            failures.push(self.as_cleanup_failure("rollback", rb));
        }

        let verdict = if policy.propagates() {
            self.journal.record(ResourceEvent::Propagated {
                resource_id: self.name.clone(),
                error: err.to_string(),
            });
            Verdict::Carried(err)
        } else {
            self.journal.record(ResourceEvent::Suppressed {
                resource_id: self.name.clone(),
                error: err.to_string(),
            });
            Verdict::Suppressed(err)
        };

        if let Err(err) = self.release() {
            failures.push(err);
        }
        Finish { verdict, failures }
    }

    /// Unwind this guard because something after it failed to open.
    ///
    /// Transactional guards roll back. The cause is never suppressed here;
    /// only cleanup failures are returned.
    pub fn abort(&mut self, policy: Policy, cause: &Error) -> Vec<Error> {
        let mut failures = Vec::new();
        if !self.is_open() {
            return failures;
        }

        self.journal.record(ResourceEvent::Aborted {
            resource_id: self.name.clone(),
            error: cause.to_string(),
        });
        if policy.is_transactional()
            && let Err(err) = self.rollback()
        {
            failures.push(self.as_cleanup_failure("rollback", err));
        }
        if let Err(err) = self.release() {
            failures.push(err);
        }
        failures
    }

    fn as_cleanup_failure(&self, step: &str, err: Error) -> Error {
        if err.kind() == ErrorKind::Release {
            err
        } else {
            Error::release(&self.name, format!("{step} failed")).with_source(err)
        }
    }
}

impl<R: Resource> Drop for Guard<R> {
    fn drop(&mut self) {
        if self.is_open() {
            // Failures are already journaled by release().
            let _ = self.release();
        }
    }
}

impl<R: Resource + fmt::Debug> fmt::Debug for Guard<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("resource", &self.resource)
            .finish()
    }
}
