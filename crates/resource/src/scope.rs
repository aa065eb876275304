//! The scoped-acquisition construct.
//!
//! [`Scope::run`] opens one resource, hands it to a body closure, and
//! guarantees the release step runs on every exit path: normal return,
//! error return, early `?` return, or panic. A panicking body is treated
//! as an abort, so transactional resources roll back before release.

use std::fmt;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::Journal;
use crate::guard::{Guard, Verdict};
use crate::policy::Policy;
use crate::resource::{Acquire, Resource};

/// Where a scope is in its life.
///
/// ```text
/// Entered ──acquire──▶ InUse ──Ok──▶ NormalExit ──┐
///    │                   └──Err──▶ AbnormalExit ──┴──▶ Closed
///    └──acquire failed─────────────────────────────────▶ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created, nothing acquired yet.
    Entered,
    /// The resource is open and the body is running.
    InUse,
    /// The body finished without error.
    NormalExit,
    /// The body returned an error.
    AbnormalExit,
    /// Cleanup finished. Terminal.
    Closed,
}

impl Phase {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Entered, Self::InUse | Self::Closed)
                | (Self::InUse, Self::NormalExit | Self::AbnormalExit)
                | (Self::NormalExit | Self::AbnormalExit, Self::Closed)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Entered => "entered",
            Self::InUse => "in-use",
            Self::NormalExit => "normal-exit",
            Self::AbnormalExit => "abnormal-exit",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// How a scope ended from the caller's point of view.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The body completed and produced a value.
    Completed(T),
    /// The body failed and the policy swallowed the error.
    ///
    /// The error is handed back so callers can still inspect it; it has
    /// already been journaled.
    Suppressed(Error),
}

impl<T> Outcome<T> {
    /// Whether the body completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Whether an error was swallowed.
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed(_))
    }

    /// The body's value, if it completed.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Suppressed(_) => None,
        }
    }

    /// The swallowed error, if any.
    pub fn suppressed(&self) -> Option<&Error> {
        match self {
            Self::Completed(_) => None,
            Self::Suppressed(err) => Some(err),
        }
    }

    /// Map the completed value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Completed(value) => Outcome::Completed(f(value)),
            Self::Suppressed(err) => Outcome::Suppressed(err),
        }
    }
}

/// Where the body's result stands after zero or more policies saw it.
pub(crate) enum Exit<T> {
    /// The body returned a value.
    Completed(T),
    /// The body failed and no policy has swallowed the error yet.
    Carried(Error),
    /// The body failed and a policy swallowed the error.
    Suppressed(Error),
}

impl<T> From<Result<T>> for Exit<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(err) => Self::Carried(err),
        }
    }
}

impl<T> From<Verdict> for Exit<T> {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Carried(err) => Self::Carried(err),
            Verdict::Suppressed(err) => Self::Suppressed(err),
        }
    }
}

impl<T> Exit<T> {
    /// Close `guard` under `policy`, handing it the carried error if there
    /// is one. Cleanup failures are appended to `failures`.
    pub(crate) fn close<R: Resource>(
        self,
        guard: &mut Guard<R>,
        policy: Policy,
        failures: &mut Vec<Error>,
    ) -> Self {
        match self {
            Self::Carried(err) => {
                let finish = guard.fail(policy, err);
                failures.extend(finish.failures);
                finish.verdict.into()
            }
            settled => {
                failures.extend(guard.complete(policy));
                settled
            }
        }
    }
}

/// Turn an exit into what the caller sees.
///
/// Cleanup failures always surface; they are combined with a carried error
/// when there is one.
pub(crate) fn resolve<T>(exit: Exit<T>, failures: Vec<Error>) -> Result<Outcome<T>> {
    match exit {
        Exit::Carried(err) => Err(err.with_cleanup(failures)),
        Exit::Completed(value) => settle(Outcome::Completed(value), failures),
        Exit::Suppressed(err) => settle(Outcome::Suppressed(err), failures),
    }
}

fn settle<T>(outcome: Outcome<T>, failures: Vec<Error>) -> Result<Outcome<T>> {
    match Error::combine(None, failures) {
        Some(err) => Err(err),
        None => Ok(outcome),
    }
}

/// Keeps a guard while its body runs.
///
/// If the body unwinds, the guard is aborted under the scope's policy, so
/// transactional resources roll back before they are released.
struct Armed<R: Resource> {
    guard: Guard<R>,
    policy: Policy,
}

impl<R: Resource> Drop for Armed<R> {
    fn drop(&mut self) {
        if !self.guard.is_open() {
            return;
        }
        let cause = Error::InvalidState {
            resource_id: self.guard.name().to_string(),
            state: "abandoned while in use".to_string(),
        };
        for failure in self.guard.abort(self.policy, &cause) {
            tracing::error!(
                resource_id = self.guard.name(),
                error = %failure,
                "cleanup failed while unwinding scope"
            );
        }
    }
}

/// A single-resource scope with a fixed exit policy.
#[derive(Debug)]
pub struct Scope {
    id: Uuid,
    policy: Policy,
    phase: Phase,
    journal: Journal,
}

impl Scope {
    /// Create a scope that will apply `policy` on exit.
    pub fn new(policy: Policy, journal: &Journal) -> Self {
        Self {
            id: Uuid::new_v4(),
            policy,
            phase: Phase::Entered,
            journal: journal.clone(),
        }
    }

    /// Unique identifier, attached to the tracing span.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The exit policy.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self, resource_id: &str, next: Phase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                resource_id: resource_id.to_string(),
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        tracing::trace!(scope = %self.id, from = %self.phase, to = %next, "scope transition");
        self.phase = next;
        Ok(())
    }

    /// Acquire `R`, run `body` against it, and apply the exit policy.
    ///
    /// Acquisition failures always propagate. Body errors are suppressed or
    /// propagated per the policy. Cleanup failures always propagate,
    /// combined with a propagated body error when both happen.
    ///
    /// A scope runs once; running it again is an
    /// [`Error::InvalidStateTransition`].
    pub fn run<R, T, F>(
        &mut self,
        name: impl Into<String>,
        config: &R::Config,
        body: F,
    ) -> Result<Outcome<T>>
    where
        R: Acquire,
        F: FnOnce(&mut R) -> Result<T>,
    {
        let name = name.into();
        if !self.phase.can_transition_to(Phase::InUse) {
            return Err(Error::InvalidStateTransition {
                resource_id: name,
                from: self.phase.to_string(),
                to: Phase::InUse.to_string(),
            });
        }

        let span = tracing::debug_span!(
            "scope",
            id = %self.id,
            resource = %name,
            policy = %self.policy
        );
        let _entered = span.enter();

        let guard = match Guard::<R>::acquire(name.as_str(), config, &self.journal) {
            Ok(guard) => guard,
            Err(err) => {
                self.advance(&name, Phase::Closed)?;
                return Err(err);
            }
        };
        let mut armed = Armed {
            guard,
            policy: self.policy,
        };
        self.advance(&name, Phase::InUse)?;

        let exit = Exit::from(armed.guard.get_mut().and_then(body));
        let phase = match exit {
            Exit::Completed(_) => Phase::NormalExit,
            _ => Phase::AbnormalExit,
        };
        self.advance(&name, phase)?;

        let mut failures = Vec::new();
        let exit = exit.close(&mut armed.guard, self.policy, &mut failures);
        self.advance(&name, Phase::Closed)?;

        resolve(exit, failures)
    }
}

/// One-shot form of [`Scope::run`].
pub fn scoped<R, T, F>(
    name: impl Into<String>,
    config: &R::Config,
    policy: Policy,
    journal: &Journal,
    body: F,
) -> Result<Outcome<T>>
where
    R: Acquire,
    F: FnOnce(&mut R) -> Result<T>,
{
    Scope::new(policy, journal).run(name, config, body)
}
