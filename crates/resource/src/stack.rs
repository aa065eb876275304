//! LIFO composition of heterogeneous scoped resources.
//!
//! A [`ResourceStack`] owns every guard pushed onto it and unwinds them in
//! strict reverse order. Each member keeps its own [`Policy`]. The error
//! that ended the composed scope is offered to the most recently acquired
//! member first; if that member's policy suppresses it, the members below
//! see a normal exit, exactly as nested single-resource scopes would.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::Journal;
use crate::guard::{Finish, Guard};
use crate::policy::Policy;
use crate::resource::{Acquire, Resource};
use crate::scope::{Exit, Outcome, resolve};

/// Typed handle to a member of a [`ResourceStack`].
///
/// A slot is only valid on the stack that issued it, and only until that
/// stack next unwinds. After that it resolves to an `InvalidState` error,
/// never to a member pushed later.
pub struct Slot<R> {
    stack: Uuid,
    generation: u64,
    index: usize,
    _marker: PhantomData<fn() -> R>,
}

impl<R> Slot<R> {
    /// Position in acquisition order (0 = first acquired).
    pub fn index(self) -> usize {
        self.index
    }
}

impl<R> Clone for Slot<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Slot<R> {}

impl<R> fmt::Debug for Slot<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("stack", &self.stack)
            .field("generation", &self.generation)
            .field("index", &self.index)
            .field("type", &std::any::type_name::<R>())
            .finish()
    }
}

/// Type-erased view of a guard and its policy.
trait Member {
    fn name(&self) -> &str;
    fn complete(&mut self) -> Vec<Error>;
    fn fail(&mut self, err: Error) -> Finish;
    fn abort(&mut self, cause: &Error) -> Vec<Error>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Held<R: Resource> {
    guard: Guard<R>,
    policy: Policy,
}

impl<R: Resource> Member for Held<R> {
    fn name(&self) -> &str {
        self.guard.name()
    }

    fn complete(&mut self) -> Vec<Error> {
        self.guard.complete(self.policy)
    }

    fn fail(&mut self, err: Error) -> Finish {
        self.guard.fail(self.policy, err)
    }

    fn abort(&mut self, cause: &Error) -> Vec<Error> {
        self.guard.abort(self.policy, cause)
    }

    fn as_any(&self) -> &dyn Any {
        &self.guard
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.guard
    }
}

/// Ordered ledger of acquired resources with guaranteed best-effort unwind.
pub struct ResourceStack {
    id: Uuid,
    // Bumped every time the members are unwound; invalidates older slots.
    generation: u64,
    members: Vec<Box<dyn Member>>,
    journal: Journal,
}

impl ResourceStack {
    /// Create an empty stack that journals into `journal`.
    pub fn new(journal: &Journal) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation: 0,
            members: Vec::new(),
            journal: journal.clone(),
        }
    }

    /// Run `body` as a composed scope.
    ///
    /// Whatever `body` acquires through the stack is unwound when it
    /// returns, whichever way it returns.
    pub fn run<T>(
        journal: &Journal,
        body: impl FnOnce(&mut ResourceStack) -> Result<T>,
    ) -> Result<Outcome<T>> {
        let mut stack = Self::new(journal);
        let span = tracing::debug_span!("resource_stack", id = %stack.id);
        let _entered = span.enter();

        let result = body(&mut stack);
        stack.exit(result)
    }

    /// Number of members still held.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member names in acquisition order.
    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }

    /// Take ownership of an already-open guard.
    pub fn push<R: Resource>(&mut self, guard: Guard<R>, policy: Policy) -> Slot<R> {
        tracing::debug!(stack = %self.id, resource_id = guard.name(), %policy, "pushed");
        self.members.push(Box::new(Held { guard, policy }));
        Slot {
            stack: self.id,
            generation: self.generation,
            index: self.members.len() - 1,
            _marker: PhantomData,
        }
    }

    /// Open `R` and push it.
    ///
    /// If opening fails, every member already held is unwound (reverse
    /// order, transactional members roll back) before the acquisition error
    /// is returned. Cleanup failures from that unwind are attached to it.
    pub fn acquire<R: Acquire>(
        &mut self,
        name: impl Into<String>,
        config: &R::Config,
        policy: Policy,
    ) -> Result<Slot<R>> {
        match Guard::<R>::acquire(name, config, &self.journal) {
            Ok(guard) => Ok(self.push(guard, policy)),
            Err(err) => {
                let failures = self.abort(&err);
                Err(err.with_cleanup(failures))
            }
        }
    }

    /// Borrow a member's handle.
    pub fn get<R: Resource>(&self, slot: Slot<R>) -> Result<&R> {
        self.check(slot)?;
        self.members
            .get(slot.index)
            .and_then(|m| m.as_any().downcast_ref::<Guard<R>>())
            .ok_or_else(|| Self::not_held(slot))?
            .get()
    }

    /// Mutably borrow a member's handle.
    pub fn get_mut<R: Resource>(&mut self, slot: Slot<R>) -> Result<&mut R> {
        self.check(slot)?;
        self.members
            .get_mut(slot.index)
            .and_then(|m| m.as_any_mut().downcast_mut::<Guard<R>>())
            .ok_or_else(|| Self::not_held(slot))?
            .get_mut()
    }

    fn check<R>(&self, slot: Slot<R>) -> Result<()> {
        if slot.stack != self.id {
            return Err(Error::InvalidState {
                resource_id: format!("slot #{}", slot.index),
                state: format!("issued by stack {}, not {}", slot.stack, self.id),
            });
        }
        if slot.generation != self.generation {
            return Err(Error::InvalidState {
                resource_id: format!("slot #{}", slot.index),
                state: "released by an earlier unwind".to_string(),
            });
        }
        Ok(())
    }

    fn not_held<R>(slot: Slot<R>) -> Error {
        Error::InvalidState {
            resource_id: format!("slot #{}", slot.index),
            state: "not held by this stack".to_string(),
        }
    }

    /// Unwind every member as a normal exit.
    ///
    /// Every member is released even if some fail; all failures are
    /// reported together.
    pub fn unwind(&mut self) -> Result<()> {
        self.exit(Ok(())).map(|_| ())
    }

    /// Unwind every member, classifying the exit from `result`.
    pub fn exit<T>(&mut self, result: Result<T>) -> Result<Outcome<T>> {
        let mut exit = Exit::from(result);
        let mut failures = Vec::new();

        while let Some(mut member) = self.members.pop() {
            exit = match exit {
                Exit::Carried(err) => {
                    let finish = member.fail(err);
                    failures.extend(finish.failures);
                    finish.verdict.into()
                }
                settled => {
                    failures.extend(member.complete());
                    settled
                }
            };
        }
        self.generation += 1;

        resolve(exit, failures)
    }

    fn abort(&mut self, cause: &Error) -> Vec<Error> {
        let mut failures = Vec::new();
        while let Some(mut member) = self.members.pop() {
            failures.extend(member.abort(cause));
        }
        self.generation += 1;
        failures
    }
}

impl Drop for ResourceStack {
    fn drop(&mut self) {
        if self.members.is_empty() {
            return;
        }
        // Never committed: a stack that is dropped without an explicit exit
        // rolls back.
        let cause = Error::InvalidState {
            resource_id: format!("stack {}", self.id),
            state: "dropped without unwind".to_string(),
        };
        for failure in self.abort(&cause) {
            tracing::error!(
                stack = %self.id,
                error = %failure,
                "cleanup failed while dropping stack"
            );
        }
    }
}

impl fmt::Debug for ResourceStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStack")
            .field("id", &self.id)
            .field("members", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{CallLog, MockBehavior, MockConfig, MockResource, ResourceCall};
    use pretty_assertions::assert_eq;

    fn ok(log: &CallLog) -> MockConfig {
        MockConfig::new(log.clone())
    }

    fn failing(log: &CallLog, behavior: MockBehavior) -> MockConfig {
        MockConfig::new(log.clone()).with_behavior(behavior)
    }

    #[test]
    fn unwind_is_reverse_of_acquisition() {
        let journal = Journal::new();
        let log = CallLog::new();
        let mut stack = ResourceStack::new(&journal);

        for name in ["a", "b", "c"] {
            stack
                .acquire::<MockResource>(name, &ok(&log), Policy::Propagate)
                .unwrap();
        }
        assert_eq!(stack.names(), vec!["a", "b", "c"]);

        stack.unwind().unwrap();
        assert!(stack.is_empty());
        assert_eq!(log.releases(), vec!["c", "b", "a"]);
        assert_eq!(journal.released(), vec!["c", "b", "a"]);
    }

    #[test]
    fn failed_acquisition_unwinds_earlier_members_first() {
        let journal = Journal::new();
        let log = CallLog::new();
        let mut stack = ResourceStack::new(&journal);

        stack
            .acquire::<MockResource>("a", &ok(&log), Policy::Suppress)
            .unwrap();
        stack
            .acquire::<MockResource>("b", &ok(&log), Policy::Suppress)
            .unwrap();
        let err = stack
            .acquire::<MockResource>(
                "c",
                &failing(
                    &log,
                    MockBehavior {
                        fail_acquire: true,
                        ..MockBehavior::default()
                    },
                ),
                Policy::Suppress,
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Acquisition);
        assert_eq!(log.releases(), vec!["b", "a"]);
        assert!(stack.is_empty());
    }

    #[test]
    fn failed_acquisition_rolls_back_transactional_members() {
        let journal = Journal::new();
        let log = CallLog::new();
        let mut stack = ResourceStack::new(&journal);

        stack
            .acquire::<MockResource>("tx", &ok(&log), Policy::Transactional { propagate: false })
            .unwrap();
        let _ = stack.acquire::<MockResource>("bad", &ok(&log).invalid(), Policy::Propagate);

        assert_eq!(
            log.calls(),
            vec![
                ResourceCall::Acquire("tx".into()),
                ResourceCall::Rollback("tx".into()),
                ResourceCall::Release("tx".into()),
            ]
        );
    }

    #[test]
    fn release_failures_are_all_collected() {
        let journal = Journal::new();
        let log = CallLog::new();
        let bad = MockBehavior {
            fail_release: true,
            ..MockBehavior::default()
        };
        let mut stack = ResourceStack::new(&journal);
        stack
            .acquire::<MockResource>("a", &failing(&log, bad), Policy::Propagate)
            .unwrap();
        stack
            .acquire::<MockResource>("b", &ok(&log), Policy::Propagate)
            .unwrap();
        stack
            .acquire::<MockResource>("c", &failing(&log, bad), Policy::Propagate)
            .unwrap();

        let err = stack.unwind().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unwind);
        let ids: Vec<_> = err
            .cleanup_failures()
            .iter()
            .filter_map(|e| e.resource_id())
            .collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(log.releases(), vec!["c", "b", "a"]);
    }

    #[test]
    fn inner_suppression_gives_outer_members_a_normal_exit() {
        let journal = Journal::new();
        let log = CallLog::new();

        let outcome = ResourceStack::run(&journal, |stack| {
            stack.acquire::<MockResource>(
                "outer-tx",
                &ok(&log),
                Policy::Transactional { propagate: true },
            )?;
            let inner = stack.acquire::<MockResource>("inner", &ok(&log), Policy::Suppress)?;
            stack.get_mut(inner)?.perform("fail")
        })
        .unwrap();

        assert!(outcome.is_suppressed());
        assert_eq!(log.count(|c| matches!(c, ResourceCall::Commit(_))), 1);
        assert_eq!(log.count(|c| matches!(c, ResourceCall::Rollback(_))), 0);
    }

    #[test]
    fn propagating_top_member_passes_error_down() {
        let journal = Journal::new();
        let log = CallLog::new();

        let outcome = ResourceStack::run(&journal, |stack| {
            stack.acquire::<MockResource>("bottom", &ok(&log), Policy::Suppress)?;
            let top = stack.acquire::<MockResource>("top", &ok(&log), Policy::Propagate)?;
            stack.get_mut(top)?.perform("fail")
        })
        .unwrap();

        let err = outcome.suppressed().expect("bottom member swallows");
        assert_eq!(err.resource_id(), Some("top"));
        assert_eq!(log.releases(), vec!["top", "bottom"]);
    }

    #[test]
    fn acquisition_error_inside_run_is_never_suppressed() {
        let journal = Journal::new();
        let log = CallLog::new();

        let err = ResourceStack::run(&journal, |stack| {
            stack.acquire::<MockResource>("a", &ok(&log), Policy::Suppress)?;
            stack.acquire::<MockResource>("b", &ok(&log).invalid(), Policy::Suppress)?;
            Ok(())
        })
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Acquisition);
        assert_eq!(log.releases_of("a"), 1);
    }

    #[test]
    fn slot_is_dead_once_its_member_is_released() {
        let journal = Journal::new();
        let log = CallLog::new();
        let mut stack = ResourceStack::new(&journal);
        let slot = stack
            .acquire::<MockResource>("a", &ok(&log), Policy::Propagate)
            .unwrap();
        stack.unwind().unwrap();

        assert_eq!(stack.get(slot).unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn stale_slot_does_not_reach_a_later_member_at_the_same_position() {
        let journal = Journal::new();
        let log = CallLog::new();
        let mut stack = ResourceStack::new(&journal);
        let old = stack
            .acquire::<MockResource>("old", &ok(&log), Policy::Propagate)
            .unwrap();
        stack.unwind().unwrap();

        let new = stack
            .acquire::<MockResource>("new", &ok(&log), Policy::Propagate)
            .unwrap();
        assert_eq!(old.index(), new.index());

        assert_eq!(stack.get(old).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(stack.get_mut(old).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(stack.get(new).unwrap().name(), "new");
        stack.unwind().unwrap();
    }

    #[test]
    fn slot_from_another_stack_is_rejected() {
        let journal = Journal::new();
        let log = CallLog::new();
        let mut first = ResourceStack::new(&journal);
        let mut second = ResourceStack::new(&journal);
        let foreign = first
            .acquire::<MockResource>("first", &ok(&log), Policy::Propagate)
            .unwrap();
        second
            .acquire::<MockResource>("second", &ok(&log), Policy::Propagate)
            .unwrap();

        let err = second.get(foreign).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(second.get_mut(foreign).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(first.get(foreign).unwrap().name(), "first");

        first.unwind().unwrap();
        second.unwind().unwrap();
    }

    #[test]
    fn slot_is_dead_after_a_failed_acquisition_unwinds_the_stack() {
        let journal = Journal::new();
        let log = CallLog::new();
        let mut stack = ResourceStack::new(&journal);
        let slot = stack
            .acquire::<MockResource>("a", &ok(&log), Policy::Propagate)
            .unwrap();
        let _ = stack.acquire::<MockResource>("bad", &ok(&log).invalid(), Policy::Propagate);

        let replacement = stack
            .acquire::<MockResource>("b", &ok(&log), Policy::Propagate)
            .unwrap();
        assert_eq!(stack.get(slot).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(stack.get(replacement).unwrap().name(), "b");
        stack.unwind().unwrap();
    }

    #[test]
    fn rollback_failure_during_abort_is_attached_to_the_acquisition_error() {
        let journal = Journal::new();
        let log = CallLog::new();
        let mut stack = ResourceStack::new(&journal);
        let bad_rollback = MockBehavior {
            fail_rollback: true,
            ..MockBehavior::default()
        };
        stack
            .acquire::<MockResource>(
                "tx",
                &failing(&log, bad_rollback),
                Policy::Transactional { propagate: true },
            )
            .unwrap();

        let err = stack
            .acquire::<MockResource>("bad", &ok(&log).invalid(), Policy::Propagate)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Composite);
        assert_eq!(err.primary().kind(), ErrorKind::Acquisition);
        let failures = err.cleanup_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind(), ErrorKind::Release);
        assert_eq!(failures[0].resource_id(), Some("tx"));
        assert_eq!(log.releases_of("tx"), 1);
    }

    #[test]
    fn adopted_guard_is_unwound_with_the_rest() {
        let journal = Journal::new();
        let log = CallLog::new();
        let mut stack = ResourceStack::new(&journal);
        stack
            .acquire::<MockResource>("opened", &ok(&log), Policy::Propagate)
            .unwrap();
        let handle = MockResource::acquire("adopted", &ok(&log)).unwrap();
        let slot = stack.push(Guard::adopt(handle, &journal), Policy::Propagate);

        assert_eq!(stack.get(slot).unwrap().name(), "adopted");
        stack.unwind().unwrap();
        assert_eq!(log.releases(), vec!["adopted", "opened"]);
    }

    #[test]
    fn dropping_without_unwind_rolls_back_and_releases() {
        let journal = Journal::new();
        let log = CallLog::new();
        {
            let mut stack = ResourceStack::new(&journal);
            stack
                .acquire::<MockResource>("tx", &ok(&log), Policy::Transactional { propagate: true })
                .unwrap();
            stack
                .acquire::<MockResource>("file", &ok(&log), Policy::Propagate)
                .unwrap();
        }

        assert_eq!(log.releases(), vec!["file", "tx"]);
        assert_eq!(log.count(|c| matches!(c, ResourceCall::Rollback(_))), 1);
        assert_eq!(log.count(|c| matches!(c, ResourceCall::Commit(_))), 0);
    }
}
