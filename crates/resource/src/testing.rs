//! Testing utilities for scoped resources
//!
//! [`MockResource`] records every lifecycle call into a shared [`CallLog`]
//! and can be told to fail at any step through [`MockBehavior`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::resource::{Acquire, Config, Resource, ResourceKind};

/// Record of resource calls for testing verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceCall {
    /// The resource was opened.
    Acquire(String),
    /// A unit of work ran against the handle.
    Use(String),
    /// Pending work was committed.
    Commit(String),
    /// Pending work was rolled back.
    Rollback(String),
    /// The handle was released.
    Release(String),
}

impl ResourceCall {
    /// The resource this call targeted.
    pub fn resource_id(&self) -> &str {
        match self {
            Self::Acquire(id)
            | Self::Use(id)
            | Self::Commit(id)
            | Self::Rollback(id)
            | Self::Release(id) => id,
        }
    }
}

/// Shared, ordered log of calls made against mock resources.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<ResourceCall>>>,
}

impl CallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: ResourceCall) {
        self.calls.lock().push(call);
    }

    /// Snapshot of all calls in order.
    pub fn calls(&self) -> Vec<ResourceCall> {
        self.calls.lock().clone()
    }

    /// Number of calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&ResourceCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Resource IDs in release order.
    pub fn releases(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ResourceCall::Release(_)))
            .map(|c| c.resource_id().to_string())
            .collect()
    }

    /// Number of release calls made against `resource_id`.
    pub fn releases_of(&self, resource_id: &str) -> usize {
        self.count(|c| matches!(c, ResourceCall::Release(id) if id == resource_id))
    }
}

/// Which lifecycle steps a [`MockResource`] should fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockBehavior {
    /// Fail in `acquire`.
    pub fail_acquire: bool,
    /// Fail in `release` (the handle is still freed).
    pub fail_release: bool,
    /// Fail in `commit`.
    pub fail_commit: bool,
    /// Fail in `rollback`.
    pub fail_rollback: bool,
}

/// Configuration for [`MockResource`].
#[derive(Debug, Clone)]
pub struct MockConfig {
    log: CallLog,
    behavior: MockBehavior,
    valid: bool,
}

impl MockConfig {
    /// Config that records into `log` and never fails.
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            behavior: MockBehavior::default(),
            valid: true,
        }
    }

    /// Set the failure behavior.
    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Make `validate` reject this config.
    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }
}

impl Config for MockConfig {
    fn validate(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::configuration("mock configured as invalid"))
        }
    }
}

/// Mock resource implementation for testing
#[derive(Debug)]
pub struct MockResource {
    name: String,
    log: CallLog,
    behavior: MockBehavior,
}

impl MockResource {
    /// Run a unit of work. An operation named `"fail"` fails.
    pub fn perform(&mut self, operation: &str) -> Result<()> {
        self.log.push(ResourceCall::Use(self.name.clone()));
        if operation == "fail" {
            return Err(Error::operation(&self.name, "operation flagged as invalid"));
        }
        Ok(())
    }
}

impl Resource for MockResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Custom
    }

    fn release(&mut self) -> Result<()> {
        self.log.push(ResourceCall::Release(self.name.clone()));
        if self.behavior.fail_release {
            return Err(Error::release(&self.name, "simulated release failure"));
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.log.push(ResourceCall::Commit(self.name.clone()));
        if self.behavior.fail_commit {
            return Err(Error::operation(&self.name, "simulated commit failure"));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.log.push(ResourceCall::Rollback(self.name.clone()));
        if self.behavior.fail_rollback {
            return Err(Error::operation(&self.name, "simulated rollback failure"));
        }
        Ok(())
    }
}

impl Acquire for MockResource {
    type Config = MockConfig;

    fn acquire(name: &str, config: &MockConfig) -> Result<Self> {
        if config.behavior.fail_acquire {
            return Err(Error::acquisition(name, "simulated acquisition failure"));
        }
        config.log.push(ResourceCall::Acquire(name.to_string()));
        Ok(Self {
            name: name.to_string(),
            log: config.log.clone(),
            behavior: config.behavior,
        })
    }
}
