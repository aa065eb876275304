//! Named locks held for the lifetime of a scope

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::resource::{Acquire, Config, Resource, ResourceKind};

/// Registry of held lock names. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    held: Arc<Mutex<HashSet<String>>>,
}

impl LockTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is currently held.
    #[must_use]
    pub fn is_held(&self, name: &str) -> bool {
        self.held.lock().contains(name)
    }

    /// Names currently held, sorted.
    #[must_use]
    pub fn held(&self) -> Vec<String> {
        let mut names: Vec<_> = self.held.lock().iter().cloned().collect();
        names.sort();
        names
    }

    fn try_take(&self, name: &str) -> bool {
        self.held.lock().insert(name.to_string())
    }

    fn give_back(&self, name: &str) -> bool {
        self.held.lock().remove(name)
    }
}

/// Lock configuration
#[derive(Debug, Clone, Default)]
pub struct LockConfig {
    /// Table the lock is registered in
    pub table: LockTable,
}

impl LockConfig {
    /// Lock against `table`.
    pub fn new(table: &LockTable) -> Self {
        Self {
            table: table.clone(),
        }
    }
}

impl Config for LockConfig {}

/// A held lock. The resource name is the lock name.
#[derive(Debug)]
pub struct LockResource {
    name: String,
    table: LockTable,
}

impl Resource for LockResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Lock
    }

    fn release(&mut self) -> Result<()> {
        if !self.table.give_back(&self.name) {
            return Err(Error::release(&self.name, "lock was not held"));
        }
        tracing::debug!(resource_id = %self.name, "lock released");
        Ok(())
    }
}

impl Acquire for LockResource {
    type Config = LockConfig;

    fn acquire(name: &str, config: &LockConfig) -> Result<Self> {
        if !config.table.try_take(name) {
            return Err(Error::acquisition(name, "lock already held"));
        }
        tracing::debug!(resource_id = %name, "lock acquired");
        Ok(Self {
            name: name.to_string(),
            table: config.table.clone(),
        })
    }
}
