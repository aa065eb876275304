//! Simulated transactions over an in-memory statement store
//!
//! A [`Transaction`] stages statements; only [`Resource::commit`] moves
//! them into the shared [`Database`]. Rollback and release both discard
//! whatever is still staged, so a transaction that never commits leaves
//! the database untouched.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::resource::{Acquire, Config, Resource, ResourceKind};

/// Committed statements, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct Database {
    committed: Arc<Mutex<Vec<String>>>,
}

impl Database {
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements committed so far, in commit order.
    #[must_use]
    pub fn committed(&self) -> Vec<String> {
        self.committed.lock().clone()
    }

    /// Number of committed statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.committed.lock().len()
    }

    /// Whether nothing has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply(&self, statements: Vec<String>) {
        self.committed.lock().extend(statements);
    }
}

/// Transaction configuration
#[derive(Debug, Clone, Default)]
pub struct TransactionConfig {
    /// Database the transaction commits into
    pub database: Database,
}

impl TransactionConfig {
    /// Begin transactions against `database`.
    pub fn new(database: &Database) -> Self {
        Self {
            database: database.clone(),
        }
    }
}

impl Config for TransactionConfig {}

/// An open transaction.
#[derive(Debug)]
pub struct Transaction {
    name: String,
    database: Database,
    staged: Vec<String>,
    open: bool,
}

impl Transaction {
    /// Stage `statement` for the next commit.
    pub fn execute(&mut self, statement: impl Into<String>) -> Result<()> {
        if !self.open {
            return Err(Error::InvalidState {
                resource_id: self.name.clone(),
                state: "finished".to_string(),
            });
        }
        let statement = statement.into();
        if statement.trim().is_empty() {
            return Err(Error::operation(&self.name, "empty statement"));
        }
        tracing::trace!(resource_id = %self.name, %statement, "staged");
        self.staged.push(statement);
        Ok(())
    }

    /// Statements waiting for commit.
    pub fn staged(&self) -> &[String] {
        &self.staged
    }

    /// Whether commit or rollback has not happened yet.
    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Resource for Transaction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Transaction
    }

    fn commit(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::release(&self.name, "commit after transaction finished"));
        }
        let statements = std::mem::take(&mut self.staged);
        tracing::debug!(resource_id = %self.name, count = statements.len(), "applying");
        self.database.apply(statements);
        self.open = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::release(&self.name, "rollback after transaction finished"));
        }
        tracing::debug!(resource_id = %self.name, count = self.staged.len(), "discarding");
        self.staged.clear();
        self.open = false;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if !self.staged.is_empty() {
            tracing::warn!(
                resource_id = %self.name,
                count = self.staged.len(),
                "released with uncommitted statements; discarding"
            );
            self.staged.clear();
        }
        self.open = false;
        Ok(())
    }
}

impl Acquire for Transaction {
    type Config = TransactionConfig;

    fn acquire(name: &str, config: &TransactionConfig) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            database: config.database.clone(),
            staged: Vec::new(),
            open: true,
        })
    }
}
