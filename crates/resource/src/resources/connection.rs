//! Simulated service connection

use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resource::{Acquire, Config, Resource, ResourceKind};

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionConfig {
    /// Service or database to connect to
    pub database: String,
}

impl ConnectionConfig {
    /// Connect to `database`.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
        }
    }
}

impl Config for ConnectionConfig {
    fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::configuration("Database name cannot be empty"));
        }
        Ok(())
    }
}

/// An open connection. Queries are counted, not executed.
#[derive(Debug)]
pub struct Connection {
    name: String,
    database: String,
    opened_at: Instant,
    queries: u64,
}

impl Connection {
    /// The service this connection talks to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Number of queries issued so far.
    pub fn query_count(&self) -> u64 {
        self.queries
    }

    /// Issue a statement and return a synthetic row count.
    pub fn query(&mut self, statement: &str) -> Result<u64> {
        let statement = statement.trim();
        if statement.is_empty() {
            return Err(Error::operation(&self.name, "empty statement"));
        }
        self.queries += 1;
        tracing::debug!(
            resource_id = %self.name,
            database = %self.database,
            statement,
            "query"
        );
        Ok(statement.split_whitespace().count() as u64)
    }
}

impl Resource for Connection {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Connection
    }

    fn release(&mut self) -> Result<()> {
        tracing::info!(
            resource_id = %self.name,
            database = %self.database,
            queries = self.queries,
            held_ms = self.opened_at.elapsed().as_millis(),
            "disconnected"
        );
        Ok(())
    }
}

impl Acquire for Connection {
    type Config = ConnectionConfig;

    fn acquire(name: &str, config: &ConnectionConfig) -> Result<Self> {
        tracing::info!(resource_id = %name, database = %config.database, "connected");
        Ok(Self {
            name: name.to_string(),
            database: config.database.clone(),
            opened_at: Instant::now(),
            queries: 0,
        })
    }
}
