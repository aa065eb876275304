//! # Scopekit Log
//!
//! Subscriber installation for `tracing`: a level filter, an output format
//! and a handful of display toggles, with presets for development,
//! production and tests.
//!
//! ```rust
//! use scopekit_log::prelude::*;
//!
//! let _guard = scopekit_log::auto_init()?;
//! info!(resource = "temp.txt", "acquired");
//! # Ok::<(), scopekit_log::Error>(())
//! ```

#![forbid(unsafe_code)]

mod builder;
mod config;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Format, Writer};

pub use tracing::{debug, error, info, trace, warn};

/// The names most callers need
pub mod prelude {
    pub use crate::{Config, Format, Result, auto_init, init, init_with};
    pub use tracing::{debug, error, info, trace, warn};
}

/// Result alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Why a subscriber could not be set up
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A setting could not be understood
    #[error("Configuration error: {0}")]
    Config(String),

    /// The level directive does not parse as an `EnvFilter`
    #[error("Invalid filter: {0}")]
    Filter(String),

    /// A global subscriber is already installed
    #[error("Logger initialization failed: {0}")]
    Init(String),
}

// ============================================================================
// Installation
// ============================================================================

/// Install [`Config::auto`] unless some subscriber is already active.
///
/// An existing subscriber is not an error here; the returned guard is
/// inactive instead.
pub fn auto_init() -> Result<LoggerGuard> {
    if tracing::dispatcher::has_been_set() {
        return Ok(LoggerGuard::noop());
    }
    init_with(Config::auto(|key| std::env::var(key).ok()))
}

/// Install [`Config::default`].
pub fn init() -> Result<LoggerGuard> {
    init_with(Config::default())
}

/// Install `config` as the global subscriber.
///
/// Fails with [`Error::Init`] when one is already installed.
pub fn init_with(config: Config) -> Result<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Install [`Config::test`] once per process; later calls get an inactive guard.
pub fn init_test() -> Result<LoggerGuard> {
    if tracing::dispatcher::has_been_set() {
        return Ok(LoggerGuard::noop());
    }
    init_with(Config::test())
}
