//! Timing span released with the scope

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::resource::{Acquire, Config, Resource, ResourceKind};

/// Timer configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerConfig {
    /// Warn at release when the scope was held longer than this.
    pub warn_after: Option<Duration>,
}

impl Config for TimerConfig {}

/// Measures how long a scope held it.
#[derive(Debug)]
pub struct Timer {
    name: String,
    started: Instant,
    warn_after: Option<Duration>,
    elapsed: Option<Duration>,
}

impl Timer {
    /// Time since acquisition, frozen at release.
    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.started.elapsed())
    }
}

impl Resource for Timer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Timer
    }

    fn release(&mut self) -> Result<()> {
        let elapsed = self.started.elapsed();
        self.elapsed = Some(elapsed);
        match self.warn_after {
            Some(limit) if elapsed > limit => tracing::warn!(
                resource_id = %self.name,
                elapsed_ms = elapsed.as_millis(),
                limit_ms = limit.as_millis(),
                "scope held longer than expected"
            ),
            _ => tracing::info!(
                resource_id = %self.name,
                elapsed_ms = elapsed.as_millis(),
                "scope timed"
            ),
        }
        Ok(())
    }
}

impl Acquire for Timer {
    type Config = TimerConfig;

    fn acquire(name: &str, config: &TimerConfig) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            started: Instant::now(),
            warn_after: config.warn_after,
            elapsed: None,
        })
    }
}
