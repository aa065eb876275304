//! Logger builder implementation

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, DisplayConfig, Format, Writer};
use crate::{Error, Result};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the logger alive
///
/// The global subscriber lives for the rest of the process; the guard marks
/// the owner of that installation and is kept for API symmetry with
/// buffered writers.
#[derive(Debug)]
#[must_use = "dropping the guard right away hides intent; bind it to `_guard`"]
pub struct LoggerGuard {
    format: Option<Format>,
}

impl LoggerGuard {
    /// A guard for a process where another subscriber was already installed.
    pub(crate) fn noop() -> Self {
        Self { format: None }
    }

    /// Whether this guard installed the global subscriber.
    pub fn is_active(&self) -> bool {
        self.format.is_some()
    }

    /// Format of the installed subscriber.
    pub fn format(&self) -> Option<Format> {
        self.format
    }
}

/// Build the fmt layer shared by the pretty and compact formats.
macro_rules! create_fmt_layer {
    ($format:ident, $display:expr, $writer:expr) => {{
        tracing_subscriber::fmt::layer()
            .$format()
            .with_writer($writer)
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids)
    }};
}

/// JSON format has extra span options.
macro_rules! create_json_layer {
    ($display:expr, $writer:expr) => {{
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer($writer)
            .with_current_span(true)
            .with_span_list($display.span_list)
            .flatten_event($display.flatten)
            .with_ansi(false)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids)
    }};
}

/// Install `Registry + filter + fmt`, dropping timestamps when disabled.
macro_rules! try_init_subscriber {
    ($filter:expr, $layer:expr, $display:expr) => {{
        if $display.time {
            Registry::default().with($filter).with($layer).try_init()
        } else {
            Registry::default()
                .with($filter)
                .with($layer.without_time())
                .try_init()
        }
    }};
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Parse the filter directive without installing anything.
    pub fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.config.level)
            .map_err(|e| Error::Filter(format!("{}: {e}", self.config.level)))
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - A global subscriber is already installed
    pub fn build(self) -> Result<LoggerGuard> {
        let filter = self.filter()?;
        let display: &DisplayConfig = &self.config.display;
        let writer = make_writer(self.config.writer);

        let installed = match self.config.format {
            Format::Pretty => {
                try_init_subscriber!(filter, create_fmt_layer!(pretty, display, writer), display)
            }
            Format::Compact => {
                try_init_subscriber!(filter, create_fmt_layer!(compact, display, writer), display)
            }
            Format::Json => {
                try_init_subscriber!(filter, create_json_layer!(display, writer), display)
            }
        };
        installed.map_err(|e| Error::Init(e.to_string()))?;

        tracing::debug!(
            level = %self.config.level,
            format = %self.config.format,
            "logger initialized"
        );
        Ok(LoggerGuard {
            format: Some(self.config.format),
        })
    }
}

fn make_writer(writer: Writer) -> BoxMakeWriter {
    match writer {
        Writer::Stderr => BoxMakeWriter::new(std::io::stderr),
        Writer::Stdout => BoxMakeWriter::new(std::io::stdout),
    }
}
