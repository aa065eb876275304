//! Logger settings and their presets

use serde::{Deserialize, Serialize};

/// Everything the subscriber needs to know.
///
/// Missing fields fall back to [`Config::default`] when deserializing, so a
/// settings file only has to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filter directive (e.g. "info", "debug,scopekit_resource=trace")
    pub level: String,

    /// How events are rendered
    pub format: Format,

    /// Where events are written
    pub writer: Writer,

    /// Which fields accompany each event
    pub display: DisplayConfig,
}

/// Event rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Multi-line, indented, for reading at a terminal
    Pretty,
    /// One line per event
    Compact,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for Format {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(crate::Error::Config(format!("unknown log format: {other}"))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

/// Output stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Writer {
    /// Standard error, keeping stdout free for command output
    #[default]
    Stderr,
    /// Standard output
    Stdout,
}

/// Per-event decorations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Prefix events with a timestamp
    pub time: bool,
    /// Include `file:line` of the call site
    pub source: bool,
    /// Include the module path the event came from
    pub target: bool,
    /// Include the emitting thread's id
    pub thread_ids: bool,
    /// ANSI colors (ignored by the JSON format)
    pub colors: bool,
    /// JSON only: list the enclosing spans (scope and stack ids)
    pub span_list: bool,
    /// JSON only: put event fields at the top level
    pub flatten: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            writer: Writer::Stderr,
            display: DisplayConfig::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time: true,
            source: cfg!(debug_assertions),
            target: true,
            thread_ids: false,
            colors: std::io::IsTerminal::is_terminal(&std::io::stderr()),
            span_list: true,
            flatten: true,
        }
    }
}

// ============================================================================
// Presets
// ============================================================================

impl Config {
    /// Read the process environment.
    ///
    /// `SCOPEKIT_LOG` wins over `RUST_LOG`; `SCOPEKIT_LOG_FORMAT` picks the
    /// format; `SCOPEKIT_LOG_TIME`, `SCOPEKIT_LOG_SOURCE` and
    /// `SCOPEKIT_LOG_COLORS` toggle display options.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(level) = lookup("SCOPEKIT_LOG").or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        }

        // Unknown formats fall back to compact
        if let Some(format) = lookup("SCOPEKIT_LOG_FORMAT") {
            config.format = format.parse().unwrap_or(Format::Compact);
        }

        config.display.apply_lookup(&lookup);
        config
    }

    /// Pick a configuration without being told which.
    ///
    /// A filter variable in the environment means the environment decides.
    /// Otherwise debug builds get [`development`](Self::development) and
    /// release builds [`production`](Self::production).
    pub fn auto(lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup("SCOPEKIT_LOG").is_some() || lookup("RUST_LOG").is_some() {
            Self::from_lookup(lookup)
        } else if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Pretty, colored output with every resource lifecycle transition.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug,scopekit_resource=trace".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                colors: true,
                source: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// JSON lines at info level for collection by another process.
    #[must_use]
    pub fn production() -> Self {
        Self {
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                source: false,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Everything, uncolored and untimed, so captured output is stable.
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: "trace".to_string(),
            display: DisplayConfig {
                colors: false,
                time: false,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }
}

impl DisplayConfig {
    /// Display toggles set through the environment, as `(field, value)`.
    ///
    /// Any value other than `0` or `false` turns the toggle on.
    pub fn env_overrides(lookup: impl Fn(&str) -> Option<String>) -> Vec<(&'static str, bool)> {
        [
            ("SCOPEKIT_LOG_TIME", "time"),
            ("SCOPEKIT_LOG_SOURCE", "source"),
            ("SCOPEKIT_LOG_COLORS", "colors"),
        ]
        .into_iter()
        .filter_map(|(var, field)| lookup(var).map(|v| (field, v != "0" && v != "false")))
        .collect()
    }

    fn apply_lookup(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        for (field, on) in Self::env_overrides(lookup) {
            match field {
                "time" => self.time = on,
                "source" => self.source = on,
                "colors" => self.colors = on,
                _ => {}
            }
        }
    }
}
