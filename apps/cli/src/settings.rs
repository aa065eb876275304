//! Layered configuration: defaults → TOML file → environment → CLI flags

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Environment keys owned by the logger rather than the settings tree.
const LOGGER_KEYS: &[&str] = &[
    "log",
    "log_format",
    "log_time",
    "log_source",
    "log_colors",
    "config",
];

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory demo files are created in
    pub workdir: PathBuf,
    /// Keep generated files instead of removing them
    pub keep_files: bool,
    /// Logger configuration
    pub log: scopekit_log::Config,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            keep_files: false,
            log: scopekit_log::Config {
                level: "warn".to_string(),
                ..scopekit_log::Config::default()
            },
        }
    }
}

impl Settings {
    /// Resolve settings for `cli`, reading the process environment.
    pub fn load(cli: &Cli) -> Result<Self> {
        if let Some(path) = &cli.config {
            anyhow::ensure!(path.is_file(), "config file not found: {}", path.display());
        }
        Self::figment(cli.config.as_deref(), cli)
            .extract()
            .context("invalid configuration")
    }

    /// Build the provider chain without extracting it.
    pub fn figment(file: Option<&Path>, cli: &Cli) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }

        // SCOPEKIT_WORKDIR, SCOPEKIT_KEEP_FILES, SCOPEKIT_LOG__FORMAT, ...
        figment = figment
            .merge(Env::prefixed("SCOPEKIT_").ignore(LOGGER_KEYS).split("__"))
            .merge(Env::raw().only(&["RUST_LOG"]).map(|_| "log.level".into()))
            .merge(Env::raw().only(&["SCOPEKIT_LOG"]).map(|_| "log.level".into()))
            .merge(
                Env::raw()
                    .only(&["SCOPEKIT_LOG_FORMAT"])
                    .map(|_| "log.format".into()),
            );
        let display = scopekit_log::DisplayConfig::env_overrides(|key| std::env::var(key).ok());
        for (field, on) in display {
            figment = figment.merge(Serialized::default(&format!("log.display.{field}"), on));
        }

        if let Some(workdir) = &cli.workdir {
            figment = figment.merge(Serialized::default("workdir", workdir));
        }
        if let Some(level) = &cli.log_level {
            figment = figment.merge(Serialized::default("log.level", level));
        }
        if let Some(format) = cli.log_format {
            figment = figment.merge(Serialized::default("log.format", format));
        }
        if cli.keep_files {
            figment = figment.merge(Serialized::default("keep_files", true));
        }
        figment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use figment::Jail;
    use scopekit_log::Format;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scopekit").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_apply_without_sources() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let settings: Settings = Settings::figment(None, &parse(&["config"])).extract()?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn file_then_env_then_flags() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "scopekit.toml",
                r#"
                workdir = "from-file"
                keep_files = true

                [log]
                level = "info"
                format = "pretty"
                "#,
            )?;
            let path = Path::new("scopekit.toml");

            let cli = parse(&["config"]);
            let settings: Settings = Settings::figment(Some(path), &cli).extract()?;
            assert_eq!(settings.workdir, PathBuf::from("from-file"));
            assert!(settings.keep_files);
            assert_eq!(settings.log.format, Format::Pretty);

            jail.set_env("SCOPEKIT_WORKDIR", "from-env");
            jail.set_env("SCOPEKIT_LOG", "debug");
            let settings: Settings = Settings::figment(Some(path), &cli).extract()?;
            assert_eq!(settings.workdir, PathBuf::from("from-env"));
            assert_eq!(settings.log.level, "debug");

            let cli = parse(&["--workdir", "from-flag", "--log-format", "json", "config"]);
            let settings: Settings = Settings::figment(Some(path), &cli).extract()?;
            assert_eq!(settings.workdir, PathBuf::from("from-flag"));
            assert_eq!(settings.log.format, Format::Json);
            assert_eq!(settings.log.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn scopekit_log_wins_over_rust_log() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("RUST_LOG", "trace");
            let settings: Settings = Settings::figment(None, &parse(&["config"])).extract()?;
            assert_eq!(settings.log.level, "trace");

            jail.set_env("SCOPEKIT_LOG", "error");
            let settings: Settings = Settings::figment(None, &parse(&["config"])).extract()?;
            assert_eq!(settings.log.level, "error");
            Ok(())
        });
    }

    #[test]
    fn display_toggles_come_from_the_environment() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("scopekit.toml", "[log.display]\ntime = true\ncolors = true\n")?;
            let path = Path::new("scopekit.toml");
            let cli = parse(&["config"]);

            jail.set_env("SCOPEKIT_LOG_TIME", "0");
            jail.set_env("SCOPEKIT_LOG_SOURCE", "1");
            jail.set_env("SCOPEKIT_LOG_COLORS", "false");
            let settings: Settings = Settings::figment(Some(path), &cli).extract()?;
            assert!(!settings.log.display.time);
            assert!(settings.log.display.source);
            assert!(!settings.log.display.colors);

            // Flags the environment leaves alone keep their file value.
            jail.clear_env();
            let settings: Settings = Settings::figment(Some(path), &cli).extract()?;
            assert!(settings.log.display.time);
            assert!(settings.log.display.colors);
            Ok(())
        });
    }

    #[test]
    fn missing_config_file_is_an_error() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let err = Settings::load(&parse(&["--config", "absent.toml", "config"])).unwrap_err();
            assert!(err.to_string().contains("absent.toml"));
            Ok(())
        });
    }
}
