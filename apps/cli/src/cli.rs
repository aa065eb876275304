//! Command-line definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use scopekit_log::Format;

#[derive(Parser, Debug)]
#[command(name = "scopekit")]
#[command(about = "Scoped resource management demonstrations")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "SCOPEKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory demo files are created in
    #[arg(short, long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Log filter directive (e.g. "debug", "warn,scopekit_resource=trace")
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_parser = parse_format)]
    pub log_format: Option<Format>,

    /// Keep generated files instead of removing them at the end
    #[arg(long, global = true)]
    pub keep_files: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a demonstration scenario
    Demo {
        /// Scenario to run
        #[arg(value_enum)]
        name: DemoName,

        /// Print the lifecycle journal after each scenario
        #[arg(long)]
        journal: bool,
    },
    /// Print the effective configuration as JSON
    Config,
}

/// Demonstration scenarios
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemoName {
    /// A temporary file written, read back and deleted
    TempFile,
    /// One scope writes a file, another reads it
    ReaderWriter,
    /// Several files opened through one stack
    MultiFile,
    /// Files, connections, a lock and a timer in one stack
    Heterogeneous,
    /// A transaction committed on normal exit
    Transaction,
    /// Connections composed with an append-only log, with and without failure
    Connection,
    /// Two files and a transaction when the body fails mid-way
    Failure,
    /// Every scenario in order
    All,
}

fn parse_format(s: &str) -> Result<Format, String> {
    s.parse().map_err(|e: scopekit_log::Error| e.to_string())
}
