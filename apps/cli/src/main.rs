//! `scopekit` command-line entry point

mod cli;
mod demo;
mod settings;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::demo::Report;
use crate::settings::Settings;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;
    let _log = scopekit_log::init_with(settings.log.clone()).context("cannot start logging")?;

    let mut out = io::stdout().lock();
    match cli.command {
        Command::Demo { name, journal } => {
            for report in demo::run(name, &settings)? {
                print_report(&mut out, &report, journal)?;
            }
        }
        Command::Config => {
            writeln!(out, "{}", serde_json::to_string_pretty(&settings)?)?;
        }
    }
    Ok(())
}

fn print_report(out: &mut impl Write, report: &Report, with_journal: bool) -> io::Result<()> {
    writeln!(out, "== {} ==", report.title)?;
    for line in &report.lines {
        writeln!(out, "  {line}")?;
    }
    if with_journal {
        writeln!(out, "  journal:")?;
        for entry in &report.journal {
            writeln!(out, "    #{:<3} {entry}", entry.seq)?;
        }
    }
    for path in &report.removed {
        writeln!(out, "  removed {}", path.display())?;
    }
    writeln!(out)
}
