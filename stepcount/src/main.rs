//! # stepcount
//!
//! A CLI tool that counts effective source lines and records them in an xlsx
//! report, updating rows it has seen before and appending new ones.
//!
//! ## Overview
//!
//! stepcount is built on top of stepcountlib. The YAML config names the
//! report workbook, its settings and results sheets, and the comment
//! markers; the settings sheet lists the directories to scan and the file
//! extensions to count.
//!
//! ## Usage
//!
//! ```bash
//! # Run with ./data.yaml
//! stepcount
//!
//! # Run with another config
//! stepcount path/to/config.yaml
//!
//! # Show what would change without writing the report
//! stepcount --dry-run
//!
//! # Machine-readable summary
//! stepcount --output json
//!
//! # More logging (or set RUST_LOG)
//! stepcount -vv
//! ```

mod render;

use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use stepcountlib::{run, RunOptions, RunSummary, DEFAULT_CONFIG_FILE};
use tracing_subscriber::EnvFilter;

/// Build the clap Command structure
fn build_command() -> Command {
    Command::new("stepcount")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Arthur Debert")
        .about("Counts effective source lines and records them in an xlsx report")
        .arg(
            Arg::new("config")
                .help("Path to the YAML config file")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Compute the merge without writing the report"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Summary format"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase log verbosity (can be repeated)"),
        )
}

/// Map `-v` occurrences to a default filter directive.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `-v` when set. Fails if a global
/// subscriber is already installed.
fn init_logging(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}

fn print_summary(summary: &RunSummary, matches: &ArgMatches) -> Result<(), anyhow::Error> {
    let output = matches
        .get_one::<String>("output")
        .map(|s| s.as_str())
        .unwrap_or("text");

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{}", render::summary(summary));
    }
    Ok(())
}

fn execute(matches: &ArgMatches) -> Result<(), anyhow::Error> {
    let config = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_CONFIG_FILE);
    let options = RunOptions::new().dry_run(matches.get_flag("dry-run"));

    let summary = run(config, options)?;
    print_summary(&summary, matches)
}

fn main() -> ExitCode {
    let matches = build_command().get_matches();
    if let Err(e) = init_logging(matches.get_count("verbose")) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    match execute(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
