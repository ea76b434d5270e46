//! lprobe: command-line runner for lightning-probe
//!
//! Reads Gherkin feature files, runs the selected scenarios against a
//! Salesforce org with the built-in step definitions and writes
//! `reports/report.json`.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, ListArgs, RunArgs, SelectionArgs};
pub use config::{run_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ConsoleReporter;
