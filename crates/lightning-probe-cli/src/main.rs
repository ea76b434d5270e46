//! lprobe: run Salesforce Lightning feature files
//!
//! ## Usage
//!
//! ```bash
//! lprobe run                               # every scenario under features/
//! lprobe run --tags "@smoke and not @wip"  # filter by tag expression
//! lprobe run -f features/login.feature --headless
//! lprobe list --json                       # what a run would execute
//! lprobe config                            # effective configuration
//! ```

use clap::Parser;
use lightning_probe::{ChromiumLauncher, Config};
use lightning_probe_cli::handlers::{list_scenarios, run_scenarios, show_config};
use lightning_probe_cli::{Cli, CliConfig, CliResult, Commands};
use std::process::ExitCode;
use std::sync::Arc;

/// Exit code when scenarios ran and at least one failed
const SCENARIOS_FAILED: u8 = 1;
/// Exit code for configuration, parse and I/O errors
const USAGE_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(SCENARIOS_FAILED),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(USAGE_ERROR)
        }
    }
}

async fn run() -> CliResult<bool> {
    let cli = Cli::parse();
    let config = CliConfig::from_cli(&cli);
    let base = Config::from_env()?;

    match cli.command {
        Commands::Run(args) => {
            run_scenarios(config, &args, base, Arc::new(ChromiumLauncher::new())).await
        }
        Commands::List(args) => list_scenarios(config, &args).map(|()| true),
        Commands::Config(args) => show_config(&base, &args).map(|()| true),
    }
}
