//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// lprobe: run Salesforce Lightning feature files
#[derive(Parser, Debug)]
#[command(name = "lprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios from feature files
    Run(RunArgs),

    /// List the scenarios a run would execute
    List(ListArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Feature selection shared by `run` and `list`
#[derive(clap::Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Feature files or directories searched for `*.feature`
    #[arg(short, long = "feature", default_value = "features")]
    pub features: Vec<PathBuf>,

    /// Tag expression, e.g. "@smoke and not @wip"
    #[arg(short, long)]
    pub tags: Option<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Browser engine; only chromium is supported
    #[arg(long)]
    pub browser: Option<String>,

    /// Run without a browser window
    #[arg(long)]
    pub headless: bool,

    /// Salesforce login URL (overrides BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Per-step budget in milliseconds (overrides TEST_TIMEOUT)
    #[arg(long)]
    pub step_timeout: Option<u64>,

    /// Stop after the first failed scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Directory holding logs/, reports/, runtime/ and test-data/
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Log JSON lines on stderr
    #[arg(long)]
    pub json_logs: bool,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}
