//! CLI configuration and the mapping from arguments to a run [`Config`]

use lightning_probe::{BrowserKind, Config};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::commands::{Cli, ColorArg, RunArgs};
use crate::error::{CliError, CliResult};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Default output
    #[default]
    Normal,
    /// Debug logs
    Verbose,
    /// Trace logs
    Debug,
}

impl Verbosity {
    /// From `-q` and the number of `-v` flags
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Log filter for this level; `Normal` keeps the configured one
    #[must_use]
    pub fn log_level(self, configured: &str) -> String {
        match self {
            Self::Quiet => "error".to_string(),
            Self::Normal => configured.to_string(),
            Self::Verbose => "debug".to_string(),
            Self::Debug => "trace".to_string(),
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::colors_enabled(),
        }
    }
}

/// Output settings shared by every subcommand
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CliConfig {
    pub verbosity: Verbosity,
    pub color: ColorChoice,
}

impl CliConfig {
    /// Settings from the global flags
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            verbosity: Verbosity::from_flags(cli.quiet, cli.verbose),
            color: cli.color.into(),
        }
    }
}

/// Run configuration: environment first, then command-line overrides
pub fn run_config(base: Config, args: &RunArgs, verbosity: Verbosity) -> CliResult<Config> {
    let mut config = base;
    if let Some(browser) = &args.browser {
        config.browser = browser.parse::<BrowserKind>().map_err(|_| {
            CliError::invalid_argument(format!("--browser {browser}: only chromium is supported"))
        })?;
    }
    if args.headless {
        config.headless = true;
    }
    if let Some(url) = &args.base_url {
        if url.trim().is_empty() {
            return Err(CliError::invalid_argument("--base-url must not be empty"));
        }
        config.base_url = url.clone();
    }
    if let Some(ms) = args.step_timeout {
        if ms == 0 {
            return Err(CliError::invalid_argument("--step-timeout must be positive"));
        }
        config = config.with_test_timeout(Duration::from_millis(ms));
    }
    if let Some(root) = &args.root {
        config = config.with_root(root);
    }
    let level = verbosity.log_level(&config.log_level);
    Ok(config.with_log_level(level))
}
