//! Tracing setup: stderr plus an append-only run log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::Config;
use crate::result::ProbeResult;

/// Subscriber options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info")
    pub level: String,
    /// Plain-text log file, appended to
    pub file: Option<PathBuf>,
    /// Emit JSON lines on stderr
    pub json: bool,
    /// Colored stderr output
    pub ansi: bool,
}

impl LogOptions {
    /// Options for a run: configured level, `logs/test.log`
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            level: config.log_level.clone(),
            file: Some(config.paths.log_file()),
            json: false,
            ansi: true,
        }
    }

    /// Emit JSON on stderr
    #[must_use]
    pub const fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Toggle color
    #[must_use]
    pub const fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn open_append(path: &Path) -> ProbeResult<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init(options: &LogOptions) -> ProbeResult<bool> {
    let file_layer = match &options.file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(open_append(path)?)),
        ),
        None => None,
    };
    let stderr_layer = if options.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(options.ansi)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(filter(&options.level))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();
    Ok(installed)
}

/// Empty the run log and write a start banner
pub fn reset_log_file(path: &Path) -> ProbeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    writeln!(
        file,
        "Test execution started at {}",
        chrono::Utc::now().to_rfc3339()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_log_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("test.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "old run\n").unwrap();

        reset_log_file(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("old run"));
        assert!(contents.starts_with("Test execution started at "));
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::default().with_log_level("debug");
        let options = LogOptions::from_config(&config).with_json(true);
        assert_eq!(options.level, "debug");
        assert!(options.json);
        assert!(options.file.unwrap().ends_with("logs/test.log"));
    }

    #[test]
    fn test_filter_falls_back_on_bad_directive() {
        // Invalid directives must not panic
        let _ = filter("[[[");
    }
}
