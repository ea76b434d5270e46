//! Run configuration.
//!
//! Values start from defaults, are overlaid from a `.env` file when one is
//! present, and finally from the process environment, which always wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::result::{ProbeError, ProbeResult};
use crate::retry::RetryPolicy;

/// Browser engine requested for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Chromium over CDP
    Chromium,
}

impl std::str::FromStr for BrowserKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Self::Chromium),
            other => Err(ProbeError::Config {
                message: format!("unsupported browser '{other}' (only chromium is available)"),
            }),
        }
    }
}

/// Where the run reads and writes files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Log directory (`logs/`)
    pub logs_dir: PathBuf,
    /// Report directory (`reports/`)
    pub reports_dir: PathBuf,
    /// Failure screenshots (`reports/screenshots/`)
    pub screenshots_dir: PathBuf,
    /// Credentials and fixtures (`test-data/`)
    pub test_data_dir: PathBuf,
    /// Files handed between runs (`runtime/`)
    pub runtime_dir: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::rooted(Path::new("."))
    }
}

impl ArtifactPaths {
    /// Standard layout below `root`
    #[must_use]
    pub fn rooted(root: &Path) -> Self {
        let reports_dir = root.join("reports");
        Self {
            logs_dir: root.join("logs"),
            screenshots_dir: reports_dir.join("screenshots"),
            reports_dir,
            test_data_dir: root.join("test-data"),
            runtime_dir: root.join("runtime"),
        }
    }

    /// `logs/test.log`
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir.join("test.log")
    }

    /// `reports/report.json`
    #[must_use]
    pub fn report_file(&self) -> PathBuf {
        self.reports_dir.join("report.json")
    }

    /// `runtime/IXT.json`
    #[must_use]
    pub fn inquiry_file(&self) -> PathBuf {
        self.runtime_dir.join("IXT.json")
    }

    /// Create every output directory
    pub fn ensure_dirs(&self) -> ProbeResult<()> {
        for dir in [
            &self.logs_dir,
            &self.reports_dir,
            &self.screenshots_dir,
            &self.runtime_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Salesforce login URL
    pub base_url: String,
    /// Login user name
    pub username: String,
    /// Login password
    #[serde(skip_serializing)]
    pub password: String,
    /// Browser engine
    pub browser: BrowserKind,
    /// Run without a window
    pub headless: bool,
    /// Pause between typed keys
    pub slow_mo: Duration,
    /// Default action timeout
    pub timeout: Duration,
    /// Default navigation timeout
    pub navigation_timeout: Duration,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Budget for one step
    pub test_timeout: Duration,
    /// Budget for one field lookup
    pub field_timeout: Duration,
    /// Path to the chromium binary (None = auto-detect)
    pub chromium_path: Option<PathBuf>,
    /// Log filter directive
    pub log_level: String,
    /// Retry policy for page interactions
    pub retry: RetryPolicy,
    /// File layout
    pub paths: ArtifactPaths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://login.salesforce.com".to_string(),
            username: "admin".to_string(),
            password: "password".to_string(),
            browser: BrowserKind::Chromium,
            headless: false,
            slow_mo: Duration::from_millis(50),
            timeout: Duration::from_millis(30_000),
            navigation_timeout: Duration::from_millis(45_000),
            viewport_width: 1280,
            viewport_height: 720,
            test_timeout: Duration::from_millis(60_000),
            field_timeout: Duration::from_millis(crate::resolution::DEFAULT_FIELD_TIMEOUT_MS),
            chromium_path: None,
            log_level: "info".to_string(),
            retry: RetryPolicy::default(),
            paths: ArtifactPaths::default(),
        }
    }
}

fn parse_ms(key: &str, value: &str) -> ProbeResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ProbeError::Config {
            message: format!("{key}={value:?}: {e}"),
        })
}

fn parse_u32(key: &str, value: &str) -> ProbeResult<u32> {
    value.trim().parse::<u32>().map_err(|e| ProbeError::Config {
        message: format!("{key}={value:?}: {e}"),
    })
}

fn parse_bool(key: &str, value: &str) -> ProbeResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ProbeError::Config {
            message: format!("{key}={value:?}: expected a boolean"),
        }),
    }
}

/// Parse `KEY=value` lines; `#` comments and blank lines are skipped and
/// surrounding quotes removed.
#[must_use]
pub fn parse_env_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

impl Config {
    /// Defaults, then `./.env`, then the process environment
    pub fn from_env() -> ProbeResult<Self> {
        let file = match std::fs::read_to_string(".env") {
            Ok(contents) => {
                tracing::debug!("loaded overrides from .env");
                parse_env_file(&contents)
            }
            Err(_) => HashMap::new(),
        };
        Self::default().overlay(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// Apply overrides from a variable lookup
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> ProbeResult<Self> {
        if let Some(v) = lookup("BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("APP_USERNAME") {
            self.username = v;
        }
        if let Some(v) = lookup("APP_PASSWORD") {
            self.password = v;
        }
        if let Some(v) = lookup("BROWSER") {
            self.browser = v.parse()?;
        }
        if let Some(v) = lookup("HEADLESS") {
            self.headless = parse_bool("HEADLESS", &v)?;
        }
        if let Some(v) = lookup("SLOW_MO") {
            self.slow_mo = parse_ms("SLOW_MO", &v)?;
        }
        if let Some(v) = lookup("TIMEOUT") {
            self.timeout = parse_ms("TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("NAVIGATION_TIMEOUT") {
            self.navigation_timeout = parse_ms("NAVIGATION_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("VIEWPORT_WIDTH") {
            self.viewport_width = parse_u32("VIEWPORT_WIDTH", &v)?;
        }
        if let Some(v) = lookup("VIEWPORT_HEIGHT") {
            self.viewport_height = parse_u32("VIEWPORT_HEIGHT", &v)?;
        }
        if let Some(v) = lookup("TEST_TIMEOUT") {
            self.test_timeout = parse_ms("TEST_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("FIELD_TIMEOUT") {
            self.field_timeout = parse_ms("FIELD_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("CHROMIUM_PATH") {
            self.chromium_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(self)
    }

    /// Set the login URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set credentials
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the default action timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-step budget
    #[must_use]
    pub const fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    /// Set the per-field lookup budget
    #[must_use]
    pub const fn with_field_timeout(mut self, timeout: Duration) -> Self {
        self.field_timeout = timeout;
        self
    }

    /// Root every artifact directory at `root`
    #[must_use]
    pub fn with_root(mut self, root: &Path) -> Self {
        self.paths = ArtifactPaths::rooted(root);
        self
    }

    /// Set the log filter
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_defaults_match_suite_settings() {
            let config = Config::default();
            assert_eq!(config.slow_mo, Duration::from_millis(50));
            assert_eq!(config.timeout, Duration::from_secs(30));
            assert_eq!(config.navigation_timeout, Duration::from_secs(45));
            assert_eq!((config.viewport_width, config.viewport_height), (1280, 720));
            assert_eq!(config.test_timeout, Duration::from_secs(60));
            assert_eq!(config.browser, BrowserKind::Chromium);
        }

        #[test]
        fn test_overlay_from_variables() {
            let config = Config::default()
                .overlay(lookup(&[
                    ("BASE_URL", "https://acme.my.salesforce.com"),
                    ("APP_USERNAME", "qa@acme.com"),
                    ("SLOW_MO", "0"),
                    ("HEADLESS", "true"),
                    ("VIEWPORT_WIDTH", "1920"),
                ]))
                .unwrap();
            assert_eq!(config.base_url, "https://acme.my.salesforce.com");
            assert_eq!(config.username, "qa@acme.com");
            assert_eq!(config.slow_mo, Duration::ZERO);
            assert!(config.headless);
            assert_eq!(config.viewport_width, 1920);
        }

        #[test]
        fn test_bad_number_is_config_error() {
            let err = Config::default()
                .overlay(lookup(&[("TIMEOUT", "soon")]))
                .unwrap_err();
            assert!(matches!(err, ProbeError::Config { .. }));
            assert!(err.to_string().contains("TIMEOUT"));
        }

        #[test]
        fn test_unsupported_browser() {
            let err = Config::default()
                .overlay(lookup(&[("BROWSER", "firefox")]))
                .unwrap_err();
            assert!(err.to_string().contains("firefox"));
        }

        #[test]
        fn test_password_not_serialized() {
            let json = serde_json::to_string(&Config::default()).unwrap();
            assert!(!json.contains("\"password\""));
        }
    }

    mod env_file_tests {
        use super::*;

        #[test]
        fn test_parse_env_file() {
            let vars = parse_env_file(
                "# creds\nAPP_USERNAME=\"qa@acme.com\"\nexport SLOW_MO=100\n\nBROKEN\nTIMEOUT='5000'\n",
            );
            assert_eq!(vars["APP_USERNAME"], "qa@acme.com");
            assert_eq!(vars["SLOW_MO"], "100");
            assert_eq!(vars["TIMEOUT"], "5000");
            assert!(!vars.contains_key("BROKEN"));
        }
    }

    mod paths_tests {
        use super::*;

        #[test]
        fn test_rooted_layout() {
            let paths = ArtifactPaths::rooted(Path::new("/work"));
            assert_eq!(paths.log_file(), Path::new("/work/logs/test.log"));
            assert_eq!(paths.report_file(), Path::new("/work/reports/report.json"));
            assert_eq!(paths.inquiry_file(), Path::new("/work/runtime/IXT.json"));
            assert_eq!(paths.screenshots_dir, Path::new("/work/reports/screenshots"));
        }

        #[test]
        fn test_ensure_dirs() {
            let dir = tempfile::tempdir().unwrap();
            let paths = ArtifactPaths::rooted(dir.path());
            paths.ensure_dirs().unwrap();
            assert!(paths.screenshots_dir.is_dir());
            assert!(paths.runtime_dir.is_dir());
        }
    }
}
