//! Run report
//!
//! One [`ScenarioResult`] per selected scenario, written as JSON to
//! `reports/report.json` at the end of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::result::ProbeResult;

/// Scenario outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    /// Every step passed
    Passed,
    /// A step, or the setup before it, failed
    Failed,
    /// Not run because an earlier scenario stopped the run
    Skipped,
}

impl ScenarioStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Result of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Feature name
    pub feature: String,
    /// Scenario name
    pub name: String,
    pub status: ScenarioStatus,
    /// Wall time including setup
    pub duration_ms: u64,
    /// Text of the step that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure screenshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl ScenarioResult {
    /// Create a passing result
    #[must_use]
    pub fn passed(feature: impl Into<String>, name: impl Into<String>, duration: Duration) -> Self {
        Self {
            feature: feature.into(),
            name: name.into(),
            status: ScenarioStatus::Passed,
            duration_ms: duration.as_millis() as u64,
            failed_step: None,
            error: None,
            screenshot: None,
        }
    }

    /// Create a failing result
    #[must_use]
    pub fn failed(
        feature: impl Into<String>,
        name: impl Into<String>,
        duration: Duration,
        step: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            feature: feature.into(),
            name: name.into(),
            status: ScenarioStatus::Failed,
            duration_ms: duration.as_millis() as u64,
            failed_step: Some(step.into()),
            error: Some(error.into()),
            screenshot: None,
        }
    }

    /// Create a skipped result
    #[must_use]
    pub fn skipped(feature: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            name: name.into(),
            status: ScenarioStatus::Skipped,
            duration_ms: 0,
            failed_step: None,
            error: None,
            screenshot: None,
        }
    }

    /// Attach the failure screenshot
    #[must_use]
    pub fn with_screenshot(mut self, path: Option<PathBuf>) -> Self {
        self.screenshot = path;
        self
    }
}

/// Results of a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub results: Vec<ScenarioResult>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    /// Empty report stamped with a fresh run id
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            results: Vec::new(),
        }
    }

    /// Add a scenario result
    pub fn record(&mut self, result: ScenarioResult) {
        self.results.push(result);
    }

    /// Stamp the end time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(ScenarioStatus::Passed)
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(ScenarioStatus::Failed)
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(ScenarioStatus::Skipped)
    }

    fn count(&self, status: ScenarioStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    /// True when nothing failed. Skipped scenarios do not count as failures.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Failed results only
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioResult> {
        self.results
            .iter()
            .filter(|r| r.status.is_failed())
            .collect()
    }

    /// Sum of scenario durations
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.results.iter().map(|r| r.duration_ms).sum())
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} scenarios ({} passed, {} failed, {} skipped) in {:.1}s",
            self.total_count(),
            self.passed_count(),
            self.failed_count(),
            self.skipped_count(),
            self.total_duration().as_secs_f64()
        )
    }

    /// Pretty JSON
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report, creating parent directories
    pub fn write(&self, path: &Path) -> ProbeResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), run_id = %self.run_id, "report written");
        Ok(())
    }

    /// Read a report written by [`write`](Self::write)
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        let mut report = Report::new();
        report.record(ScenarioResult::passed("Login", "valid login", Duration::from_millis(1500)));
        report.record(
            ScenarioResult::failed(
                "Web form",
                "submit inquiry",
                Duration::from_millis(2500),
                "Then The form should be successfully submitted",
                "Assertion failed: No IXT number found in the message: Thanks",
            )
            .with_screenshot(Some(PathBuf::from("reports/screenshots/submit_inquiry.png"))),
        );
        report.record(ScenarioResult::skipped("Mailbox", "email status"));
        report
    }

    mod count_tests {
        use super::*;

        #[test]
        fn test_counts() {
            let report = sample();
            assert_eq!(report.total_count(), 3);
            assert_eq!(report.passed_count(), 1);
            assert_eq!(report.failed_count(), 1);
            assert_eq!(report.skipped_count(), 1);
            assert!(!report.all_passed());
            assert_eq!(report.failures()[0].name, "submit inquiry");
        }

        #[test]
        fn test_skipped_only_is_not_a_failure() {
            let mut report = Report::new();
            report.record(ScenarioResult::skipped("Mailbox", "email status"));
            assert!(report.all_passed());
        }

        #[test]
        fn test_summary_line() {
            assert_eq!(
                sample().summary(),
                "3 scenarios (1 passed, 1 failed, 1 skipped) in 4.0s"
            );
        }
    }

    mod json_tests {
        use super::*;

        #[test]
        fn test_status_is_lowercase_and_empty_fields_omitted() {
            let json: serde_json::Value =
                serde_json::from_str(&sample().to_json().unwrap()).unwrap();
            let results = json["results"].as_array().unwrap();
            assert_eq!(results[0]["status"], "passed");
            assert!(results[0].get("error").is_none());
            assert_eq!(results[1]["status"], "failed");
            assert_eq!(
                results[1]["failed_step"],
                "Then The form should be successfully submitted"
            );
            assert_eq!(results[1]["screenshot"], "reports/screenshots/submit_inquiry.png");
        }

        #[test]
        fn test_write_and_load() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("reports").join("report.json");
            let mut report = sample();
            report.finish();
            report.write(&path).unwrap();

            let loaded = Report::load(&path).unwrap();
            assert_eq!(loaded.run_id, report.run_id);
            assert_eq!(loaded.results, report.results);
            assert!(loaded.finished_at.is_some());
        }
    }
}
