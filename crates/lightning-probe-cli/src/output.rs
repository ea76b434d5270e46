//! Console output for scenario results

use console::{style, Style, Term};
use lightning_probe::{Report, ScenarioResult, ScenarioStatus};

/// Writes results to stderr, colored or plain
#[derive(Debug)]
pub struct ConsoleReporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ConsoleReporter {
    /// Reporter on stderr
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Status prefix for a line
    #[must_use]
    pub fn prefix(&self, status: ScenarioStatus) -> String {
        match (status, self.use_color) {
            (ScenarioStatus::Passed, true) => style("✓").green().bold().to_string(),
            (ScenarioStatus::Failed, true) => style("✗").red().bold().to_string(),
            (ScenarioStatus::Skipped, true) => style("-").yellow().to_string(),
            (ScenarioStatus::Passed, false) => "PASS".to_string(),
            (ScenarioStatus::Failed, false) => "FAIL".to_string(),
            (ScenarioStatus::Skipped, false) => "SKIP".to_string(),
        }
    }

    /// Lines describing one scenario
    #[must_use]
    pub fn render_result(&self, result: &ScenarioResult) -> Vec<String> {
        let mut lines = vec![format!(
            "{} {}: {} ({}ms)",
            self.prefix(result.status),
            result.feature,
            result.name,
            result.duration_ms
        )];
        if let Some(step) = &result.failed_step {
            lines.push(format!("    step: {step}"));
        }
        if let Some(error) = &result.error {
            lines.push(format!("    error: {error}"));
        }
        if let Some(path) = &result.screenshot {
            lines.push(format!("    screenshot: {}", path.display()));
        }
        lines
    }

    /// Final summary line
    #[must_use]
    pub fn render_summary(&self, report: &Report) -> String {
        let failed = report.failed_count();
        let line = format!(
            "{} {} scenarios in {:.2}s ({} passed, {} failed, {} skipped)",
            if failed > 0 { "FAILED" } else { "PASSED" },
            report.total_count(),
            report.total_duration().as_secs_f64(),
            report.passed_count(),
            failed,
            report.skipped_count()
        );
        if !self.use_color {
            return line;
        }
        let status_style = if failed > 0 {
            Style::new().red().bold()
        } else {
            Style::new().green().bold()
        };
        status_style.apply_to(line).to_string()
    }

    /// Print an info line
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(message);
    }

    /// Print every result and the summary. Failures print even when quiet.
    pub fn report(&self, report: &Report) {
        for result in &report.results {
            if self.quiet && !result.status.is_failed() {
                continue;
            }
            for line in self.render_result(result) {
                let _ = self.term.write_line(&line);
            }
        }
        if self.quiet && report.all_passed() {
            return;
        }
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&self.render_summary(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn failed() -> ScenarioResult {
        ScenarioResult::failed(
            "Mailbox",
            "email status",
            Duration::from_millis(1200),
            "Then I verify the \"Email Status\" field that should contain \"Sent\" under the Emails section",
            "Assertion failed: Email Status is 'Draft', expected it to contain 'Sent'",
        )
        .with_screenshot(Some(PathBuf::from("reports/screenshots/email_status.png")))
    }

    #[test]
    fn test_plain_prefixes() {
        let reporter = ConsoleReporter::new(false, false);
        assert_eq!(reporter.prefix(ScenarioStatus::Passed), "PASS");
        assert_eq!(reporter.prefix(ScenarioStatus::Failed), "FAIL");
        assert_eq!(reporter.prefix(ScenarioStatus::Skipped), "SKIP");
    }

    #[test]
    fn test_failure_lines() {
        let lines = ConsoleReporter::new(false, false).render_result(&failed());
        assert_eq!(lines[0], "FAIL Mailbox: email status (1200ms)");
        assert!(lines[1].contains("step: Then I verify"));
        assert!(lines[2].contains("Draft"));
        assert!(lines[3].ends_with("email_status.png"));
    }

    #[test]
    fn test_plain_summary() {
        let mut report = Report::new();
        report.record(ScenarioResult::passed("Login", "valid login", Duration::from_millis(500)));
        report.record(failed());
        let summary = ConsoleReporter::new(false, false).render_summary(&report);
        assert_eq!(summary, "FAILED 2 scenarios in 1.70s (1 passed, 1 failed, 0 skipped)");
    }
}
