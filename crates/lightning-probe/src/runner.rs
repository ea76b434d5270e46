//! Scenario runner
//!
//! Runs parsed features against a [`StepRegistry`] with the same hooks for
//! every run:
//!
//! ```text
//! before_all   create artifact dirs, truncate logs/test.log
//! before       open (or reuse) the browser session, reset default timeout
//! steps        background then scenario steps, stop at the first failure
//! after        on failure: screenshot + error log, then carry on
//! after_all    close the browser, write reports/report.json
//! ```
//!
//! Scenarios run one at a time on a single shared session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::feature::{Feature, Scenario, Step, TagExpr};
use crate::logging::reset_log_file;
use crate::report::{Report, ScenarioResult};
use crate::result::{ProbeError, ProbeResult};
use crate::session::BrowserLauncher;
use crate::steps::{StepRegistry, World};

/// What to do with the remaining scenarios after one fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Run every selected scenario
    #[default]
    CollectAll,
    /// Skip everything after the first failed scenario
    FailFast,
}

/// Label recorded as the failed step when setup fails
pub const BEFORE_HOOK: &str = "Before hook";

/// Runs scenarios one after another on a shared session
#[derive(Debug)]
pub struct ScenarioRunner {
    registry: StepRegistry,
    launcher: Arc<dyn BrowserLauncher>,
    world: World,
    filter: Option<TagExpr>,
    failure_mode: FailureMode,
}

impl ScenarioRunner {
    /// Runner for `config` driving browsers from `launcher`
    #[must_use]
    pub fn new(config: Config, registry: StepRegistry, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            registry,
            launcher,
            world: World::new(config),
            filter: None,
            failure_mode: FailureMode::default(),
        }
    }

    /// Only run scenarios matching `filter`
    #[must_use]
    pub fn with_filter(mut self, filter: Option<TagExpr>) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub const fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Run configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        self.world.config()
    }

    /// Shared scenario state
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Create the artifact directories and start a fresh run log
    pub fn before_all(&self) -> ProbeResult<()> {
        let paths = &self.config().paths;
        paths.ensure_dirs()?;
        reset_log_file(&paths.log_file())?;
        tracing::info!(base_url = %self.config().base_url, "test run starting");
        Ok(())
    }

    /// Open or reuse the session and clear per-scenario state
    pub async fn before(&mut self) -> ProbeResult<()> {
        self.world.session.open(self.launcher.as_ref()).await?;
        let timeout = self.config().timeout;
        self.world.session.page()?.set_default_timeout(timeout).await?;
        self.world.reset_scenario();
        Ok(())
    }

    /// Failure bookkeeping for a scenario: screenshot and error log.
    /// Never fails; the run continues with the next scenario.
    pub async fn after(&self, scenario: &Scenario, error: &ProbeError) -> Option<PathBuf> {
        tracing::error!(scenario = %scenario.name, error = %error, "scenario failed");
        let page = self.world.session.page().ok()?;
        page.screenshot_best_effort(&scenario.name).await
    }

    /// Close the browser
    pub async fn after_all(&mut self) {
        if let Err(err) = self.world.session.close().await {
            tracing::warn!(error = %err, "closing browser failed");
        }
        tracing::info!("test run finished");
    }

    async fn run_step(&mut self, step: &Step) -> ProbeResult<()> {
        let budget = self.config().test_timeout;
        let started = Instant::now();
        let outcome =
            tokio::time::timeout(budget, self.registry.run(&mut self.world, &step.text)).await;
        let result = outcome.unwrap_or_else(|_| {
            Err(ProbeError::Timeout {
                what: format!("step '{step}'"),
                ms: budget.as_millis() as u64,
            })
        });
        tracing::debug!(
            step = %step,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "step finished"
        );
        result
    }

    /// Run one scenario, background steps first
    pub async fn run_scenario(&mut self, feature: &Feature, scenario: &Scenario) -> ScenarioResult {
        let started = Instant::now();
        tracing::info!(feature = %feature.name, scenario = %scenario.name, "scenario started");

        if let Err(err) = self.before().await {
            let screenshot = self.after(scenario, &err).await;
            return ScenarioResult::failed(
                &feature.name,
                &scenario.name,
                started.elapsed(),
                BEFORE_HOOK,
                err.to_string(),
            )
            .with_screenshot(screenshot);
        }

        for step in feature.background.iter().chain(&scenario.steps) {
            if let Err(err) = self.run_step(step).await {
                tracing::error!(step = %step, line = step.line, error = %err, "step failed");
                let screenshot = self.after(scenario, &err).await;
                return ScenarioResult::failed(
                    &feature.name,
                    &scenario.name,
                    started.elapsed(),
                    step.to_string(),
                    err.to_string(),
                )
                .with_screenshot(screenshot);
            }
        }

        let duration = started.elapsed();
        tracing::info!(
            scenario = %scenario.name,
            duration_ms = duration.as_millis() as u64,
            "scenario passed"
        );
        ScenarioResult::passed(&feature.name, &scenario.name, duration)
    }

    /// Run every selected scenario of `features` and write the report
    pub async fn run(&mut self, features: &[Feature]) -> ProbeResult<Report> {
        self.before_all()?;
        let mut report = Report::new();
        let mut stopped = false;
        let filter = self.filter.clone();

        for feature in features {
            for scenario in feature.selected(filter.as_ref()) {
                if stopped {
                    report.record(ScenarioResult::skipped(&feature.name, &scenario.name));
                    continue;
                }
                let result = self.run_scenario(feature, scenario).await;
                stopped = result.status.is_failed() && self.failure_mode == FailureMode::FailFast;
                report.record(result);
            }
        }

        self.after_all().await;
        report.finish();
        report.write(&self.config().paths.report_file())?;
        tracing::info!(summary = %report.summary(), "run complete");
        Ok(report)
    }
}
