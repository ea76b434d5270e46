//! Page primitives shared by every page object.
//!
//! [`PageHandle`] is a cheap, cloneable reference to the active tab. Actions
//! that can race with rendering (`fill`, `type_text`, `click`) run through the
//! retry executor; reads and waits poll against a deadline.

use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ArtifactPaths, Config};
use crate::driver::PageDriver;
use crate::page_object::{PageObject, UrlMatcher};
use crate::resolution::{Resolution, Resolver};
use crate::result::{ProbeError, ProbeResult};
use crate::retry::{
    execute_with_retry_if, poll_until, RetryError, RetryPolicy, DEFAULT_POLL_INTERVAL_MS,
};
use crate::selector::Selector;

/// Default pause between typed keys (200ms)
pub const DEFAULT_TYPE_DELAY_MS: u64 = 200;

/// Default budget for element waits (30s)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Value written into a form field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    /// Plain text
    Text(String),
    /// Number
    Number(f64),
    /// Calendar date
    Date(NaiveDate),
}

impl From<&str> for FieldInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<NaiveDate> for FieldInput {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<i64> for FieldInput {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

/// Render a field input the way Lightning inputs expect it.
/// Dates are `YYYY-MM-DD`; whole numbers have no fraction.
#[must_use]
pub fn format_value(input: &FieldInput) -> String {
    match input {
        FieldInput::Text(s) => s.clone(),
        FieldInput::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
        FieldInput::Number(n) => n.to_string(),
        FieldInput::Date(d) => d.format("%Y-%m-%d").to_string(),
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `_`
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn exhausted(err: RetryError<ProbeError>) -> ProbeError {
    let attempts = err.attempts;
    ProbeError::RetriesExhausted {
        attempts,
        source: Box::new(err.into_last()),
    }
}

/// Handle on the active browser tab
#[derive(Clone)]
pub struct PageHandle {
    driver: Arc<dyn PageDriver>,
    retry: RetryPolicy,
    resolver: Arc<Resolver>,
    paths: ArtifactPaths,
    type_delay: Duration,
    wait_timeout: Duration,
    field_timeout: Duration,
}

impl fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("driver", &self.driver)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl PageHandle {
    /// Wrap a driver with default settings
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self {
            driver,
            retry: RetryPolicy::default(),
            resolver: Arc::new(Resolver::new()),
            paths: ArtifactPaths::default(),
            type_delay: Duration::from_millis(DEFAULT_TYPE_DELAY_MS),
            wait_timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            field_timeout: Duration::from_millis(crate::resolution::DEFAULT_FIELD_TIMEOUT_MS),
        }
    }

    /// Wrap a driver with a run's settings
    #[must_use]
    pub fn configured(driver: Arc<dyn PageDriver>, config: &Config) -> Self {
        Self::new(driver)
            .with_retry(config.retry)
            .with_paths(config.paths.clone())
            .with_field_timeout(config.field_timeout)
            .with_wait_timeout(config.timeout)
    }

    /// Set the retry policy for actions
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the field resolver
    #[must_use]
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Set artifact paths
    #[must_use]
    pub fn with_paths(mut self, paths: ArtifactPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Set the pause between typed keys
    #[must_use]
    pub const fn with_type_delay(mut self, delay: Duration) -> Self {
        self.type_delay = delay;
        self
    }

    /// Set the budget for waits that take no explicit timeout
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the default field lookup budget
    #[must_use]
    pub const fn with_field_timeout(mut self, timeout: Duration) -> Self {
        self.field_timeout = timeout;
        self
    }

    /// Same settings, different tab
    #[must_use]
    pub fn rebind(&self, driver: Arc<dyn PageDriver>) -> Self {
        Self {
            driver,
            ..self.clone()
        }
    }

    /// Underlying driver
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    /// Artifact paths
    #[must_use]
    pub const fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Budget for waits that take no explicit timeout
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Default field lookup budget
    #[must_use]
    pub const fn field_timeout(&self) -> Duration {
        self.field_timeout
    }

    /// Whether both handles drive the same tab
    #[must_use]
    pub fn same_page(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.driver).cast::<()>(),
            Arc::as_ptr(&other.driver).cast::<()>(),
        )
    }

    fn should_retry(&self, err: &ProbeError) -> bool {
        !self.retry.transient_only || err.is_transient()
    }

    /// Navigate to a URL
    pub async fn navigate(&self, url: &str) -> ProbeResult<()> {
        match self.driver.goto(url).await {
            Ok(()) => {
                tracing::info!(url, "navigated");
                Ok(())
            }
            Err(err) => {
                tracing::error!(url, error = %err, "navigation failed");
                Err(err)
            }
        }
    }

    /// Current URL
    pub async fn url(&self) -> ProbeResult<String> {
        self.driver.current_url().await
    }

    /// Replace an input's value, retrying on failure
    pub async fn fill(&self, selector: &Selector, value: impl Into<FieldInput>) -> ProbeResult<()> {
        let text = format_value(&value.into());
        execute_with_retry_if(
            &self.retry,
            || self.driver.fill(selector, &text),
            |e| self.should_retry(e),
        )
        .await
        .map_err(exhausted)?;
        tracing::info!(%selector, "filled field");
        Ok(())
    }

    /// Type text key by key, retrying on failure
    pub async fn type_text(
        &self,
        selector: &Selector,
        value: impl Into<FieldInput>,
    ) -> ProbeResult<()> {
        let text = format_value(&value.into());
        execute_with_retry_if(
            &self.retry,
            || self.driver.type_text(selector, &text, self.type_delay),
            |e| self.should_retry(e),
        )
        .await
        .map_err(exhausted)?;
        tracing::info!(%selector, "typed text");
        Ok(())
    }

    /// Click, retrying on failure
    pub async fn click(&self, selector: &Selector) -> ProbeResult<()> {
        execute_with_retry_if(
            &self.retry,
            || self.driver.click(selector),
            |e| self.should_retry(e),
        )
        .await
        .map_err(exhausted)?;
        tracing::info!(%selector, "clicked");
        Ok(())
    }

    /// Press a key on the focused element
    pub async fn press_key(&self, key: &str) -> ProbeResult<()> {
        self.driver.press_key(key).await?;
        tracing::debug!(key, "pressed key");
        Ok(())
    }

    /// Whether the element is visible now
    pub async fn is_visible(&self, selector: &Selector) -> ProbeResult<bool> {
        self.driver.is_visible(selector).await
    }

    /// Number of matches
    pub async fn count(&self, selector: &Selector) -> ProbeResult<usize> {
        self.driver.count(selector).await
    }

    /// Trimmed inner text of the first visible match
    pub async fn text(&self, selector: &Selector) -> ProbeResult<String> {
        self.driver
            .inner_text(selector)
            .await?
            .map(|t| t.trim().to_string())
            .ok_or_else(|| ProbeError::ElementError {
                selector: selector.to_string(),
                message: "no visible element with text".to_string(),
            })
    }

    /// Wait until the element is visible
    pub async fn wait_for_visible(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> ProbeResult<()> {
        self.wait_for_state(selector, timeout, true).await
    }

    /// Wait until no match is visible
    pub async fn wait_for_hidden(&self, selector: &Selector, timeout: Duration) -> ProbeResult<()> {
        self.wait_for_state(selector, timeout, false).await
    }

    async fn wait_for_state(
        &self,
        selector: &Selector,
        timeout: Duration,
        visible: bool,
    ) -> ProbeResult<()> {
        let driver = &self.driver;
        poll_until(timeout, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS), || async move {
            match driver.is_visible(selector).await {
                Ok(v) if v == visible => Some(()),
                _ => None,
            }
        })
        .await
        .map_err(|_| {
            let state = if visible { "visible" } else { "hidden" };
            tracing::error!(%selector, state, "element wait timed out");
            ProbeError::Timeout {
                what: format!("{selector} to be {state}"),
                ms: timeout.as_millis() as u64,
            }
        })
    }

    /// Wait until the URL matches `pattern`
    pub async fn wait_for_url(&self, pattern: &Regex, timeout: Duration) -> ProbeResult<String> {
        let driver = &self.driver;
        poll_until(timeout, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS), || async move {
            driver
                .current_url()
                .await
                .ok()
                .filter(|url| pattern.is_match(url))
        })
        .await
        .map_err(|_| ProbeError::Timeout {
            what: format!("URL matching {pattern}"),
            ms: timeout.as_millis() as u64,
        })
    }

    /// Whether the live URL matches the page object's URL pattern
    pub async fn is_on<P: PageObject>(&self, object: &P) -> ProbeResult<bool> {
        let url = self.driver.current_url().await?;
        Ok(UrlMatcher::new(object.url_pattern()).matches(&url))
    }

    /// Wait until the live URL matches the page object's URL pattern,
    /// within its load timeout
    pub async fn wait_for_page<P: PageObject>(&self, object: &P) -> ProbeResult<String> {
        let matcher = UrlMatcher::new(object.url_pattern());
        let timeout = Duration::from_millis(object.load_timeout_ms());
        let driver = &self.driver;
        let matcher = &matcher;
        let interval = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);
        let url = poll_until(timeout, interval, || async move {
            driver
                .current_url()
                .await
                .ok()
                .filter(|url| matcher.matches(url))
        })
        .await
        .map_err(|_| {
            tracing::error!(
                page = object.page_name(),
                pattern = matcher.pattern(),
                "page did not load"
            );
            ProbeError::Timeout {
                what: format!("{} at {}", object.page_name(), matcher.pattern()),
                ms: timeout.as_millis() as u64,
            }
        })?;
        tracing::debug!(page = object.page_name(), url = %url, "page loaded");
        Ok(url)
    }

    /// First selector of an ordered list that becomes visible.
    /// Each poll checks the whole list in order.
    pub async fn first_visible(
        &self,
        candidates: &[Selector],
        timeout: Duration,
    ) -> ProbeResult<Selector> {
        let driver = &self.driver;
        poll_until(timeout, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS), || async move {
            for candidate in candidates {
                if driver.is_visible(candidate).await.unwrap_or(false) {
                    return Some(candidate.clone());
                }
            }
            None
        })
        .await
        .map_err(|_| ProbeError::Timeout {
            what: format!("any of {} candidate selector(s)", candidates.len()),
            ms: timeout.as_millis() as u64,
        })
    }

    /// Fixed pause for UI settling
    pub async fn settle(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
        tracing::debug!(ms = duration.as_millis() as u64, "waited");
    }

    /// Resolve a labeled field's displayed value
    pub async fn resolve_field(&self, label: &str, timeout: Duration) -> ProbeResult<Resolution> {
        self.resolver.resolve(self.driver.as_ref(), label, timeout).await
    }

    /// Navigate back
    pub async fn go_back(&self) -> ProbeResult<()> {
        self.driver.go_back().await
    }

    /// Default driver timeout
    pub async fn set_default_timeout(&self, timeout: Duration) -> ProbeResult<()> {
        self.driver.set_default_timeout(timeout).await
    }

    /// Click something that opens a new tab; returns a handle on that tab
    pub async fn click_opening_page(&self, selector: &Selector) -> ProbeResult<Self> {
        let driver = self.driver.click_opening_page(selector).await?;
        tracing::info!(%selector, "new page opened");
        Ok(self.rebind(driver))
    }

    /// Save a PNG screenshot as `reports/screenshots/{sanitized name}.png`
    pub async fn screenshot(&self, name: &str) -> ProbeResult<PathBuf> {
        let bytes = self.driver.screenshot().await?;
        std::fs::create_dir_all(&self.paths.screenshots_dir)?;
        let path = self
            .paths
            .screenshots_dir
            .join(format!("{}.png", sanitize_file_name(name)));
        std::fs::write(&path, bytes).map_err(|e| ProbeError::ScreenshotError {
            message: format!("{}: {e}", path.display()),
        })?;
        tracing::info!(path = %path.display(), "screenshot saved");
        Ok(path)
    }

    /// Like [`screenshot`](Self::screenshot) but logs failures instead of
    /// returning them
    pub async fn screenshot_best_effort(&self, name: &str) -> Option<PathBuf> {
        match self.screenshot(name).await {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::error!(name, error = %err, "failed to take screenshot");
                None
            }
        }
    }
}
