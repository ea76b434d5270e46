//! Result and error types for lightning-probe.

use std::time::Duration;
use thiserror::Error;

use crate::resolution::FrameDiagnostics;

/// Result type for lightning-probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving the UI
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Browser executable not found
    #[error("Browser not found. Install Chromium or set CHROMIUM_PATH")]
    BrowserNotFound,

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Timed out after {ms}ms waiting for {what}")]
    Timeout {
        /// What was being waited on
        what: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Element could not be found or acted on
    #[error("Element {selector} not actionable: {message}")]
    ElementError {
        /// Selector description
        selector: String,
        /// Error message
        message: String,
    },

    /// Every locator tier failed in every frame within the budget
    #[error(
        "Field \"{label}\" not found after {}ms ({})",
        .elapsed.as_millis(),
        summarize(.diagnostics)
    )]
    FieldNotFound {
        /// Label that was searched for
        label: String,
        /// Time spent searching
        elapsed: Duration,
        /// Per-frame container counts from the final poll
        diagnostics: Vec<FrameDiagnostics>,
    },

    /// Hard precondition failure, never retried
    #[error("Precondition failed: {message}")]
    Precondition {
        /// Error message
        message: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    ScreenshotError {
        /// Error message
        message: String,
    },

    /// Session used before `open` or after `close`
    #[error("Session is not open: {message}")]
    SessionNotOpen {
        /// Error message
        message: String,
    },

    /// Retry executor gave up
    #[error("Gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Last underlying failure
        #[source]
        source: Box<ProbeError>,
    },

    /// Test data or runtime file problem
    #[error("Test data error: {message}")]
    TestData {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Feature file could not be parsed
    #[error("Feature parse error at line {line}: {message}")]
    FeatureParse {
        /// 1-based line number
        line: usize,
        /// Error message
        message: String,
    },

    /// No step definition matches the step text
    #[error("Undefined step: {text}")]
    UndefinedStep {
        /// Step text
        text: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbeError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::PageError {
            message: message.into(),
        }
    }

    /// Create a precondition error
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Create an assertion error
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a test data error
    #[must_use]
    pub fn test_data(message: impl Into<String>) -> Self {
        Self::TestData {
            message: message.into(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Only consulted by retry policies built with
    /// [`RetryPolicy::transient_only`](crate::RetryPolicy::transient_only).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::PageError { .. }
            | Self::NavigationError { .. }
            | Self::Timeout { .. }
            | Self::ElementError { .. }
            | Self::ScreenshotError { .. }
            | Self::Io(_) => true,
            Self::RetriesExhausted { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

fn summarize(diagnostics: &[FrameDiagnostics]) -> String {
    if diagnostics.is_empty() {
        return "no frames attached".to_string();
    }
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
