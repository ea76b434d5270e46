//! lightning-probe: resilient UI test automation for Salesforce Lightning
//!
//! Lightning renders record fields inside nested frames and shadow-heavy
//! markup whose selectors drift between releases. lightning-probe drives the
//! UI through page objects that locate fields by their visible label instead
//! of fixed selectors, and retries the flaky parts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    lightning-probe                                │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────┐   │
//! │  │ .feature │──►│ Scenario │──►│ Step         │──►│ Page     │   │
//! │  │ files    │   │ Runner   │   │ Registry     │   │ Objects  │   │
//! │  └──────────┘   └──────────┘   └──────────────┘   └────┬─────┘   │
//! │                                                        │         │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌────▼─────┐   │
//! │  │ Chromium │◄──│ Page     │◄──│ Locator      │◄──│ Field    │   │
//! │  │ (CDP)    │   │ Driver   │   │ Resolution   │   │ Reader   │   │
//! │  └──────────┘   └──────────┘   └──────────────┘   └──────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lightning_probe::{Config, FieldValueReader, MockPage, PageHandle};
//! use std::sync::Arc;
//!
//! # async fn demo() -> lightning_probe::ProbeResult<()> {
//! let config = Config::default();
//! let page = PageHandle::configured(Arc::new(MockPage::new()), &config);
//! let reader = FieldValueReader::new(page);
//! let status = reader.field_value("Status", config.field_timeout).await?;
//! println!("Status: {status}");
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod browser;
mod driver;
mod page;
mod result;

/// Retry executor and bounded pollers
pub mod retry;

/// Selectors understood by every driver
pub mod selector;

/// DOM snapshots taken from each frame
pub mod dom;

/// Label normalization and matching
pub mod label;

/// Four-tier field locator resolution
pub mod resolution;

/// Field values read through resolution
pub mod field_reader;

/// Page object trait and the per-session cache
pub mod page_object;

/// Browser session for a run
pub mod session;

/// Run configuration
pub mod config;

/// Tracing subscriber setup
pub mod logging;

/// Salesforce page objects
pub mod pages;

/// Flows across several pages
pub mod flows;

/// Test data fixtures and the inquiry hand-off file
pub mod test_data;

/// Gherkin feature files and tag filters
pub mod feature;

/// Step definitions and the scenario world
pub mod steps;

/// Sequential scenario runner
pub mod runner;

/// Run report
pub mod report;

pub use browser::{ChromiumLauncher, SNAPSHOT_SCRIPT};
#[cfg(feature = "browser")]
pub use browser::{ChromiumBrowser, ChromiumPage};
pub use config::{ArtifactPaths, BrowserKind, Config};
pub use driver::{MockElement, MockPage, PageDriver};
pub use feature::{Feature, Scenario, Step, StepKeyword, TagExpr};
pub use field_reader::{FieldValueReader, FieldValues};
pub use page::{FieldInput, PageHandle};
pub use page_object::{PageObject, PageObjectCache, UrlMatcher};
pub use report::{Report, ScenarioResult, ScenarioStatus};
pub use resolution::{Resolution, Resolver};
pub use result::{ProbeError, ProbeResult};
pub use retry::{execute_with_retry, poll_until, RetryPolicy};
pub use runner::{FailureMode, ScenarioRunner};
pub use selector::Selector;
pub use session::{BrowserHandle, BrowserLauncher, MockLauncher, Session};
pub use steps::{StepRegistry, World};
pub use test_data::TestDataReader;
