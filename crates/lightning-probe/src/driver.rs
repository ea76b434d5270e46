//! PageDriver - the browser seam
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PageDriver (async trait, one browser tab)                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────┐   ┌─────────────────────────┐  │
//! │  │  ChromiumPage            │   │  MockPage               │  │
//! │  │  (feature = "browser")   │   │  (always available)     │  │
//! │  │  CDP via chromiumoxide   │   │  scripted frames and    │  │
//! │  │                          │   │  elements, call history │  │
//! │  └──────────────────────────┘   └─────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Page objects never talk to a driver directly; they go through
//! [`PageHandle`](crate::PageHandle), which adds retries and waits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::dom::{DomNode, FrameSnapshot};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::Selector;

/// One browser tab
#[async_trait]
pub trait PageDriver: Send + Sync + fmt::Debug {
    /// Navigate to URL and wait for the load event
    async fn goto(&self, url: &str) -> ProbeResult<()>;

    /// Current URL
    async fn current_url(&self) -> ProbeResult<String>;

    /// Snapshot of the main document and every iframe, main first
    async fn frames(&self) -> ProbeResult<Vec<FrameSnapshot>>;

    /// Click the first visible match
    async fn click(&self, selector: &Selector) -> ProbeResult<()>;

    /// Replace an input's value
    async fn fill(&self, selector: &Selector, value: &str) -> ProbeResult<()>;

    /// Type text key by key with a pause between keys
    async fn type_text(&self, selector: &Selector, text: &str, delay: Duration) -> ProbeResult<()>;

    /// Press a key on the focused element (e.g. "Enter")
    async fn press_key(&self, key: &str) -> ProbeResult<()>;

    /// Whether any match is visible right now
    async fn is_visible(&self, selector: &Selector) -> ProbeResult<bool>;

    /// Inner text of the first visible match
    async fn inner_text(&self, selector: &Selector) -> ProbeResult<Option<String>>;

    /// Number of matches
    async fn count(&self, selector: &Selector) -> ProbeResult<usize>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> ProbeResult<Vec<u8>>;

    /// Navigate back in history
    async fn go_back(&self) -> ProbeResult<()>;

    /// Default timeout for driver-level waits
    async fn set_default_timeout(&self, timeout: Duration) -> ProbeResult<()>;

    /// Click a link that opens a new tab and return that tab
    async fn click_opening_page(&self, selector: &Selector) -> ProbeResult<Arc<dyn PageDriver>>;

    /// Close the tab
    async fn close(&self) -> ProbeResult<()>;
}

/// Scripted element state for [`MockPage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Rendered and visible
    pub visible: bool,
    /// Inner text
    pub text: Option<String>,
    /// Number of matches reported by `count`
    pub count: usize,
    /// Offset from page creation before the element exists
    pub appears_after: Duration,
}

impl MockElement {
    /// A visible element
    #[must_use]
    pub const fn visible() -> Self {
        Self {
            visible: true,
            text: None,
            count: 1,
            appears_after: Duration::ZERO,
        }
    }

    /// A present but hidden element
    #[must_use]
    pub const fn hidden() -> Self {
        Self {
            visible: false,
            text: None,
            count: 1,
            appears_after: Duration::ZERO,
        }
    }

    /// Set the inner text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the match count
    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Delay the element's appearance
    #[must_use]
    pub const fn after(mut self, delay: Duration) -> Self {
        self.appears_after = delay;
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    back_stack: Vec<String>,
    elements: HashMap<Selector, MockElement>,
    click_targets: HashMap<Selector, String>,
    values: HashMap<Selector, String>,
    failures: HashMap<String, u32>,
    popup: Option<Arc<MockPage>>,
    screenshot: Option<Vec<u8>>,
    default_timeout: Option<Duration>,
    closed: bool,
    history: Vec<String>,
}

/// In-memory page for tests.
///
/// Frames follow a timeline of snapshots keyed by offset from creation, so a
/// value can "render" partway through a lookup. Elements are keyed by
/// selector. Calls are recorded for verification.
#[derive(Debug)]
pub struct MockPage {
    created: Instant,
    timeline: Vec<(Duration, Vec<FrameSnapshot>)>,
    state: Mutex<MockState>,
}

/// PNG signature, enough for a screenshot file to be recognisable
const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    /// Blank page at `about:blank`
    #[must_use]
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            timeline: Vec::new(),
            state: Mutex::new(MockState {
                url: "about:blank".to_string(),
                ..MockState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start at a URL
    #[must_use]
    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.state().url = url.into();
        self
    }

    /// Frames shown from creation
    #[must_use]
    pub fn with_frames(self, frames: Vec<FrameSnapshot>) -> Self {
        self.with_frames_after(Duration::ZERO, frames)
    }

    /// Frames shown once `offset` has passed
    #[must_use]
    pub fn with_frames_after(mut self, offset: Duration, frames: Vec<FrameSnapshot>) -> Self {
        self.timeline.push((offset, frames));
        self.timeline.sort_by_key(|(at, _)| *at);
        self
    }

    /// Script an element
    #[must_use]
    pub fn with_element(self, selector: impl Into<Selector>, element: MockElement) -> Self {
        self.state().elements.insert(selector.into(), element);
        self
    }

    /// Clicking `selector` navigates to `url`
    #[must_use]
    pub fn with_click_target(self, selector: impl Into<Selector>, url: impl Into<String>) -> Self {
        self.state()
            .click_targets
            .insert(selector.into(), url.into());
        self
    }

    /// Tab returned by [`PageDriver::click_opening_page`]
    #[must_use]
    pub fn with_popup(self, popup: Self) -> Self {
        self.state().popup = Some(Arc::new(popup));
        self
    }

    /// Screenshot bytes (defaults to a PNG signature)
    #[must_use]
    pub fn with_screenshot(self, data: Vec<u8>) -> Self {
        self.state().screenshot = Some(data);
        self
    }

    /// Make the next `times` calls of `method` fail
    #[must_use]
    pub fn failing(self, method: &str, times: u32) -> Self {
        self.state().failures.insert(method.to_string(), times);
        self
    }

    /// Change an element after creation
    pub fn set_element(&self, selector: impl Into<Selector>, element: MockElement) {
        self.state().elements.insert(selector.into(), element);
    }

    /// Recorded calls, e.g. `fill:css=#username=alice`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().history.clone()
    }

    /// Whether a call with this prefix was recorded
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.state().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Number of recorded calls with this prefix
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.state()
            .history
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Last value filled or typed into `selector`
    #[must_use]
    pub fn value_of(&self, selector: &Selector) -> Option<String> {
        self.state().values.get(selector).cloned()
    }

    /// Default timeout set by the session
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.state().default_timeout
    }

    /// Whether the tab was closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn record(&self, method: &str, detail: impl fmt::Display) -> ProbeResult<()> {
        let mut state = self.state();
        state.history.push(format!("{method}:{detail}"));
        if let Some(remaining) = state.failures.get_mut(method) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProbeError::page(format!("injected {method} failure")));
            }
        }
        Ok(())
    }

    fn present(&self, selector: &Selector) -> Option<MockElement> {
        let elapsed = self.created.elapsed();
        self.state()
            .elements
            .get(selector)
            .filter(|e| elapsed >= e.appears_after)
            .cloned()
    }

    fn actionable(&self, selector: &Selector) -> ProbeResult<()> {
        match self.present(selector) {
            Some(element) if element.visible => Ok(()),
            Some(_) => Err(ProbeError::ElementError {
                selector: selector.to_string(),
                message: "element is not visible".to_string(),
            }),
            None => Err(ProbeError::ElementError {
                selector: selector.to_string(),
                message: "no matching element".to_string(),
            }),
        }
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&self, url: &str) -> ProbeResult<()> {
        self.record("goto", url)?;
        let mut state = self.state();
        let previous = std::mem::replace(&mut state.url, url.to_string());
        state.back_stack.push(previous);
        Ok(())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self.state().url.clone())
    }

    async fn frames(&self) -> ProbeResult<Vec<FrameSnapshot>> {
        self.record("frames", "")?;
        let elapsed = self.created.elapsed();
        let scripted = self
            .timeline
            .iter()
            .rev()
            .find(|(at, _)| elapsed >= *at)
            .map(|(_, frames)| frames.clone());
        Ok(scripted.unwrap_or_else(|| {
            vec![FrameSnapshot::new(
                self.state().url.clone(),
                DomNode::new("body"),
            )]
        }))
    }

    async fn click(&self, selector: &Selector) -> ProbeResult<()> {
        self.record("click", selector)?;
        self.actionable(selector)?;
        let mut state = self.state();
        if let Some(url) = state.click_targets.get(selector).cloned() {
            let previous = std::mem::replace(&mut state.url, url);
            state.back_stack.push(previous);
        }
        Ok(())
    }

    async fn fill(&self, selector: &Selector, value: &str) -> ProbeResult<()> {
        self.record("fill", format_args!("{selector}={value}"))?;
        self.actionable(selector)?;
        self.state().values.insert(selector.clone(), value.to_string());
        Ok(())
    }

    async fn type_text(&self, selector: &Selector, text: &str, delay: Duration) -> ProbeResult<()> {
        self.record("type", format_args!("{selector}={text}"))?;
        self.actionable(selector)?;
        for _ in text.chars() {
            tokio::time::sleep(delay).await;
        }
        self.state()
            .values
            .entry(selector.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn press_key(&self, key: &str) -> ProbeResult<()> {
        self.record("press", key)
    }

    async fn is_visible(&self, selector: &Selector) -> ProbeResult<bool> {
        Ok(self.present(selector).is_some_and(|e| e.visible))
    }

    async fn inner_text(&self, selector: &Selector) -> ProbeResult<Option<String>> {
        Ok(self
            .present(selector)
            .filter(|e| e.visible)
            .and_then(|e| e.text))
    }

    async fn count(&self, selector: &Selector) -> ProbeResult<usize> {
        Ok(self.present(selector).map_or(0, |e| e.count))
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        self.record("screenshot", "").map_err(|e| ProbeError::ScreenshotError {
            message: e.to_string(),
        })?;
        Ok(self
            .state()
            .screenshot
            .clone()
            .unwrap_or_else(|| PNG_MAGIC.to_vec()))
    }

    async fn go_back(&self) -> ProbeResult<()> {
        self.record("go_back", "")?;
        let mut state = self.state();
        if let Some(previous) = state.back_stack.pop() {
            state.url = previous;
        }
        Ok(())
    }

    async fn set_default_timeout(&self, timeout: Duration) -> ProbeResult<()> {
        self.record("set_default_timeout", timeout.as_millis())?;
        self.state().default_timeout = Some(timeout);
        Ok(())
    }

    async fn click_opening_page(&self, selector: &Selector) -> ProbeResult<Arc<dyn PageDriver>> {
        self.click(selector).await?;
        let popup = self.state().popup.clone();
        popup
            .map(|p| p as Arc<dyn PageDriver>)
            .ok_or_else(|| ProbeError::page(format!("clicking {selector} opened no new page")))
    }

    async fn close(&self) -> ProbeResult<()> {
        self.record("close", "")?;
        self.state().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod mock_page_tests {
        use super::*;

        #[tokio::test]
        async fn test_goto_and_back() {
            let page = MockPage::new();
            page.goto("https://acme.my.salesforce.com").await.unwrap();
            assert_eq!(page.current_url().await.unwrap(), "https://acme.my.salesforce.com");
            page.go_back().await.unwrap();
            assert_eq!(page.current_url().await.unwrap(), "about:blank");
            assert!(page.was_called("goto:https://acme"));
        }

        #[tokio::test]
        async fn test_click_requires_visible_element() {
            let page = MockPage::new()
                .with_element("#Login", MockElement::visible())
                .with_element("#hidden", MockElement::hidden());
            assert!(page.click(&Selector::css("#Login")).await.is_ok());
            assert!(matches!(
                page.click(&Selector::css("#hidden")).await,
                Err(ProbeError::ElementError { .. })
            ));
            assert!(page.click(&Selector::css("#missing")).await.is_err());
        }

        #[tokio::test]
        async fn test_injected_failures_run_out() {
            let page = MockPage::new()
                .with_element("#username", MockElement::visible())
                .failing("fill", 2);
            let sel = Selector::css("#username");
            assert!(page.fill(&sel, "alice").await.is_err());
            assert!(page.fill(&sel, "alice").await.is_err());
            page.fill(&sel, "alice").await.unwrap();
            assert_eq!(page.value_of(&sel).as_deref(), Some("alice"));
            assert_eq!(page.call_count("fill:"), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_frame_timeline() {
            let early = FrameSnapshot::new("about:blank", DomNode::new("body"));
            let late = FrameSnapshot::new("about:blank", DomNode::new("body").text("ready"));
            let page = MockPage::new()
                .with_frames(vec![early])
                .with_frames_after(Duration::from_millis(500), vec![late]);

            let first = page.frames().await.unwrap();
            assert_eq!(first[0].root.as_ref().unwrap().inner_text(), "");
            tokio::time::sleep(Duration::from_millis(500)).await;
            let second = page.frames().await.unwrap();
            assert_eq!(second[0].root.as_ref().unwrap().inner_text(), "ready");
        }

        #[tokio::test(start_paused = true)]
        async fn test_delayed_element() {
            let sel = Selector::css("a[title='Home']");
            let page = MockPage::new()
                .with_element(sel.clone(), MockElement::visible().after(Duration::from_secs(1)));
            assert!(!page.is_visible(&sel).await.unwrap());
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(page.is_visible(&sel).await.unwrap());
        }

        #[tokio::test]
        async fn test_popup() {
            let sel = Selector::css("#related_setup_app_home");
            let page = MockPage::new()
                .with_element(sel.clone(), MockElement::visible())
                .with_popup(MockPage::new().with_url("https://acme/setup"));
            let popup = page.click_opening_page(&sel).await.unwrap();
            assert_eq!(popup.current_url().await.unwrap(), "https://acme/setup");
        }
    }
}
