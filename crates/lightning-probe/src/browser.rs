//! Browser control over CDP.
//!
//! With the `browser` feature this module launches Chromium through
//! chromiumoxide and implements [`PageDriver`](crate::PageDriver) on a real
//! tab. Without it, [`ChromiumLauncher::launch`] fails with
//! [`ProbeError::BrowserNotFound`] and tests run on
//! [`MockPage`](crate::MockPage).

use async_trait::async_trait;

use crate::config::Config;
use crate::result::{ProbeError, ProbeResult};
use crate::session::{BrowserHandle, BrowserLauncher};

/// Script returning a JSON array of frame snapshots: the main document first,
/// then every iframe in document order. Cross-origin frames are reported
/// with `accessible: false`. Open shadow roots are walked as children.
pub const SNAPSHOT_SCRIPT: &str = r"
(() => {
  const visible = el => {
    const s = getComputedStyle(el);
    return s.visibility !== 'hidden' && s.display !== 'none' &&
      !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
  };
  const node = el => {
    const attrs = {};
    for (const a of el.attributes) { if (a.name !== 'class') attrs[a.name] = a.value; }
    let text = '';
    for (const c of el.childNodes) { if (c.nodeType === 3) text += c.textContent; }
    const kids = Array.from(el.children);
    if (el.shadowRoot) kids.push(...el.shadowRoot.children);
    return {
      tag: el.tagName.toLowerCase(),
      attrs,
      classes: Array.from(el.classList),
      text: text.replace(/\s+/g, ' ').trim(),
      visible: visible(el),
      children: kids.filter(k => k.tagName !== 'SCRIPT' && k.tagName !== 'STYLE').map(node),
    };
  };
  const frames = [];
  const visit = (doc, name) => {
    const root = doc.body ? node(doc.body) : null;
    frames.push({ url: doc.location.href, name, accessible: true, root });
    for (const f of doc.querySelectorAll('iframe, frame')) {
      let inner = null;
      try { inner = f.contentDocument; } catch (e) { inner = null; }
      if (inner) { visit(inner, f.name || ''); }
      else { frames.push({ url: f.src || '', name: f.name || '', accessible: false, root: null }); }
    }
  };
  visit(document, '');
  return JSON.stringify(frames);
})()
";

/// Launches Chromium for a run
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    /// Create a launcher
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, config: &Config) -> ProbeResult<Box<dyn BrowserHandle>> {
        #[cfg(feature = "browser")]
        {
            let browser = cdp::ChromiumBrowser::launch(config).await?;
            Ok(Box::new(browser))
        }
        #[cfg(not(feature = "browser"))]
        {
            let _ = config;
            tracing::error!("built without the `browser` feature");
            Err(ProbeError::BrowserNotFound)
        }
    }
}

/// Element body that sets `value` and fires the events Lightning listens for
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn fill_script(value: &str) -> ProbeResult<String> {
    let value = serde_json::to_string(value)?;
    Ok(format!(
        "el.focus(); el.value = {value}; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }}))"
    ))
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening, clippy::items_after_statements)]
mod cdp {
    use super::*;
    use crate::dom::FrameSnapshot;
    use crate::driver::PageDriver;
    use crate::selector::Selector;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    use crate::retry::poll_until;

    const POPUP_POLL_MS: u64 = 200;

    fn page_error(e: impl std::fmt::Display) -> ProbeError {
        ProbeError::PageError {
            message: e.to_string(),
        }
    }

    /// Running Chromium with its CDP event loop
    #[derive(Debug)]
    pub struct ChromiumBrowser {
        inner: Arc<Mutex<CdpBrowser>>,
        connected: Arc<AtomicBool>,
        navigation_timeout: Duration,
        #[allow(dead_code)]
        handle: tokio::task::JoinHandle<()>,
    }

    impl ChromiumBrowser {
        /// Launch Chromium with the run's window and binary settings
        pub async fn launch(config: &Config) -> ProbeResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height)
                .request_timeout(config.navigation_timeout);

            if !config.headless {
                builder = builder.with_head();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|e| ProbeError::BrowserLaunchError { message: e })?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                ProbeError::BrowserLaunchError {
                    message: e.to_string(),
                }
            })?;

            let connected = Arc::new(AtomicBool::new(true));
            let flag = Arc::clone(&connected);
            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
                flag.store(false, Ordering::SeqCst);
            });

            tracing::info!(headless = config.headless, "chromium launched");
            Ok(Self {
                inner: Arc::new(Mutex::new(browser)),
                connected,
                navigation_timeout: config.navigation_timeout,
                handle,
            })
        }
    }

    #[async_trait]
    impl BrowserHandle for ChromiumBrowser {
        async fn new_page(&self) -> ProbeResult<Arc<dyn PageDriver>> {
            let browser = self.inner.lock().await;
            let page = browser.new_page("about:blank").await.map_err(page_error)?;
            Ok(Arc::new(ChromiumPage::new(
                page,
                Arc::clone(&self.inner),
                self.navigation_timeout,
            )))
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn close(&self) -> ProbeResult<()> {
            let mut browser = self.inner.lock().await;
            browser
                .close()
                .await
                .map_err(|e| ProbeError::BrowserLaunchError {
                    message: e.to_string(),
                })?;
            let _ = browser.wait().await;
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    /// One Chromium tab
    #[derive(Debug)]
    pub struct ChromiumPage {
        page: CdpPage,
        browser: Arc<Mutex<CdpBrowser>>,
        default_timeout_ms: AtomicU64,
        navigation_timeout: Duration,
    }

    impl ChromiumPage {
        fn new(
            page: CdpPage,
            browser: Arc<Mutex<CdpBrowser>>,
            navigation_timeout: Duration,
        ) -> Self {
            Self {
                page,
                browser,
                default_timeout_ms: AtomicU64::new(30_000),
                navigation_timeout,
            }
        }

        async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> ProbeResult<T> {
            let result = self.page.evaluate(script).await.map_err(page_error)?;
            result.into_value().map_err(page_error)
        }

        /// Run `body` against the first visible match, bound to `el`.
        /// Fails when nothing visible matches.
        async fn with_element(&self, selector: &Selector, body: &str) -> ProbeResult<()> {
            const VISIBLE: &str = "el => { const s = getComputedStyle(el); \
                return s.visibility !== 'hidden' && s.display !== 'none' && \
                !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length); }";
            let script = format!(
                "(() => {{ const el = {}.find({VISIBLE}); if (!el) return false; \
                 el.scrollIntoView({{ block: 'center' }}); {body}; return true; }})()",
                selector.to_all_query()
            );
            if self.eval::<bool>(script).await? {
                Ok(())
            } else {
                Err(ProbeError::ElementError {
                    selector: selector.to_string(),
                    message: "no visible element".to_string(),
                })
            }
        }
    }

    #[async_trait]
    impl PageDriver for ChromiumPage {
        async fn goto(&self, url: &str) -> ProbeResult<()> {
            let navigation = self.page.goto(url);
            match tokio::time::timeout(self.navigation_timeout, navigation).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(ProbeError::NavigationError {
                    url: url.to_string(),
                    message: e.to_string(),
                }),
                Err(_) => Err(ProbeError::NavigationError {
                    url: url.to_string(),
                    message: format!(
                        "no load event within {}ms",
                        self.navigation_timeout.as_millis()
                    ),
                }),
            }
        }

        async fn current_url(&self) -> ProbeResult<String> {
            Ok(self
                .page
                .url()
                .await
                .map_err(page_error)?
                .unwrap_or_else(|| "about:blank".to_string()))
        }

        async fn frames(&self) -> ProbeResult<Vec<FrameSnapshot>> {
            let json: String = self.eval(SNAPSHOT_SCRIPT.to_string()).await?;
            Ok(serde_json::from_str(&json)?)
        }

        async fn click(&self, selector: &Selector) -> ProbeResult<()> {
            self.with_element(selector, "el.click()").await
        }

        async fn fill(&self, selector: &Selector, value: &str) -> ProbeResult<()> {
            self.with_element(selector, &fill_script(value)?).await
        }

        async fn type_text(
            &self,
            selector: &Selector,
            text: &str,
            delay: Duration,
        ) -> ProbeResult<()> {
            self.with_element(selector, "el.focus()").await?;
            let mut buf = [0u8; 4];
            for ch in text.chars() {
                self.page
                    .execute(InsertTextParams::new(ch.encode_utf8(&mut buf).to_string()))
                    .await
                    .map_err(page_error)?;
                tokio::time::sleep(delay).await;
            }
            Ok(())
        }

        async fn press_key(&self, key: &str) -> ProbeResult<()> {
            let text = if key == "Enter" { "\r" } else { "" };
            for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
                let mut params = DispatchKeyEventParams::builder().r#type(kind.clone()).key(key);
                if kind == DispatchKeyEventType::KeyDown && !text.is_empty() {
                    params = params.text(text);
                }
                let params = params.build().map_err(page_error)?;
                self.page.execute(params).await.map_err(page_error)?;
            }
            Ok(())
        }

        async fn is_visible(&self, selector: &Selector) -> ProbeResult<bool> {
            self.eval(selector.to_visible_query()).await
        }

        async fn inner_text(&self, selector: &Selector) -> ProbeResult<Option<String>> {
            self.eval(selector.to_text_query()).await
        }

        async fn count(&self, selector: &Selector) -> ProbeResult<usize> {
            self.eval(selector.to_count_query()).await
        }

        async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();

            let screenshot =
                self.page
                    .execute(params)
                    .await
                    .map_err(|e| ProbeError::ScreenshotError {
                        message: e.to_string(),
                    })?;

            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| ProbeError::ScreenshotError {
                    message: e.to_string(),
                })
        }

        async fn go_back(&self) -> ProbeResult<()> {
            self.eval::<serde_json::Value>("(() => { history.back(); return null; })()".to_string())
                .await?;
            let _ = self.page.wait_for_navigation().await;
            Ok(())
        }

        async fn set_default_timeout(&self, timeout: Duration) -> ProbeResult<()> {
            self.default_timeout_ms
                .store(timeout.as_millis() as u64, Ordering::SeqCst);
            Ok(())
        }

        async fn click_opening_page(
            &self,
            selector: &Selector,
        ) -> ProbeResult<Arc<dyn PageDriver>> {
            let before: HashSet<_> = {
                let browser = self.browser.lock().await;
                browser
                    .pages()
                    .await
                    .map_err(page_error)?
                    .iter()
                    .map(|p| p.target_id().clone())
                    .collect()
            };
            self.click(selector).await?;

            let timeout = Duration::from_millis(self.default_timeout_ms.load(Ordering::SeqCst));
            let browser = &self.browser;
            let before = &before;
            let opened = poll_until(timeout, Duration::from_millis(POPUP_POLL_MS), || async move {
                let browser = browser.lock().await;
                browser
                    .pages()
                    .await
                    .ok()?
                    .into_iter()
                    .find(|p| !before.contains(p.target_id()))
            })
            .await
            .map_err(|_| ProbeError::Timeout {
                what: format!("new page after clicking {selector}"),
                ms: timeout.as_millis() as u64,
            })?;
            let _ = opened.wait_for_navigation().await;

            Ok(Arc::new(Self::new(
                opened,
                Arc::clone(&self.browser),
                self.navigation_timeout,
            )))
        }

        async fn close(&self) -> ProbeResult<()> {
            self.page.clone().close().await.map_err(page_error)
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumBrowser, ChromiumPage};
