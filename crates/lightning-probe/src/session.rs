//! Scenario Session
//!
//! Owns the browser and the active tab for a whole run. Scenarios share one
//! session: `open` reuses live handles, so state left by one scenario is seen
//! by the next unless it navigates somewhere known first.

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::driver::{MockPage, PageDriver};
use crate::page::PageHandle;
use crate::page_object::{PageObject, PageObjectCache};
use crate::result::{ProbeError, ProbeResult};

/// A running browser
#[async_trait]
pub trait BrowserHandle: Send + Sync + fmt::Debug {
    /// Open a new tab
    async fn new_page(&self) -> ProbeResult<Arc<dyn PageDriver>>;

    /// Whether the browser process is still usable
    fn is_connected(&self) -> bool;

    /// Shut the browser down
    async fn close(&self) -> ProbeResult<()>;
}

/// Starts browsers
#[async_trait]
pub trait BrowserLauncher: Send + Sync + fmt::Debug {
    /// Launch a browser for this run
    async fn launch(&self, config: &Config) -> ProbeResult<Box<dyn BrowserHandle>>;
}

/// Browser, active tab and page-object cache for one run
pub struct Session {
    config: Config,
    browser: Option<Box<dyn BrowserHandle>>,
    page: Option<PageHandle>,
    cache: PageObjectCache,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.is_open())
            .field("cached_page_objects", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Closed session for a run
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            browser: None,
            page: None,
            cache: PageObjectCache::new(),
        }
    }

    /// Run configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a live browser and tab are held
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.page.is_some() && self.browser.as_ref().is_some_and(|b| b.is_connected())
    }

    /// Launch the browser and open a tab, or keep the live ones
    pub async fn open(&mut self, launcher: &dyn BrowserLauncher) -> ProbeResult<()> {
        if self.is_open() {
            tracing::debug!("reusing open browser session");
            return Ok(());
        }
        if let Some(stale) = self.browser.take() {
            tracing::warn!("browser disconnected, relaunching");
            let _ = stale.close().await;
        }
        self.page = None;
        self.cache.invalidate();

        let browser = launcher.launch(&self.config).await?;
        let driver = browser.new_page().await?;
        driver.set_default_timeout(self.config.timeout).await?;
        self.page = Some(PageHandle::configured(driver, &self.config));
        self.browser = Some(browser);
        tracing::info!(
            headless = self.config.headless,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "browser session opened"
        );
        Ok(())
    }

    /// Active tab
    pub fn page(&self) -> ProbeResult<&PageHandle> {
        self.page.as_ref().ok_or_else(|| ProbeError::SessionNotOpen {
            message: "no active page; call open first".to_string(),
        })
    }

    /// Cached page object bound to the active tab
    pub fn page_object<P: PageObject>(&mut self) -> ProbeResult<Arc<P>> {
        let page = self.page.as_ref().ok_or_else(|| ProbeError::SessionNotOpen {
            message: format!("cannot bind {}", std::any::type_name::<P>()),
        })?;
        Ok(self.cache.get_or_bind::<P>(page))
    }

    /// Make `page` the active tab and drop every cached page object
    pub fn replace_page(&mut self, page: PageHandle) {
        self.cache.invalidate();
        self.page = Some(page);
        tracing::info!("active page replaced");
    }

    /// Drop cached page objects and park the tab on `about:blank`
    pub async fn reset(&mut self) -> ProbeResult<()> {
        self.cache.invalidate();
        self.page()?.navigate("about:blank").await
    }

    /// Close the tab and the browser. A closed session can be opened again.
    pub async fn close(&mut self) -> ProbeResult<()> {
        self.cache.invalidate();
        if let Some(page) = self.page.take() {
            if let Err(err) = page.driver().close().await {
                tracing::warn!(error = %err, "closing page failed");
            }
        }
        if let Some(browser) = self.browser.take() {
            browser.close().await?;
            tracing::info!("browser closed");
        }
        Ok(())
    }
}

/// Browser made of [`MockPage`]s
#[derive(Debug)]
pub struct MockBrowser {
    first_page: Mutex<Option<Arc<MockPage>>>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserHandle for MockBrowser {
    async fn new_page(&self) -> ProbeResult<Arc<dyn PageDriver>> {
        let scripted = self
            .first_page
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(scripted.unwrap_or_else(|| Arc::new(MockPage::new())))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> ProbeResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher handing out [`MockBrowser`]s. The first tab of the first launch
/// is the scripted page given to [`MockLauncher::with_page`].
#[derive(Debug, Default)]
pub struct MockLauncher {
    page: Mutex<Option<Arc<MockPage>>>,
    launches: AtomicUsize,
    last_connected: Mutex<Option<Arc<AtomicBool>>>,
}

impl MockLauncher {
    /// Launcher with blank pages
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launcher whose first tab is `page`
    #[must_use]
    pub fn with_page(page: Arc<MockPage>) -> Self {
        Self {
            page: Mutex::new(Some(page)),
            ..Self::default()
        }
    }

    /// Number of launches so far
    #[must_use]
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Simulate the last launched browser crashing
    pub fn disconnect(&self) {
        if let Some(flag) = self
            .last_connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, _config: &Config) -> ProbeResult<Box<dyn BrowserHandle>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let connected = Arc::new(AtomicBool::new(true));
        *self
            .last_connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&connected));
        let first_page = self.page.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(Box::new(MockBrowser {
            first_page: Mutex::new(first_page),
            connected,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug)]
    struct Screen {
        page: PageHandle,
    }

    impl PageObject for Screen {
        fn bind(page: PageHandle) -> Self {
            Self { page }
        }

        fn url_pattern(&self) -> &str {
            "/**"
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn test_page_object_before_open_fails() {
            let mut session = Session::new(Config::default());
            assert!(matches!(
                session.page_object::<Screen>(),
                Err(ProbeError::SessionNotOpen { .. })
            ));
            assert!(session.page().is_err());
        }

        #[tokio::test]
        async fn test_open_is_idempotent() {
            let launcher = MockLauncher::new();
            let mut session = Session::new(Config::default());
            session.open(&launcher).await.unwrap();
            let first = session.page_object::<Screen>().unwrap();
            session.open(&launcher).await.unwrap();
            let second = session.page_object::<Screen>().unwrap();
            assert_eq!(launcher.launches(), 1);
            assert!(Arc::ptr_eq(&first, &second));
        }

        #[tokio::test]
        async fn test_open_sets_default_timeout() {
            let page = Arc::new(MockPage::new());
            let launcher = MockLauncher::with_page(Arc::clone(&page));
            let mut session = Session::new(Config::default());
            session.open(&launcher).await.unwrap();
            assert_eq!(page.default_timeout(), Some(Duration::from_millis(30_000)));
        }

        #[tokio::test]
        async fn test_open_relaunches_after_disconnect() {
            let launcher = MockLauncher::new();
            let mut session = Session::new(Config::default());
            session.open(&launcher).await.unwrap();
            launcher.disconnect();
            assert!(!session.is_open());
            session.open(&launcher).await.unwrap();
            assert_eq!(launcher.launches(), 2);
            assert!(session.is_open());
        }

        #[tokio::test]
        async fn test_reset_navigates_to_blank_and_clears_cache() {
            let page = Arc::new(
                MockPage::new().with_url("https://acme.lightning.force.com/lightning/page/home"),
            );
            let launcher = MockLauncher::with_page(Arc::clone(&page));
            let mut session = Session::new(Config::default());
            session.open(&launcher).await.unwrap();
            let before = session.page_object::<Screen>().unwrap();
            session.reset().await.unwrap();
            let after = session.page_object::<Screen>().unwrap();
            assert!(!Arc::ptr_eq(&before, &after));
            assert_eq!(page.current_url().await.unwrap(), "about:blank");
        }

        #[tokio::test]
        async fn test_close_then_reopen() {
            let page = Arc::new(MockPage::new());
            let launcher = MockLauncher::with_page(Arc::clone(&page));
            let mut session = Session::new(Config::default());
            session.open(&launcher).await.unwrap();
            session.close().await.unwrap();
            assert!(page.is_closed());
            assert!(!session.is_open());
            assert!(session.page_object::<Screen>().is_err());

            session.open(&launcher).await.unwrap();
            assert!(session.is_open());
        }
    }

    mod replace_page_tests {
        use super::*;

        #[tokio::test]
        async fn test_replace_page_invalidates_cache() {
            let launcher = MockLauncher::new();
            let mut session = Session::new(Config::default());
            session.open(&launcher).await.unwrap();
            let old = session.page_object::<Screen>().unwrap();

            let popup = session.page().unwrap().rebind(Arc::new(MockPage::new()));
            session.replace_page(popup.clone());
            let fresh = session.page_object::<Screen>().unwrap();

            assert!(fresh.page.same_page(&popup));
            // an Arc held across the swap keeps the old tab
            assert!(!old.page.same_page(&popup));
        }
    }
}
