//! Lightning landing page: navigation tabs, app launcher and setup menu.

use std::time::Duration;

use crate::page::PageHandle;
use crate::page_object::PageObject;
use crate::result::ProbeResult;
use crate::selector::Selector;

const SPINNER: &str = ".slds-spinner:not([hidden])";
const HOME_TAB: &str = "a[title='Home']";
const SWITCH_TO_LIGHTNING: &str = "div.navLinks div.linkElements a.switch-to-lightning";
const APP_LAUNCHER: &str = "button[title='App Launcher']";
const APP_SEARCH: &str =
    "input[aria-label='Search apps and items...'], input[placeholder='Search apps and items...']";
const GEAR: &str = "div.setupGear";
const SETUP_OPTION: &str = "#related_setup_app_home";
const MAILBOX_SYNC_TAB: &str = "a[title='Immigration Mailbox Sync']";
const IMMIGRATION_TAB: &str = "a[data-label='Immigration']";

/// Name typed into the app launcher to find the web form
pub const WEB_FORM_APP_QUERY: &str = "IXT Mailbox Webform";
/// Tile text of the web form app
pub const WEB_FORM_APP_TILE: &str = "IXT Mailbox WebForm";

const SWITCH_TIMEOUT: Duration = Duration::from_secs(10);
const SPINNER_TIMEOUT: Duration = Duration::from_secs(10);
const WEB_FORM_SETTLE: Duration = Duration::from_secs(5);

/// Salesforce home page
#[derive(Debug)]
pub struct HomePage {
    page: PageHandle,
}

impl PageObject for HomePage {
    fn bind(page: PageHandle) -> Self {
        Self { page }
    }

    fn url_pattern(&self) -> &str {
        "/lightning/**"
    }
}

impl HomePage {
    /// Spinners may never show; a lingering one is only logged
    async fn wait_for_spinner(&self) {
        if let Err(err) = self
            .page
            .wait_for_hidden(&Selector::css(SPINNER), SPINNER_TIMEOUT)
            .await
        {
            tracing::debug!(error = %err, "spinner still showing");
        }
    }

    /// Whether the Home tab shows up within `timeout`
    pub async fn is_home_tab_visible(&self, timeout: Duration) -> bool {
        let visible = self
            .page
            .wait_for_visible(&Selector::css(HOME_TAB), timeout)
            .await
            .is_ok();
        if visible {
            tracing::info!("home tab is displayed");
        }
        visible
    }

    /// Leave Salesforce Classic when the switch link is offered.
    /// No link within ten seconds means the org is already on Lightning.
    pub async fn switch_to_lightning(&self) -> ProbeResult<()> {
        let link = Selector::css(SWITCH_TO_LIGHTNING);
        if self.page.wait_for_visible(&link, SWITCH_TIMEOUT).await.is_ok() {
            self.page.click(&link).await?;
            tracing::info!("switched to Lightning");
        } else {
            tracing::info!("already in Lightning (no switch link visible)");
        }
        Ok(())
    }

    pub async fn open_app_launcher(&self) -> ProbeResult<()> {
        self.page.click(&Selector::css(APP_LAUNCHER)).await
    }

    /// Type a query into the app launcher search box
    pub async fn search_app(&self, query: &str) -> ProbeResult<()> {
        self.page.fill(&Selector::css(APP_SEARCH), query).await
    }

    /// Open the Immigration Mailbox Sync tab and wait for it to settle
    pub async fn open_mailbox_sync_tab(&self) -> ProbeResult<()> {
        let tab = Selector::css(MAILBOX_SYNC_TAB);
        self.page.wait_for_visible(&tab, self.page.default_timeout()).await?;
        self.page.click(&tab).await?;
        self.wait_for_spinner().await;
        tracing::info!("opened mailbox sync tab");
        Ok(())
    }

    /// Open the Immigration tab and wait for it to settle
    pub async fn open_immigration_tab(&self) -> ProbeResult<()> {
        let tab = Selector::css(IMMIGRATION_TAB);
        self.page.wait_for_visible(&tab, self.page.default_timeout()).await?;
        self.page.click(&tab).await?;
        self.wait_for_spinner().await;
        tracing::info!("opened immigration tab");
        Ok(())
    }

    /// Find the web form app in the launcher and open it
    pub async fn open_web_form_app(&self) -> ProbeResult<()> {
        self.page
            .type_text(&Selector::css(APP_SEARCH), WEB_FORM_APP_QUERY)
            .await?;
        let tile = Selector::css_with_text("p.slds-truncate", WEB_FORM_APP_TILE);
        self.page.wait_for_visible(&tile, self.page.default_timeout()).await?;
        self.page.click(&tile).await?;
        self.page.settle(WEB_FORM_SETTLE).await;
        tracing::info!("opened web form app");
        Ok(())
    }

    /// Open Setup from the gear menu. Setup opens in a new tab, whose handle
    /// is returned; the caller makes it the session's active page.
    pub async fn open_setup(&self) -> ProbeResult<PageHandle> {
        self.page.click(&Selector::css(GEAR)).await?;
        let setup = self
            .page
            .click_opening_page(&Selector::css(SETUP_OPTION))
            .await?;
        tracing::info!("setup opened in a new page");
        Ok(setup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage};
    use std::sync::Arc;

    const SETUP_URL: &str = "https://acme.lightning.force.com/lightning/setup/SetupOneHome/home";

    fn home(mock: &Arc<MockPage>) -> HomePage {
        HomePage::bind(PageHandle::new(mock.clone()).with_type_delay(Duration::ZERO))
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_to_lightning_is_best_effort() {
        let mock = Arc::new(MockPage::new());
        home(&mock).switch_to_lightning().await.unwrap();
        assert!(!mock.was_called("click"));

        let mock =
            Arc::new(MockPage::new().with_element(SWITCH_TO_LIGHTNING, MockElement::visible()));
        home(&mock).switch_to_lightning().await.unwrap();
        assert!(mock.was_called("click:css=div.navLinks"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_home_tab_visibility() {
        let mock = Arc::new(MockPage::new().with_element(
            HOME_TAB,
            MockElement::visible().after(Duration::from_secs(2)),
        ));
        let page = home(&mock);
        assert!(!page.is_home_tab_visible(Duration::from_secs(1)).await);
        assert!(page.is_home_tab_visible(Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_setup_returns_new_tab() {
        let mock = Arc::new(
            MockPage::new()
                .with_element(GEAR, MockElement::visible())
                .with_element(SETUP_OPTION, MockElement::visible())
                .with_popup(MockPage::new().with_url(SETUP_URL)),
        );
        let handle = PageHandle::new(mock.clone());
        let setup = HomePage::bind(handle.clone()).open_setup().await.unwrap();
        assert!(!setup.same_page(&handle));
        assert!(setup.url().await.unwrap().contains("/lightning/setup/"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_immigration_tab() {
        let mock = Arc::new(
            MockPage::new()
                .with_element(IMMIGRATION_TAB, MockElement::visible())
                .with_element(SPINNER, MockElement::hidden()),
        );
        home(&mock).open_immigration_tab().await.unwrap();
        assert!(mock.was_called(&format!("click:css={IMMIGRATION_TAB}")));

        let missing = Arc::new(MockPage::new());
        let err = home(&missing).open_immigration_tab().await.unwrap_err();
        assert!(err.to_string().contains("Immigration"));
        assert!(!missing.was_called("click"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_web_form_app() {
        let tile = Selector::css_with_text("p.slds-truncate", WEB_FORM_APP_TILE);
        let mock = Arc::new(
            MockPage::new()
                .with_element(APP_SEARCH, MockElement::visible())
                .with_element(tile.clone(), MockElement::visible()),
        );
        home(&mock).open_web_form_app().await.unwrap();
        assert_eq!(
            mock.value_of(&Selector::css(APP_SEARCH)).as_deref(),
            Some(WEB_FORM_APP_QUERY)
        );
        assert!(mock.was_called(&format!("click:{tile}")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mailbox_tab_waits_for_spinner_best_effort() {
        let mock = Arc::new(
            MockPage::new()
                .with_element(MAILBOX_SYNC_TAB, MockElement::visible())
                .with_element(SPINNER, MockElement::visible()),
        );
        // a spinner that never clears does not fail the step
        home(&mock).open_mailbox_sync_tab().await.unwrap();
        assert!(mock.was_called("click:css=a[title='Immigration Mailbox Sync']"));
    }
}
