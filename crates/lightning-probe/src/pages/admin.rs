//! Setup page used to log in as another user.

use std::time::Duration;

use crate::page::PageHandle;
use crate::page_object::PageObject;
use crate::result::ProbeResult;
use crate::selector::{css_string, Selector};

const SEARCH_SETUP: &str = "input[title='Search Setup']";
const USER_FRAME: &str = "iframe[title*='User:']";
const FRAME_LOGIN_BUTTON: &str = "input[title='Login']";
const SESSION_ENDED_TEXT: &str = "Your session has ended";

const SESSION_ENDED_TIMEOUT: Duration = Duration::from_secs(5);
const POST_LOGIN_SETTLE: Duration = Duration::from_secs(2);

/// Setup home, opened in its own tab
#[derive(Debug)]
pub struct AdminPage {
    page: PageHandle,
}

impl PageObject for AdminPage {
    fn bind(page: PageHandle) -> Self {
        Self { page }
    }

    fn url_pattern(&self) -> &str {
        "/lightning/setup/**"
    }
}

fn user_hit(username: &str) -> Selector {
    Selector::css(format!("span[title={}]", css_string(username)))
}

fn frame_login_button() -> Selector {
    Selector::in_frame(USER_FRAME, Selector::css(FRAME_LOGIN_BUTTON))
}

impl AdminPage {
    /// Find `username` through Setup search and log in as that user.
    ///
    /// The "Login" button lives in the user detail iframe. When Salesforce
    /// shows "Your session has ended" afterwards, its "Log In" button is
    /// clicked as well.
    pub async fn proxy_login(&self, username: &str) -> ProbeResult<()> {
        tracing::info!(username, "proxy logging in");

        self.page
            .fill(&Selector::css(SEARCH_SETUP), username)
            .await?;

        let hit = user_hit(username);
        self.page
            .wait_for_visible(&hit, self.page.default_timeout())
            .await?;
        self.page.click(&hit).await?;

        self.page.click(&frame_login_button()).await?;

        let ended = Selector::text(SESSION_ENDED_TEXT);
        if self
            .page
            .wait_for_visible(&ended, SESSION_ENDED_TIMEOUT)
            .await
            .is_ok()
        {
            tracing::warn!("session expired popup appeared, clicking Log In");
            self.page
                .click(&Selector::css_with_text("button", "Log In"))
                .await?;
        }

        self.page.settle(POST_LOGIN_SETTLE).await;
        let url = self.page.url().await.unwrap_or_default();
        tracing::debug!(url = %url, "after proxy login");
        Ok(())
    }
}
