//! Salesforce login screen.

use crate::page::PageHandle;
use crate::page_object::PageObject;
use crate::result::ProbeResult;
use crate::selector::Selector;

const USERNAME: &str = "#username";
const PASSWORD: &str = "#password";
const LOGIN_BUTTON: &str = "#Login";

/// Username/password form
#[derive(Debug)]
pub struct LoginPage {
    page: PageHandle,
}

impl PageObject for LoginPage {
    fn bind(page: PageHandle) -> Self {
        Self { page }
    }

    fn url_pattern(&self) -> &str {
        "/"
    }
}

impl LoginPage {
    /// Open the login URL
    pub async fn open(&self, url: &str) -> ProbeResult<()> {
        self.page.navigate(url).await
    }

    /// Whether the username field is showing
    pub async fn is_ready(&self) -> ProbeResult<bool> {
        self.page.is_visible(&Selector::css(USERNAME)).await
    }

    pub async fn enter_username(&self, username: &str) -> ProbeResult<()> {
        if let Err(err) = self.page.fill(&Selector::css(USERNAME), username).await {
            tracing::error!(error = %err, "failed to enter username");
            return Err(err);
        }
        tracing::info!(username, "entered username");
        Ok(())
    }

    pub async fn enter_password(&self, password: &str) -> ProbeResult<()> {
        if let Err(err) = self.page.fill(&Selector::css(PASSWORD), password).await {
            tracing::error!(error = %err, "failed to enter password");
            return Err(err);
        }
        tracing::info!("entered password");
        Ok(())
    }

    /// Click "Log In"
    pub async fn submit(&self) -> ProbeResult<()> {
        if let Err(err) = self.page.click(&Selector::css(LOGIN_BUTTON)).await {
            tracing::error!(error = %err, "failed to click login button");
            return Err(err);
        }
        tracing::info!("clicked login button");
        Ok(())
    }

    /// Fill both fields and submit
    pub async fn login(&self, username: &str, password: &str) -> ProbeResult<()> {
        self.enter_username(username).await?;
        self.enter_password(password).await?;
        self.submit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage, PageDriver};
    use std::sync::Arc;

    fn login_form() -> MockPage {
        MockPage::new()
            .with_url("https://login.salesforce.com")
            .with_element(USERNAME, MockElement::visible())
            .with_element(PASSWORD, MockElement::visible())
            .with_element(LOGIN_BUTTON, MockElement::visible())
            .with_click_target(LOGIN_BUTTON, "https://acme.lightning.force.com/lightning/page/home")
    }

    #[tokio::test]
    async fn test_login_fills_and_submits() {
        let mock = Arc::new(login_form());
        let page = LoginPage::bind(PageHandle::new(mock.clone()));
        assert!(page.is_ready().await.unwrap());

        page.login("qa@acme.com", "s3cret").await.unwrap();

        assert_eq!(mock.value_of(&Selector::css(USERNAME)).as_deref(), Some("qa@acme.com"));
        assert_eq!(mock.value_of(&Selector::css(PASSWORD)).as_deref(), Some("s3cret"));
        assert!(mock.was_called("click:css=#Login"));
        assert!(mock.current_url().await.unwrap().contains("/lightning/page/home"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_form_is_an_error() {
        let mock = Arc::new(MockPage::new());
        let page = LoginPage::bind(PageHandle::new(mock));
        assert!(!page.is_ready().await.unwrap());
        assert!(page.enter_username("qa@acme.com").await.is_err());
    }
}
