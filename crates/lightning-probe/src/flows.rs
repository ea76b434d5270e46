//! Multi-page flows shared by step definitions.
//!
//! Flows fetch page objects from the session cache so a scenario keeps one
//! instance per page type until the active tab changes.

use std::sync::Arc;

use crate::pages::{
    AdminPage, HomePage, ImmigrationHomePage, ImmigrationRecordPage, LoginPage, MailboxSyncHomePage,
    MailboxSyncRecordPage, WebFormPage,
};
use crate::result::{ProbeError, ProbeResult};
use crate::session::Session;
use crate::test_data::{read_inquiry, TestDataReader};

/// Log in with the configured credentials and land on Lightning home.
///
/// A missing Home tab afterwards is a precondition failure: the rest of the
/// scenario cannot run, so it is not retried.
pub async fn login_to_salesforce(session: &mut Session) -> ProbeResult<Arc<HomePage>> {
    let (base_url, username, password) = {
        let config = session.config();
        (
            config.base_url.clone(),
            config.username.clone(),
            config.password.clone(),
        )
    };

    let login = session.page_object::<LoginPage>()?;
    login.open(&base_url).await?;
    login.login(&username, &password).await?;

    let home = session.page_object::<HomePage>()?;
    home.switch_to_lightning().await?;
    let timeout = session.page()?.default_timeout();
    if !home.is_home_tab_visible(timeout).await {
        tracing::error!(username = %username, "home tab missing after login");
        return Err(ProbeError::precondition(
            "Home tab is not visible. Login may have failed",
        ));
    }
    tracing::info!(username = %username, "logged into Salesforce");
    Ok(home)
}

/// Open Setup in a new tab, make it active and log in as the business user
pub async fn proxy_login(
    session: &mut Session,
    data: &TestDataReader,
) -> ProbeResult<Arc<HomePage>> {
    let username = data.business_username()?;

    let home = session.page_object::<HomePage>()?;
    let setup = home.open_setup().await?;
    session.replace_page(setup);

    let admin = session.page_object::<AdminPage>()?;
    session.page()?.wait_for_page(admin.as_ref()).await?;
    admin.proxy_login(&username).await?;
    tracing::info!(username = %username, "proxy login complete");
    session.page_object::<HomePage>()
}

/// From Lightning home, open the Immigration Mailbox Sync tab
pub async fn open_mailbox_sync(session: &mut Session) -> ProbeResult<Arc<MailboxSyncHomePage>> {
    let home = session.page_object::<HomePage>()?;
    home.switch_to_lightning().await?;
    home.open_app_launcher().await?;
    home.open_mailbox_sync_tab().await?;
    session.page_object::<MailboxSyncHomePage>()
}

/// From Lightning home, open the IXT Mailbox web form app
pub async fn go_to_web_form(session: &mut Session) -> ProbeResult<Arc<WebFormPage>> {
    let home = session.page_object::<HomePage>()?;
    home.open_app_launcher().await?;
    home.open_web_form_app().await?;
    session.page_object::<WebFormPage>()
}

/// From Lightning home, open an Immigration record: the one whose link reads
/// `record_id`, or the first in the list
pub async fn open_immigration_record(
    session: &mut Session,
    record_id: Option<&str>,
) -> ProbeResult<Arc<ImmigrationRecordPage>> {
    let home = session.page_object::<HomePage>()?;
    home.open_immigration_tab().await?;

    let list = session.page_object::<ImmigrationHomePage>()?;
    let timeout = session.page()?.default_timeout();
    match record_id {
        Some(id) => list.open_record_by_id(id, timeout).await?,
        None => list.open_first_record(timeout).await?,
    }

    let record = session.page_object::<ImmigrationRecordPage>()?;
    session.page()?.wait_for_page(record.as_ref()).await?;
    Ok(record)
}

/// Find the record for the inquiry saved by an earlier scenario and open it.
/// Returns the inquiry number with the record page.
pub async fn open_saved_inquiry(
    session: &mut Session,
) -> ProbeResult<(String, Arc<MailboxSyncRecordPage>)> {
    let inquiry = read_inquiry(&session.config().paths.inquiry_file())?;
    let mailbox = session.page_object::<MailboxSyncHomePage>()?;
    let timeout = session.page()?.default_timeout();
    mailbox.open_record_via_global_search(&inquiry, timeout).await?;
    let record = session.page_object::<MailboxSyncRecordPage>()?;
    session.page()?.wait_for_page(record.as_ref()).await?;
    Ok((inquiry, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::driver::{MockElement, MockPage, PageDriver};
    use crate::selector::Selector;
    use crate::session::MockLauncher;

    const HOME_URL: &str = "https://acme.lightning.force.com/lightning/page/home";

    fn login_page() -> MockPage {
        MockPage::new()
            .with_element("#username", MockElement::visible())
            .with_element("#password", MockElement::visible())
            .with_element("#Login", MockElement::visible())
            .with_click_target("#Login", HOME_URL)
    }

    async fn open_session(page: &Arc<MockPage>, config: Config) -> Session {
        let mut session = Session::new(config);
        session.open(&MockLauncher::with_page(page.clone())).await.unwrap();
        session
    }

    fn config() -> Config {
        Config::default()
            .with_base_url("https://acme.my.salesforce.com")
            .with_credentials("qa@acme.com", "s3cret")
    }

    mod login_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_login_lands_on_home() {
            let page =
                Arc::new(login_page().with_element("a[title='Home']", MockElement::visible()));
            let mut session = open_session(&page, config()).await;

            login_to_salesforce(&mut session).await.unwrap();

            assert!(page.was_called("goto:https://acme.my.salesforce.com"));
            assert_eq!(page.value_of(&Selector::css("#username")).as_deref(), Some("qa@acme.com"));
            assert_eq!(page.current_url().await.unwrap(), HOME_URL);
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_home_tab_is_precondition_failure() {
            let page = Arc::new(login_page());
            let mut session = open_session(&page, config()).await;

            let err = login_to_salesforce(&mut session).await.unwrap_err();
            assert!(matches!(err, ProbeError::Precondition { .. }));
            assert!(!err.is_transient());
            assert_eq!(page.call_count("click:css=#Login"), 1);
        }

        #[tokio::test]
        async fn test_closed_session_cannot_log_in() {
            let mut session = Session::new(config());
            let err = login_to_salesforce(&mut session).await.unwrap_err();
            assert!(matches!(err, ProbeError::SessionNotOpen { .. }));
        }
    }

    mod proxy_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_proxy_login_moves_to_setup_tab() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(
                dir.path().join("users.json"),
                r#"{"Business_user_name_1":"biz@acme.com"}"#,
            )
            .unwrap();

            let setup = MockPage::new()
                .with_url("https://acme.lightning.force.com/lightning/setup/SetupOneHome/home")
                .with_element("input[title='Search Setup']", MockElement::visible())
                .with_element("span[title='biz@acme.com']", MockElement::visible())
                .with_element(
                    Selector::in_frame(
                        "iframe[title*='User:']",
                        Selector::css("input[title='Login']"),
                    ),
                    MockElement::visible(),
                );
            let home = Arc::new(
                MockPage::new()
                    .with_element("div.setupGear", MockElement::visible())
                    .with_element("#related_setup_app_home", MockElement::visible())
                    .with_popup(setup),
            );
            let mut session = open_session(&home, config()).await;
            let before = session.page_object::<HomePage>().unwrap();

            let after = proxy_login(&mut session, &TestDataReader::new(dir.path()))
                .await
                .unwrap();

            assert!(!Arc::ptr_eq(&before, &after));
            let url = session.page().unwrap().url().await.unwrap();
            assert!(url.contains("/lightning/setup/"));
            assert!(!home.was_called("fill:"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_proxy_login_waits_for_setup_url() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(
                dir.path().join("users.json"),
                r#"{"Business_user_name_1":"biz@acme.com"}"#,
            )
            .unwrap();

            let stuck = MockPage::new()
                .with_url("https://acme.lightning.force.com/lightning/page/home")
                .with_element("input[title='Search Setup']", MockElement::visible());
            let home = Arc::new(
                MockPage::new()
                    .with_element("div.setupGear", MockElement::visible())
                    .with_element("#related_setup_app_home", MockElement::visible())
                    .with_popup(stuck),
            );
            let mut session = open_session(&home, config()).await;

            let err = proxy_login(&mut session, &TestDataReader::new(dir.path()))
                .await
                .unwrap_err();
            assert!(matches!(err, ProbeError::Timeout { .. }));
            assert!(err.to_string().contains("/lightning/setup/**"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_proxy_login_without_users_file() {
            let dir = tempfile::tempdir().unwrap();
            let page = Arc::new(MockPage::new());
            let mut session = open_session(&page, config()).await;
            let err = proxy_login(&mut session, &TestDataReader::new(dir.path()))
                .await
                .unwrap_err();
            assert!(matches!(err, ProbeError::TestData { .. }));
            assert!(!page.was_called("click:"));
        }
    }

    mod inquiry_tests {
        use super::*;
        use crate::test_data::write_inquiry;

        #[tokio::test(start_paused = true)]
        async fn test_open_saved_inquiry_uses_global_search() {
            let dir = tempfile::tempdir().unwrap();
            let config = config().with_root(dir.path());
            write_inquiry(&config.paths.inquiry_file(), "IXT-77").unwrap();

            let hit = Selector::css_with_text("mark.data-match", "IXT-77");
            let page = Arc::new(
                MockPage::new()
                    .with_element("button[aria-label='Search']", MockElement::visible())
                    .with_element(
                        "input.slds-input[placeholder='Search...'][type='search']",
                        MockElement::visible(),
                    )
                    .with_element(hit.clone(), MockElement::visible())
                    .with_click_target(
                        hit,
                        "https://acme.lightning.force.com/lightning/r/Mailbox_Sync__c/a01/view",
                    ),
            );
            let mut session = open_session(&page, config).await;

            let (inquiry, _record) = open_saved_inquiry(&mut session).await.unwrap();
            assert_eq!(inquiry, "IXT-77");
            assert!(page.current_url().await.unwrap().ends_with("/a01/view"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_open_immigration_record_by_id() {
            let link = Selector::role("link", "I-23357");
            let page = Arc::new(
                MockPage::new()
                    .with_element("a[data-label='Immigration']", MockElement::visible())
                    .with_element(link.clone(), MockElement::visible())
                    .with_click_target(
                        link.clone(),
                        "https://acme.lightning.force.com/lightning/r/WCT_Immigration__c/a0I1/view",
                    ),
            );
            let mut session = open_session(&page, config()).await;

            open_immigration_record(&mut session, Some("I-23357")).await.unwrap();
            assert!(page.was_called("click:css=a[data-label='Immigration']"));
            assert!(page.was_called(&format!("click:{link}")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_immigration_record_must_load() {
            let header = "th[data-label='Immigration Name']";
            let page = Arc::new(
                MockPage::new()
                    .with_element("a[data-label='Immigration']", MockElement::visible())
                    .with_element(header, MockElement::visible())
                    .with_click_target(
                        header,
                        "https://acme.lightning.force.com/lightning/r/Mailbox_Sync__c/a01/view",
                    ),
            );
            let mut session = open_session(&page, config()).await;

            let err = open_immigration_record(&mut session, None).await.unwrap_err();
            assert!(matches!(err, ProbeError::Timeout { .. }));
            assert!(err.to_string().contains("WCT_Immigration__c"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_mailbox_sync_flow() {
            let page = Arc::new(
                MockPage::new()
                    .with_element("button[title='App Launcher']", MockElement::visible())
                    .with_element("a[title='Immigration Mailbox Sync']", MockElement::visible()),
            );
            let mut session = open_session(&page, config()).await;
            open_mailbox_sync(&mut session).await.unwrap();
            assert!(page.was_called("click:css=button[title='App Launcher']"));
            assert!(page.was_called("click:css=a[title='Immigration Mailbox Sync']"));
            assert!(!page.was_called("click:css=div.navLinks"));
        }
    }
}
