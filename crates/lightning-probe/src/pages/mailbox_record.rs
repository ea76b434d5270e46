//! Mailbox sync record view.

use regex::Regex;
use std::time::Duration;

use crate::field_reader::{FieldValueReader, FieldValues};
use crate::page::PageHandle;
use crate::page_object::PageObject;
use crate::pages::CustomEmailPage;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::Selector;

const EMAIL_TILE_LINK: &str = "h3.slds-tile__title a";
const CUSTOM_EMAIL_URL: &str = "/lightning/r/Custom_Email_2__c/";

const EMAIL_URL_TIMEOUT: Duration = Duration::from_secs(8);
const EMAIL_MARKER_TIMEOUT: Duration = Duration::from_secs(4);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Labels only the Custom Email record shows, tried in order
const EMAIL_MARKER_LABELS: [&str; 2] = ["Custom Email Number", "Email Status"];

fn field_label(label: &str) -> Selector {
    Selector::xpath(format!(
        "//span[contains(@class,'test-id__field-label') and normalize-space()='{label}']"
    ))
}

/// One mailbox sync record
#[derive(Debug)]
pub struct MailboxSyncRecordPage {
    page: PageHandle,
    reader: FieldValueReader,
}

impl PageObject for MailboxSyncRecordPage {
    fn bind(page: PageHandle) -> Self {
        let reader = FieldValueReader::new(page.clone());
        Self { page, reader }
    }

    fn url_pattern(&self) -> &str {
        "/lightning/r/:object/:id/view"
    }
}

impl MailboxSyncRecordPage {
    /// Displayed value of a labeled field
    pub async fn field_value(&self, label: &str) -> ProbeResult<String> {
        self.reader.field_value(label, self.page.field_timeout()).await
    }

    /// Values for several labels; misses carry a not-found marker
    pub async fn field_values(&self, labels: &[&str]) -> FieldValues {
        self.reader.field_values(labels, self.page.field_timeout()).await
    }

    /// Follow the EMAIL tile to the related Custom Email record
    pub async fn open_email_link(&self) -> ProbeResult<()> {
        self.page
            .click(&Selector::css_with_text(EMAIL_TILE_LINK, "EMAIL"))
            .await?;

        let pattern = Regex::new(CUSTOM_EMAIL_URL).map_err(|e| ProbeError::page(e.to_string()))?;
        if let Err(err) = self.page.wait_for_url(&pattern, EMAIL_URL_TIMEOUT).await {
            tracing::debug!(error = %err, "custom email URL not seen");
        }

        let markers = EMAIL_MARKER_LABELS
            .iter()
            .map(|label| field_label(label))
            .chain(std::iter::once(Selector::css_with_text("h1", "Email")));
        for marker in markers {
            if self
                .page
                .wait_for_visible(&marker, EMAIL_MARKER_TIMEOUT)
                .await
                .is_ok()
            {
                tracing::info!(%marker, "custom email page loaded");
                return Ok(());
            }
        }
        tracing::warn!("custom email page markers not seen");
        Ok(())
    }

    /// Open the related email and read its status
    pub async fn email_status(&self) -> ProbeResult<String> {
        self.open_email_link().await?;
        CustomEmailPage::bind(self.page.clone())
            .status_value(STATUS_TIMEOUT)
            .await
    }
}
