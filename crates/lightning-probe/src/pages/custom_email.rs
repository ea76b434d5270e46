//! Custom Email record page reached from a mailbox record's EMAIL tile.

use std::time::Duration;

use crate::label::is_edit_hint;
use crate::page::PageHandle;
use crate::page_object::PageObject;
use crate::result::{ProbeError, ProbeResult};
use crate::retry::{poll_until, DEFAULT_POLL_INTERVAL_MS};
use crate::selector::Selector;

/// Default budget for reading the status (10s)
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

const NUMBER_LABEL: &str =
    "//span[contains(@class,'test-id__field-label') and normalize-space()='Custom Email Number']";

pub(crate) fn field_value_under(label: &str) -> Selector {
    Selector::xpath(format!(
        "//div[contains(@class,'slds-form-element')]\
         [.//span[contains(@class,'test-id__field-label') and normalize-space()='{label}']]\
         //span[contains(@class,'test-id__field-value')]"
    ))
}

fn output_slot_under(label: &str) -> Selector {
    Selector::xpath(format!(
        "//div[contains(@class,'slds-form-element')]\
         [.//span[contains(@class,'test-id__field-label') and normalize-space()='{label}']]\
         //slot[@name='outputField']//lightning-formatted-text"
    ))
}

/// Status cell in the same layout row as "Custom Email Number"
fn status_beside_number() -> Selector {
    Selector::xpath(
        "//span[text()='Custom Email Number']\
         /ancestor::div[contains(@class,'records-record-layout-row') \
         or contains(@class,'slds-grid')][1]//div[contains(@class,'slds-form-element') and \
         .//span[contains(@class,'test-id__field-label') and normalize-space(text())='Status']]\
         //span[contains(@class,'test-id__field-value')]",
    )
}

/// Custom Email record view
#[derive(Debug)]
pub struct CustomEmailPage {
    page: PageHandle,
    candidates: Vec<Selector>,
}

impl PageObject for CustomEmailPage {
    fn bind(page: PageHandle) -> Self {
        Self {
            page,
            candidates: vec![
                field_value_under("Email Status"),
                output_slot_under("Email Status"),
                status_beside_number(),
                field_value_under("Status"),
                output_slot_under("Status"),
            ],
        }
    }

    fn url_pattern(&self) -> &str {
        "/lightning/r/Custom_Email_2__c/:id/view"
    }

    fn load_timeout_ms(&self) -> u64 {
        STATUS_TIMEOUT.as_millis() as u64
    }
}

impl CustomEmailPage {
    /// Wait for the "Custom Email Number" label; gives up quietly
    pub async fn wait_until_loaded(&self, timeout: Duration) {
        if let Err(err) = self
            .page
            .wait_for_visible(&Selector::xpath(NUMBER_LABEL), timeout)
            .await
        {
            tracing::debug!(error = %err, "custom email page not confirmed loaded");
        }
    }

    /// First visible, non-empty status from the ordered candidates.
    /// Text that reads like an edit affordance ("Change ...") is skipped.
    pub async fn status_value(&self, timeout: Duration) -> ProbeResult<String> {
        self.wait_until_loaded(timeout).await;

        let page = &self.page;
        let candidates = &self.candidates;
        let interval = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);
        let found = poll_until(timeout, interval, || async move {
            for candidate in candidates {
                if let Ok(Some(text)) = page.driver().inner_text(candidate).await {
                    let text = text.trim();
                    if !text.is_empty() && !is_edit_hint(text) {
                        return Some(text.to_string());
                    }
                }
            }
            None
        })
        .await;

        match found {
            Ok(status) => {
                tracing::info!(status = %status, "email status read");
                Ok(status)
            }
            Err(_) => {
                self.log_candidates().await;
                let url = self.page.url().await.unwrap_or_default();
                Err(ProbeError::Timeout {
                    what: format!("Status value (url={url})"),
                    ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn log_candidates(&self) {
        for candidate in &self.candidates {
            let count = self.page.count(candidate).await.unwrap_or(0);
            let visible = self.page.is_visible(candidate).await.unwrap_or(false);
            tracing::debug!(selector = %candidate, count, visible, "status candidate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage};
    use std::sync::Arc;

    fn email_page(mock: MockPage) -> CustomEmailPage {
        CustomEmailPage::bind(PageHandle::new(Arc::new(mock)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefers_email_status_over_status() {
        let page = email_page(
            MockPage::new()
                .with_element(
                    field_value_under("Email Status"),
                    MockElement::visible().with_text(" Sent "),
                )
                .with_element(
                    field_value_under("Status"),
                    MockElement::visible().with_text("Open"),
                ),
        );
        assert_eq!(page.status_value(STATUS_TIMEOUT).await.unwrap(), "Sent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_edit_hint_and_hidden_candidates() {
        let page = email_page(
            MockPage::new()
                .with_element(
                    field_value_under("Email Status"),
                    MockElement::visible().with_text("Change Email Status"),
                )
                .with_element(
                    output_slot_under("Email Status"),
                    MockElement::hidden().with_text("Draft"),
                )
                .with_element(status_beside_number(), MockElement::visible().with_text("Sent")),
        );
        assert_eq!(page.status_value(STATUS_TIMEOUT).await.unwrap(), "Sent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_late_value() {
        let page = email_page(MockPage::new().with_element(
            output_slot_under("Status"),
            MockElement::visible().with_text("Sent").after(Duration::from_secs(3)),
        ));
        assert_eq!(page.status_value(STATUS_TIMEOUT).await.unwrap(), "Sent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_nothing_usable() {
        let page = email_page(
            MockPage::new()
                .with_url("https://acme.lightning.force.com/lightning/r/Custom_Email_2__c/a0X/view")
                .with_element(
                    field_value_under("Email Status"),
                    MockElement::visible().with_text("   "),
                ),
        );
        let err = page.status_value(Duration::from_secs(2)).await.unwrap_err();
        assert!(err.to_string().contains("Custom_Email_2__c"));
    }
}
