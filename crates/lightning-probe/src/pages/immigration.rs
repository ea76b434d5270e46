//! Immigration list view and Immigration record view.

use std::time::Duration;

use crate::field_reader::FieldValueReader;
use crate::page::PageHandle;
use crate::page_object::PageObject;
use crate::result::ProbeResult;
use crate::selector::Selector;

const NAME_HEADER: &str = "th[data-label='Immigration Name']";
const CAP_NOMINEE_CONTAINER: &str =
    "[data-target-selection-name='sfdc:RecordField.WCT_Immigration__c.CAP_Nominee__c']";
const INITIATION_PERIOD_LABEL: &str = "div.test-id__field-label-container.slds-form-element__label";
const INITIATION_PERIOD_TEXT: &str = "Initiation Period (CI)";

/// Immigration object list view
#[derive(Debug)]
pub struct ImmigrationHomePage {
    page: PageHandle,
}

impl PageObject for ImmigrationHomePage {
    fn bind(page: PageHandle) -> Self {
        Self { page }
    }

    fn url_pattern(&self) -> &str {
        "/lightning/o/WCT_Immigration__c/**"
    }
}

impl ImmigrationHomePage {
    /// Open the first record in the list through its name cell
    pub async fn open_first_record(&self, timeout: Duration) -> ProbeResult<()> {
        let header = Selector::css(NAME_HEADER);
        self.page.wait_for_visible(&header, timeout).await?;
        self.page.click(&header).await?;
        tracing::info!("opened first immigration record");
        Ok(())
    }

    /// Open the record whose link reads `record_id` (e.g. "I-23357")
    pub async fn open_record_by_id(&self, record_id: &str, timeout: Duration) -> ProbeResult<()> {
        let link = Selector::role("link", record_id);
        self.page.wait_for_visible(&link, timeout).await?;
        self.page.click(&link).await?;
        tracing::info!(record_id, "opened immigration record");
        Ok(())
    }
}

fn cap_nominee_value_node() -> Selector {
    let c = CAP_NOMINEE_CONTAINER;
    Selector::css(format!(
        "{c} lightning-formatted-text, {c} .test-id__field-value, {c} .slds-form-element__static"
    ))
}

/// One Immigration record
#[derive(Debug)]
pub struct ImmigrationRecordPage {
    page: PageHandle,
    reader: FieldValueReader,
}

impl PageObject for ImmigrationRecordPage {
    fn bind(page: PageHandle) -> Self {
        let reader = FieldValueReader::new(page.clone());
        Self { page, reader }
    }

    fn url_pattern(&self) -> &str {
        "/lightning/r/WCT_Immigration__c/:id/view"
    }
}

impl ImmigrationRecordPage {
    /// Displayed value of a labeled field
    pub async fn field_value(&self, label: &str) -> ProbeResult<String> {
        self.reader.field_value(label, self.page.field_timeout()).await
    }

    /// CAP Nominee, read from its record-field container. Falls back to the
    /// label lookup when the layout renders the field without that container.
    pub async fn cap_nominee_value(&self, timeout: Duration) -> ProbeResult<String> {
        let container = Selector::css(CAP_NOMINEE_CONTAINER);
        if let Err(err) = self.page.wait_for_visible(&container, timeout).await {
            tracing::debug!(error = %err, "CAP Nominee container missing, using label lookup");
            return self.reader.field_value("CAP Nominee", timeout).await;
        }
        self.page.text(&cap_nominee_value_node()).await
    }

    /// Whether the "Initiation Period (CI)" label shows up within `timeout`
    pub async fn is_initiation_period_visible(&self, timeout: Duration) -> bool {
        self.page
            .wait_for_visible(
                &Selector::css_with_text(INITIATION_PERIOD_LABEL, INITIATION_PERIOD_TEXT),
                timeout,
            )
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage};
    use crate::resolution::fixtures::{form_element, record_page};
    use std::sync::Arc;

    const RECORD_URL: &str =
        "https://acme.lightning.force.com/lightning/r/WCT_Immigration__c/a0I1/view";

    mod list_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_open_first_record() {
            let mock = Arc::new(
                MockPage::new()
                    .with_element(NAME_HEADER, MockElement::visible())
                    .with_click_target(NAME_HEADER, RECORD_URL),
            );
            let list = ImmigrationHomePage::bind(PageHandle::new(mock.clone()));
            list.open_first_record(Duration::from_secs(5)).await.unwrap();
            assert!(mock.was_called(&format!("click:css={NAME_HEADER}")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_open_unknown_record_times_out() {
            let mock = Arc::new(MockPage::new());
            let list = ImmigrationHomePage::bind(PageHandle::new(mock.clone()));
            let err = list
                .open_record_by_id("I-404", Duration::from_secs(2))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("I-404"));
            assert!(!mock.was_called("click:"));
        }
    }

    mod record_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_cap_nominee_from_container() {
            let mock = MockPage::new()
                .with_element(CAP_NOMINEE_CONTAINER, MockElement::visible())
                .with_element(cap_nominee_value_node(), MockElement::visible().with_text("  Yes "));
            let record = ImmigrationRecordPage::bind(PageHandle::new(Arc::new(mock)));
            assert_eq!(record.cap_nominee_value(Duration::from_secs(1)).await.unwrap(), "Yes");
        }

        #[tokio::test(start_paused = true)]
        async fn test_cap_nominee_falls_back_to_label() {
            let mock = MockPage::new()
                .with_frames(vec![record_page(vec![form_element("CAP Nominee", "No")])]);
            let record = ImmigrationRecordPage::bind(PageHandle::new(Arc::new(mock)));
            assert_eq!(record.cap_nominee_value(Duration::from_secs(1)).await.unwrap(), "No");
        }

        #[tokio::test(start_paused = true)]
        async fn test_initiation_period_visibility() {
            let label = Selector::css_with_text(INITIATION_PERIOD_LABEL, INITIATION_PERIOD_TEXT);
            let shown = ImmigrationRecordPage::bind(PageHandle::new(Arc::new(
                MockPage::new().with_element(label, MockElement::visible()),
            )));
            let missing = ImmigrationRecordPage::bind(PageHandle::new(Arc::new(MockPage::new())));
            assert!(shown.is_initiation_period_visible(Duration::from_secs(1)).await);
            assert!(!missing.is_initiation_period_visible(Duration::from_secs(1)).await);
        }
    }
}
