//! Immigration Mailbox Sync list page and global search.

use regex::Regex;
use std::time::Duration;

use crate::field_reader::FieldValueReader;
use crate::page::PageHandle;
use crate::page_object::PageObject;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{css_string, Selector};

const GLOBAL_SEARCH_BUTTON: &str = "button[aria-label='Search']";
const GLOBAL_SEARCH_INPUT: &str = "input.slds-input[placeholder='Search...'][type='search']";
const LIST_VIEW_PICKER: &str = "button[title='Select a List View: Immigration Mailbox Sync']";
const LIST_VIEW_COMBOBOX: &str = "input[role='combobox']";
const LIST_VIEW_ITEM: &str = "div.slds-listbox lightning-base-combobox-formatted-text";
const LIST_VIEW_HEADER: &str = "span.slds-page-header__title";
const RECORD_URL: &str = r"/lightning/r/.*/.*/view";

const SEARCH_INPUT_TIMEOUT: Duration = Duration::from_secs(15);
const RECORD_URL_TIMEOUT: Duration = Duration::from_secs(20);

/// Mailbox sync list view
#[derive(Debug)]
pub struct MailboxSyncHomePage {
    page: PageHandle,
}

impl PageObject for MailboxSyncHomePage {
    fn bind(page: PageHandle) -> Self {
        Self { page }
    }

    fn url_pattern(&self) -> &str {
        "/lightning/o/*/list"
    }
}

fn request_number_cell(index: usize) -> Selector {
    Selector::xpath(format!(
        "(//th[@data-label='IMG Request Number'])[{}]",
        index + 1
    ))
}

fn request_number_cells() -> Selector {
    Selector::css("th[data-label='IMG Request Number']")
}

impl MailboxSyncHomePage {
    /// Open a record by searching its number in global search
    pub async fn open_record_via_global_search(
        &self,
        record_id: &str,
        timeout: Duration,
    ) -> ProbeResult<()> {
        let button = Selector::css(GLOBAL_SEARCH_BUTTON);
        self.page.wait_for_visible(&button, self.page.default_timeout()).await?;
        self.page.click(&button).await?;

        let input = Selector::css(GLOBAL_SEARCH_INPUT);
        self.page.wait_for_visible(&input, SEARCH_INPUT_TIMEOUT).await?;
        self.page.fill(&input, "").await?;
        self.page.fill(&input, record_id).await?;

        let hit = Selector::css_with_text("mark.data-match", record_id);
        self.page.wait_for_visible(&hit, timeout).await?;
        self.page.click(&hit).await?;

        let pattern = Regex::new(RECORD_URL).map_err(|e| ProbeError::page(e.to_string()))?;
        match self.page.wait_for_url(&pattern, RECORD_URL_TIMEOUT).await {
            Ok(url) => tracing::info!(record_id, url = %url, "record opened from global search"),
            Err(err) => tracing::warn!(record_id, error = %err, "record URL not seen"),
        }
        Ok(())
    }

    /// Click the record link titled `record_id` in the list
    pub async fn select_record(&self, record_id: &str) -> ProbeResult<()> {
        self.page
            .click(&Selector::css(format!("a[title={}]", css_string(record_id))))
            .await
    }

    /// Switch the list to the named list view
    pub async fn go_to_list_view(&self, name: &str) -> ProbeResult<()> {
        self.page.click(&Selector::css(LIST_VIEW_PICKER)).await?;
        let combobox = Selector::css(LIST_VIEW_COMBOBOX);
        self.page.click(&combobox).await?;
        self.page.type_text(&combobox, name).await?;

        let item = Selector::css_with_text(LIST_VIEW_ITEM, name);
        self.page.wait_for_visible(&item, self.page.default_timeout()).await?;
        self.page.click(&item).await
    }

    /// Whether the list view header shows `name` within `timeout`
    pub async fn is_list_view_loaded(&self, name: &str, timeout: Duration) -> bool {
        self.page
            .wait_for_visible(&Selector::css_with_text(LIST_VIEW_HEADER, name), timeout)
            .await
            .is_ok()
    }

    /// Open each of the first `n` records, read its "Record Type" and come
    /// back to the list
    pub async fn record_types_of_first(&self, n: usize) -> ProbeResult<Vec<String>> {
        let total = self.page.count(&request_number_cells()).await?;
        let reader = FieldValueReader::new(self.page.clone());
        let mut types = Vec::with_capacity(n.min(total));
        for index in 0..n.min(total) {
            self.page.click(&request_number_cell(index)).await?;
            let value = reader
                .field_value("Record Type", self.page.field_timeout())
                .await?;
            tracing::info!(index, record_type = %value, "record type read");
            types.push(value);
            self.page.go_back().await?;
        }
        Ok(types)
    }
}
