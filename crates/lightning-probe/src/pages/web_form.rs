//! IXT Mailbox web form: dropdowns, travel dates, inquiry text and submission.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use crate::page::PageHandle;
use crate::page_object::PageObject;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::Selector;

const INQUIRY_TEXTBOX: &str = "div[class*='slds-rich-text-area']";
const BRAND_BUTTON: &str = "button.slds-button.slds-button_brand";
const THANK_YOU: &str = "p.slds-p-left_small";
const CONFIRM_MODAL: &str = "div.slds-modal__container";
const TRAVEL_START: &str = "input[name='travelStartDate']";
const TRAVEL_END: &str = "input[name='travelEndDate']";
const NAME_BADGE: &str = "h2.slds-card__header-title span.slds-truncate";
const EMAIL_BADGE: &str = "div.slds-var-p-horizontal_medium i a";

/// Text entered when the form data carries none
pub const DEFAULT_INQUIRY_TEXT: &str = "Playwright Automation";

const DROPDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);
const SUCCESS_TIMEOUT: Duration = Duration::from_secs(15);
const BADGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Values for one web form submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IxtFormData {
    pub requestor_type: String,
    pub category: String,
    pub subcategory_1: String,
    #[serde(default)]
    pub permiso_online_assessment: Option<String>,
    #[serde(default)]
    pub country_of_travel_1: Option<String>,
    #[serde(default)]
    pub country_of_travel_2: Option<String>,
    #[serde(default)]
    pub country_of_travel_3: Option<String>,
    #[serde(default)]
    pub upcoming_travel_start: Option<NaiveDate>,
    #[serde(default)]
    pub upcoming_travel_end: Option<NaiveDate>,
    #[serde(default)]
    pub inquiry_text: Option<String>,
}

impl IxtFormData {
    /// Form with the three required dropdowns
    #[must_use]
    pub fn new(
        requestor_type: impl Into<String>,
        category: impl Into<String>,
        subcategory_1: impl Into<String>,
    ) -> Self {
        Self {
            requestor_type: requestor_type.into(),
            category: category.into(),
            subcategory_1: subcategory_1.into(),
            ..Self::default()
        }
    }

    /// Dropdown label and option pairs in form order, optional ones skipped
    #[must_use]
    pub fn dropdowns(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("Requestor Type", self.requestor_type.as_str()),
            ("Category", self.category.as_str()),
            ("Subcategory 1", self.subcategory_1.as_str()),
        ];
        let optional = [
            ("Permiso Online Assessment", &self.permiso_online_assessment),
            ("Country of Travel 1", &self.country_of_travel_1),
            ("Country of Travel 2", &self.country_of_travel_2),
            ("Country of Travel 3", &self.country_of_travel_3),
        ];
        pairs.extend(
            optional
                .into_iter()
                .filter_map(|(label, value)| value.as_deref().map(|v| (label, v))),
        );
        pairs
    }
}

fn inquiry_number_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b(IXT-\d+)\b").ok())
        .as_ref()
}

/// Pull an inquiry number such as `IXT-12345` out of a success message
#[must_use]
pub fn extract_inquiry_number(message: &str) -> Option<String> {
    inquiry_number_pattern()?
        .captures(message)
        .map(|c| c[1].to_string())
}

fn brand_button(text: &str) -> Selector {
    Selector::css_with_text(BRAND_BUTTON, text)
}

fn acknowledgment_candidates() -> [Selector; 2] {
    [
        Selector::css("input[type='checkbox'][name*='acknowledg' i]"),
        Selector::css("span.slds-checkbox_faux"),
    ]
}

/// The IXT web form
#[derive(Debug)]
pub struct WebFormPage {
    page: PageHandle,
}

impl PageObject for WebFormPage {
    fn bind(page: PageHandle) -> Self {
        Self { page }
    }

    fn url_pattern(&self) -> &str {
        "/lightning/n/**"
    }
}

impl WebFormPage {
    /// Open a combobox by its accessible name
    pub async fn open_dropdown(&self, label: &str) -> ProbeResult<()> {
        let combo = Selector::role("combobox", label);
        self.page.wait_for_visible(&combo, DROPDOWN_TIMEOUT).await?;
        self.page.click(&combo).await
    }

    /// Pick an option from the open listbox
    pub async fn select_option(&self, option: &str) -> ProbeResult<()> {
        let opt = Selector::role("option", option);
        self.page.wait_for_visible(&opt, DROPDOWN_TIMEOUT).await?;
        self.page.click(&opt).await
    }

    /// Open `label` and pick `option`
    pub async fn select_dropdown(&self, label: &str, option: &str) -> ProbeResult<()> {
        self.open_dropdown(label).await?;
        self.select_option(option).await?;
        tracing::info!(label, option, "dropdown selected");
        Ok(())
    }

    /// Tick the acknowledgment checkbox
    pub async fn check_acknowledgment(&self) -> ProbeResult<()> {
        let checkbox = self
            .page
            .first_visible(&acknowledgment_candidates(), self.page.default_timeout())
            .await?;
        self.page.click(&checkbox).await?;
        tracing::info!("acknowledgment checked");
        Ok(())
    }

    async fn set_date(&self, input: &str, date: NaiveDate) -> ProbeResult<()> {
        let field = Selector::css(input);
        self.page.wait_for_visible(&field, DROPDOWN_TIMEOUT).await?;
        self.page.fill(&field, date).await?;
        self.page.press_key("Tab").await
    }

    pub async fn set_travel_start(&self, date: NaiveDate) -> ProbeResult<()> {
        self.set_date(TRAVEL_START, date).await
    }

    pub async fn set_travel_end(&self, date: NaiveDate) -> ProbeResult<()> {
        self.set_date(TRAVEL_END, date).await
    }

    /// Write into the "Describe your inquiry" rich text area
    pub async fn enter_inquiry(&self, text: &str) -> ProbeResult<()> {
        let textbox = Selector::css(INQUIRY_TEXTBOX);
        self.page.click(&textbox).await?;
        self.page.fill(&textbox, text).await
    }

    pub async fn submit(&self) -> ProbeResult<()> {
        self.page.click(&brand_button("Submit")).await
    }

    /// Confirm the submission modal and wait for it to close
    pub async fn confirm_yes(&self) -> ProbeResult<()> {
        let modal = Selector::css(CONFIRM_MODAL);
        self.page.wait_for_visible(&modal, CONFIRM_TIMEOUT).await?;
        self.page.click(&brand_button("Yes")).await?;
        self.page.wait_for_hidden(&modal, CONFIRM_TIMEOUT).await
    }

    /// Click a button by its label. Submit and Yes use the form's own buttons.
    pub async fn click_button(&self, label: &str) -> ProbeResult<()> {
        if label.eq_ignore_ascii_case("yes") {
            self.confirm_yes().await
        } else if label.eq_ignore_ascii_case("submit") {
            self.submit().await
        } else {
            self.page.click(&Selector::role("button", label)).await
        }
    }

    /// Thank-you text shown after submission
    pub async fn success_message(&self) -> ProbeResult<String> {
        let message = Selector::css(THANK_YOU);
        self.page.wait_for_visible(&message, SUCCESS_TIMEOUT).await?;
        self.page.text(&message).await
    }

    /// Whether the requestor's name shows on the form header
    pub async fn is_name_visible(&self, name: &str) -> bool {
        self.page
            .wait_for_visible(&Selector::css_with_text(NAME_BADGE, name), BADGE_TIMEOUT)
            .await
            .is_ok()
    }

    /// Whether the requestor's email shows on the form
    pub async fn is_email_visible(&self, email: &str) -> bool {
        self.page
            .wait_for_visible(&Selector::css_with_text(EMAIL_BADGE, email), BADGE_TIMEOUT)
            .await
            .is_ok()
    }

    /// Return to the Salesforce tab the form was opened from
    pub async fn go_back_to_salesforce(&self) -> ProbeResult<()> {
        self.page.go_back().await
    }

    /// Fill every field, submit, confirm and return the inquiry number
    pub async fn fill_form(&self, data: &IxtFormData) -> ProbeResult<String> {
        for (label, option) in data.dropdowns() {
            self.select_dropdown(label, option).await?;
        }
        if let Some(start) = data.upcoming_travel_start {
            self.set_travel_start(start).await?;
        }
        if let Some(end) = data.upcoming_travel_end {
            self.set_travel_end(end).await?;
        }
        self.enter_inquiry(data.inquiry_text.as_deref().unwrap_or(DEFAULT_INQUIRY_TEXT))
            .await?;
        self.submit().await?;
        self.confirm_yes().await?;

        let message = self.success_message().await?;
        let number = extract_inquiry_number(&message).ok_or_else(|| {
            ProbeError::assertion(format!("no IXT number in success message: {message}"))
        })?;
        tracing::info!(inquiry = %number, "web form submitted");
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage};
    use std::sync::Arc;

    mod extract_tests {
        use super::*;

        #[test]
        fn test_extracts_number_from_message() {
            assert_eq!(
                extract_inquiry_number("Thank you! Your reference number is IXT-20417.").as_deref(),
                Some("IXT-20417")
            );
        }

        #[test]
        fn test_requires_word_boundary() {
            assert_eq!(extract_inquiry_number("Thank you for your inquiry"), None);
            assert_eq!(extract_inquiry_number("XIXT-12"), None);
            assert_eq!(extract_inquiry_number("IXT-"), None);
        }

        #[test]
        fn test_form_data_from_json() {
            let data: IxtFormData = serde_json::from_str(
                r#"{"requestor_type":"Employee","category":"Travel","subcategory_1":"Visa",
                    "country_of_travel_1":"Spain","upcoming_travel_start":"2025-11-04"}"#,
            )
            .unwrap();
            assert_eq!(data.upcoming_travel_start, NaiveDate::from_ymd_opt(2025, 11, 4));
            assert_eq!(
                data.dropdowns(),
                [
                    ("Requestor Type", "Employee"),
                    ("Category", "Travel"),
                    ("Subcategory 1", "Visa"),
                    ("Country of Travel 1", "Spain"),
                ]
            );
        }
    }

    mod form_tests {
        use super::*;

        fn form_page(data: &IxtFormData) -> MockPage {
            let mut page = MockPage::new()
                .with_element(INQUIRY_TEXTBOX, MockElement::visible())
                .with_element(brand_button("Submit"), MockElement::visible())
                .with_element(brand_button("Yes"), MockElement::visible())
                .with_element(
                    THANK_YOU,
                    MockElement::visible()
                        .with_text("Thank you. Your inquiry IXT-20417 has been received."),
                );
            for (label, option) in data.dropdowns() {
                page = page
                    .with_element(Selector::role("combobox", label), MockElement::visible())
                    .with_element(Selector::role("option", option), MockElement::visible());
            }
            page
        }

        #[tokio::test(start_paused = true)]
        async fn test_fill_form_returns_inquiry_number() {
            let data = IxtFormData::new("Employee", "Travel", "Visa");
            let mock =
                Arc::new(form_page(&data).with_element(CONFIRM_MODAL, MockElement::visible()));
            let form = WebFormPage::bind(PageHandle::new(mock.clone()));

            // the modal closes shortly after Yes is clicked
            let closer = {
                let mock = mock.clone();
                tokio::spawn(async move {
                    let yes = format!("click:{}", brand_button("Yes"));
                    while !mock.was_called(&yes) {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    mock.set_element(CONFIRM_MODAL, MockElement::hidden());
                })
            };

            assert_eq!(form.fill_form(&data).await.unwrap(), "IXT-20417");
            closer.await.unwrap();
            assert_eq!(
                mock.value_of(&Selector::css(INQUIRY_TEXTBOX)).as_deref(),
                Some(DEFAULT_INQUIRY_TEXT)
            );
            assert!(mock.was_called("click:role=combobox[name=\"Subcategory 1\"]"));
            assert!(!mock.was_called("click:role=combobox[name=\"Country of Travel 1\"]"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_travel_dates_filled_and_tabbed() {
            let mock = Arc::new(
                MockPage::new()
                    .with_element(TRAVEL_START, MockElement::visible())
                    .with_element(TRAVEL_END, MockElement::visible()),
            );
            let form = WebFormPage::bind(PageHandle::new(mock.clone()));
            form.set_travel_start(NaiveDate::from_ymd_opt(2025, 11, 4).unwrap())
                .await
                .unwrap();
            assert_eq!(
                mock.value_of(&Selector::css(TRAVEL_START)).as_deref(),
                Some("2025-11-04")
            );
            assert_eq!(mock.call_count("press:Tab"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_option_times_out() {
            let mock = Arc::new(
                MockPage::new()
                    .with_element(Selector::role("combobox", "Category"), MockElement::visible()),
            );
            let form = WebFormPage::bind(PageHandle::new(mock));
            let err = form.select_dropdown("Category", "Travel").await.unwrap_err();
            assert!(matches!(err, ProbeError::Timeout { ms: 5000, .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_acknowledgment_falls_back_to_faux_checkbox() {
            let faux = Selector::css("span.slds-checkbox_faux");
            let mock = Arc::new(MockPage::new().with_element(faux.clone(), MockElement::visible()));
            WebFormPage::bind(PageHandle::new(mock.clone()))
                .check_acknowledgment()
                .await
                .unwrap();
            assert!(mock.was_called(&format!("click:{faux}")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_fill_form_stops_when_modal_never_shows() {
            let data = IxtFormData::new("Employee", "Travel", "Visa");
            let mock = Arc::new(
                form_page(&data)
                    .with_element(THANK_YOU, MockElement::visible().with_text("Thank you.")),
            );
            let form = WebFormPage::bind(PageHandle::new(mock));
            // no modal on screen, so confirmation is the failing step
            assert!(form.fill_form(&data).await.is_err());
            assert_eq!(form.success_message().await.unwrap(), "Thank you.");
        }
    }
}
