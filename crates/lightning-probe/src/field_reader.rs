//! Field Value Reader
//!
//! Reads the displayed value of labeled fields on a record page. A batch read
//! never fails as a whole: a label that cannot be resolved gets a not-found
//! marker in its slot and the remaining labels are still read.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::page::PageHandle;
use crate::result::ProbeResult;

/// Prefix of the marker stored for unresolved labels
pub const NOT_FOUND_PREFIX: &str = "<not-found: ";

/// Marker text for an unresolved label
#[must_use]
pub fn not_found_marker(message: &str) -> String {
    format!("{NOT_FOUND_PREFIX}{message}>")
}

/// Whether a value is a not-found marker
#[must_use]
pub fn is_not_found_marker(value: &str) -> bool {
    value.starts_with(NOT_FOUND_PREFIX) && value.ends_with('>')
}

/// Ordered label/value pairs from a batch read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValues {
    entries: Vec<(String, String)>,
}

impl FieldValues {
    /// Empty result set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label and its value (or marker)
    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.entries.push((label.into(), value.into()));
    }

    /// Value for a label; markers are returned as-is
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the label resolved to a real value
    #[must_use]
    pub fn is_found(&self, label: &str) -> bool {
        self.get(label).is_some_and(|v| !is_not_found_marker(v))
    }

    /// Pairs in input order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    /// Labels that did not resolve
    #[must_use]
    pub fn missing(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, v)| is_not_found_marker(v))
            .map(|(l, _)| l)
            .collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a FieldValues {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Reads labeled field values from the active page
#[derive(Debug, Clone)]
pub struct FieldValueReader {
    page: PageHandle,
}

impl FieldValueReader {
    /// Reader over a page
    #[must_use]
    pub const fn new(page: PageHandle) -> Self {
        Self { page }
    }

    /// Displayed value of one field
    pub async fn field_value(&self, label: &str, timeout: Duration) -> ProbeResult<String> {
        let resolution = self.page.resolve_field(label, timeout).await?;
        tracing::info!(
            label,
            value = %resolution.value,
            strategy = %resolution.strategy,
            frame = resolution.frame_index,
            "field value read"
        );
        Ok(resolution.value)
    }

    /// Values for every label, each with its own budget
    pub async fn field_values(&self, labels: &[&str], timeout_per_field: Duration) -> FieldValues {
        let mut values = FieldValues::new();
        for label in labels {
            match self.field_value(label, timeout_per_field).await {
                Ok(value) => values.push(*label, value),
                Err(err) => {
                    tracing::error!(label, error = %err, "field value not found");
                    values.push(*label, not_found_marker(&err.to_string()));
                }
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockPage;
    use crate::resolution::fixtures::{data_label_item, form_element, record_page};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn reader(page: MockPage) -> FieldValueReader {
        FieldValueReader::new(PageHandle::new(Arc::new(page)))
    }

    mod batch_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_missing_label_gets_marker_and_siblings_resolve() {
            let page = MockPage::new().with_frames(vec![record_page(vec![
                form_element("Record Type", "Inquiry"),
                form_element("Case Origin", "Web"),
            ])]);
            let values = reader(page)
                .field_values(
                    &["Record Type", "Missing Field", "Case Origin"],
                    Duration::from_secs(1),
                )
                .await;

            let labels: Vec<_> = values.iter().map(|(l, _)| l).collect();
            assert_eq!(labels, ["Record Type", "Missing Field", "Case Origin"]);
            assert_eq!(values.get("Record Type"), Some("Inquiry"));
            assert_eq!(values.get("Case Origin"), Some("Web"));
            assert!(!values.is_found("Missing Field"));
            let marker = values.get("Missing Field").unwrap();
            assert!(marker.starts_with("<not-found: "));
            assert!(marker.contains("Missing Field"));
            assert_eq!(values.missing(), ["Missing Field"]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_each_label_gets_its_own_budget() {
            let page = MockPage::new().with_frames(vec![record_page(vec![])]);
            let start = Instant::now();
            let values = reader(page)
                .field_values(&["A", "B"], Duration::from_secs(2))
                .await;
            assert_eq!(values.len(), 2);
            assert!(start.elapsed() >= Duration::from_secs(4));
        }

        #[tokio::test]
        async fn test_empty_label_is_marked_not_thrown() {
            let page = MockPage::new().with_frames(vec![record_page(vec![])]);
            let values = reader(page).field_values(&[""], Duration::from_secs(1)).await;
            assert!(!values.is_found(""));
        }
    }

    mod single_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_field_value_from_data_label() {
            let page = MockPage::new().with_frames(vec![record_page(vec![data_label_item(
                "IMG Request Number",
                "IMG-000123",
            )])]);
            let value = reader(page)
                .field_value("IMG Request Number", Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(value, "IMG-000123");
        }
    }

    mod marker_tests {
        use super::*;

        #[test]
        fn test_marker_round_trip() {
            let marker = not_found_marker("timed out");
            assert_eq!(marker, "<not-found: timed out>");
            assert!(is_not_found_marker(&marker));
            assert!(!is_not_found_marker("Sent"));
        }
    }
}
