//! Page Object Model support
//!
//! Every screen is a [`PageObject`] bound to the active [`PageHandle`]. The
//! session keeps one instance per page-object type in a [`PageObjectCache`].
//!
//! The cache never notices a tab change by itself. `Session::replace_page`
//! calls [`PageObjectCache::invalidate`]; an `Arc<P>` obtained before that
//! call still drives the old tab.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::page::PageHandle;

/// A page or component of the UI.
///
/// ```ignore
/// #[derive(Debug)]
/// struct LoginPage { page: PageHandle }
///
/// impl PageObject for LoginPage {
///     fn bind(page: PageHandle) -> Self { Self { page } }
///     fn url_pattern(&self) -> &str { "/" }
/// }
/// ```
pub trait PageObject: Send + Sync + 'static {
    /// Build the page object around the active page
    fn bind(page: PageHandle) -> Self
    where
        Self: Sized;

    /// URL pattern that matches this page (e.g., "/lightning/r/*/:id/view").
    /// [`PageHandle::wait_for_page`] waits for the live URL to match it.
    fn url_pattern(&self) -> &str;

    /// Budget for [`PageHandle::wait_for_page`] (in milliseconds)
    fn load_timeout_ms(&self) -> u64 {
        30000
    }

    /// Page name for logging
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// One instance per page-object type
#[derive(Debug, Default)]
pub struct PageObjectCache {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl PageObjectCache {
    /// Empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached instance of `P`, binding it to `page` on first use.
    /// Later calls return the same `Arc` and ignore `page`.
    pub fn get_or_bind<P: PageObject>(&mut self, page: &PageHandle) -> Arc<P> {
        let key = TypeId::of::<P>();
        if let Some(existing) = self
            .entries
            .get(&key)
            .and_then(|entry| Arc::clone(entry).downcast::<P>().ok())
        {
            return existing;
        }
        tracing::debug!(page_object = std::any::type_name::<P>(), "page object created");
        let instance = Arc::new(P::bind(page.clone()));
        self.entries.insert(key, instance.clone());
        instance
    }

    /// Whether `P` is cached
    #[must_use]
    pub fn contains<P: PageObject>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<P>())
    }

    /// Drop every entry
    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(count = self.entries.len(), "page object cache invalidated");
        }
        self.entries.clear();
    }

    /// Number of cached instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No cached instances
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// URL pattern matcher for page objects
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    pattern: String,
    segments: Vec<UrlSegment>,
}

#[derive(Debug, Clone)]
enum UrlSegment {
    Literal(String),
    Wildcard,
    Rest,
    Parameter(String),
}

/// Path part of a URL: no scheme, host, query, or fragment
fn url_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = if url.contains("://") {
        without_scheme.find('/').map_or("", |i| &without_scheme[i..])
    } else {
        without_scheme
    };
    path.split(['?', '#']).next().unwrap_or("")
}

impl UrlMatcher {
    /// Create a new URL matcher from a pattern
    ///
    /// Patterns support:
    /// - Literal segments: `/lightning/page/home`
    /// - Wildcards: `/lightning/o/*/list`
    /// - Named parameters: `/lightning/r/Mailbox_Sync__c/:id/view`
    /// - A trailing `**` matching any remaining segments
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => UrlSegment::Wildcard,
                "**" => UrlSegment::Rest,
                _ => s.strip_prefix(':').map_or_else(
                    || UrlSegment::Literal(s.to_string()),
                    |name| UrlSegment::Parameter(name.to_string()),
                ),
            })
            .collect();

        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    fn url_segments(url: &str) -> Vec<&str> {
        url_path(url).split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Check if a URL (full or path only) matches the pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let url_segments = Self::url_segments(url);
        let mut i = 0;
        for segment in &self.segments {
            match segment {
                UrlSegment::Rest => return true,
                UrlSegment::Literal(lit) => {
                    if url_segments.get(i) != Some(&lit.as_str()) {
                        return false;
                    }
                }
                UrlSegment::Wildcard | UrlSegment::Parameter(_) => {
                    if i >= url_segments.len() {
                        return false;
                    }
                }
            }
            i += 1;
        }
        i == url_segments.len()
    }

    /// Extract parameters from a URL
    #[must_use]
    pub fn extract_params(&self, url: &str) -> HashMap<String, String> {
        let url_segments = Self::url_segments(url);
        self.segments
            .iter()
            .zip(url_segments)
            .filter_map(|(segment, value)| match segment {
                UrlSegment::Parameter(name) => Some((name.clone(), value.to_string())),
                _ => None,
            })
            .collect()
    }

    /// Get the original pattern
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
