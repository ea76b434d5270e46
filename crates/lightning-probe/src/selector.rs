//! Element selectors and their JavaScript query forms.
//!
//! Page objects describe elements with a [`Selector`]; the browser adapter
//! turns a selector into a query expression evaluated in the page, and the
//! mock driver uses it as a table key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// CSS selector (e.g., "button[title='App Launcher']")
    Css(String),
    /// XPath selector
    XPath(String),
    /// ARIA role with accessible name (e.g., combobox "Category")
    Role {
        /// ARIA role
        role: String,
        /// Accessible name
        name: String,
    },
    /// Text content selector
    Text(String),
    /// Combined selector with text filter
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// Selector evaluated inside the document of a same-origin iframe
    InFrame {
        /// CSS selector for the iframe element
        frame: String,
        /// Selector inside the frame
        inner: Box<Selector>,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a CSS selector filtered by contained text
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Select inside an iframe
    #[must_use]
    pub fn in_frame(frame: impl Into<String>, inner: Self) -> Self {
        Self::InFrame {
            frame: frame.into(),
            inner: Box::new(inner),
        }
    }

    /// JavaScript expression yielding every matching element as an array
    #[must_use]
    pub fn to_all_query(&self) -> String {
        self.all_in("document")
    }

    fn all_in(&self, doc: &str) -> String {
        match self {
            Self::Css(s) => format!("Array.from({doc}.querySelectorAll({}))", js_string(s)),
            Self::XPath(s) => format!(
                "(() => {{ const r = {doc}.evaluate({}, {doc}, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 return Array.from({{ length: r.snapshotLength }}, \
                 (_, i) => r.snapshotItem(i)); }})()",
                js_string(s)
            ),
            Self::Role { role, name } => format!(
                "Array.from({doc}.querySelectorAll({sel})).filter(el => \
                 ((el.getAttribute('aria-label') || el.getAttribute('placeholder') || \
                 (el.labels && el.labels[0] && el.labels[0].textContent) || el.textContent || '') \
                 .replace(/\\s+/g, ' ').trim()).includes({name}))",
                sel = js_string(&role_css(role)),
                name = js_string(name),
            ),
            Self::Text(t) => format!(
                "Array.from({doc}.querySelectorAll('body *')).filter(el => \
                 el.children.length === 0 && el.textContent.includes({}))",
                js_string(t)
            ),
            Self::CssWithText { css, text } => format!(
                "Array.from({doc}.querySelectorAll({})).filter(el => \
                 el.textContent.includes({}))",
                js_string(css),
                js_string(text)
            ),
            Self::InFrame { frame, inner } => format!(
                "Array.from({doc}.querySelectorAll({})).flatMap(f => {{ \
                 try {{ return f.contentDocument ? {} : []; }} catch (e) {{ return []; }} }})",
                js_string(frame),
                inner.all_in("f.contentDocument")
            ),
        }
    }

    /// JavaScript expression yielding the first match, or null
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("({}[0] || null)", self.to_all_query())
    }

    /// JavaScript expression counting matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("{}.length", self.to_all_query())
    }

    /// JavaScript expression: is any match rendered and visible
    #[must_use]
    pub fn to_visible_query(&self) -> String {
        format!("{}.some({VISIBLE_FN})", self.to_all_query())
    }

    /// JavaScript expression: inner text of the first visible match, or null
    #[must_use]
    pub fn to_text_query(&self) -> String {
        format!(
            "(() => {{ const el = {}.find({VISIBLE_FN}); return el ? el.innerText : null; }})()",
            self.to_all_query()
        )
    }
}

/// Quote a value for use inside a CSS attribute selector
#[must_use]
pub fn css_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

const VISIBLE_FN: &str = "el => { const s = getComputedStyle(el); \
    return s.visibility !== 'hidden' && s.display !== 'none' && \
    !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length); }";

fn role_css(role: &str) -> String {
    let implicit = match role {
        "button" => ", button, input[type='button'], input[type='submit']",
        "combobox" => ", select, input[role='combobox']",
        "option" => ", option, lightning-base-combobox-item",
        "link" => ", a[href]",
        "textbox" => ", input[type='text'], input:not([type]), textarea",
        "checkbox" => ", input[type='checkbox']",
        _ => "",
    };
    format!("[role='{role}']{implicit}")
}

/// `s` as a JavaScript string literal
pub(crate) fn js_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::Role { role, name } => write!(f, "role={role}[name=\"{name}\"]"),
            Self::Text(t) => write!(f, "text=\"{t}\""),
            Self::CssWithText { css, text } => write!(f, "{css}:has-text(\"{text}\")"),
            Self::InFrame { frame, inner } => write!(f, "{frame} >> {inner}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(css: &str) -> Self {
        Self::css(css)
    }
}
