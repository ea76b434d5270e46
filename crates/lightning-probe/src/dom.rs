//! DOM snapshots.
//!
//! A [`FrameSnapshot`] is a plain-data copy of one rendering context (the main
//! document or an iframe) taken at a single instant. The locator tiers read
//! snapshots instead of querying the live page, which keeps them pure and lets
//! tests build pages by hand with the [`DomNode`] builder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One element of a captured DOM tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomNode {
    /// Lower-case tag name
    pub tag: String,
    /// Attributes other than `class`
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Class list
    #[serde(default)]
    pub classes: Vec<String>,
    /// Text directly owned by this element (not its children)
    #[serde(default)]
    pub text: String,
    /// Whether the element is rendered and visible
    #[serde(default = "visible_default")]
    pub visible: bool,
    /// Child elements in document order
    #[serde(default)]
    pub children: Vec<DomNode>,
}

const fn visible_default() -> bool {
    true
}

impl DomNode {
    /// Create a visible element with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            classes: Vec::new(),
            text: String::new(),
            visible: true,
            children: Vec::new(),
        }
    }

    /// Add a class (whitespace-separated lists are split)
    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        self.classes
            .extend(class.split_whitespace().map(ToString::to_string));
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set the element's own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Mark the element as not rendered
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Append a child
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// Whether the element carries a class
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Attribute value, if present
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Rendered text of the element and its visible descendants, with
    /// whitespace collapsed. Empty when the element itself is hidden.
    #[must_use]
    pub fn inner_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, parts: &mut Vec<&'a str>) {
        if !self.visible {
            return;
        }
        parts.extend(self.text.split_whitespace());
        for child in &self.children {
            child.collect_text(parts);
        }
    }

    /// Pre-order traversal of this element and all descendants
    pub fn descendants(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// First descendant (or self) in document order satisfying `pred`
    #[must_use]
    pub fn find(&self, pred: impl Fn(&Self) -> bool) -> Option<&Self> {
        self.descendants().find(|n| pred(n))
    }

    /// Number of descendants (or self) satisfying `pred`
    #[must_use]
    pub fn count(&self, pred: impl Fn(&Self) -> bool) -> usize {
        self.descendants().filter(|n| pred(n)).count()
    }

    /// Depth-first walk that also passes the ancestor chain (root first).
    /// Stops at the first `Some` returned by `visit`.
    pub fn walk_with_ancestors<'a, T>(
        &'a self,
        visit: &mut impl FnMut(&'a Self, &[&'a Self]) -> Option<T>,
    ) -> Option<T> {
        let mut ancestors = Vec::new();
        self.walk_inner(&mut ancestors, visit)
    }

    fn walk_inner<'a, T>(
        &'a self,
        ancestors: &mut Vec<&'a Self>,
        visit: &mut impl FnMut(&'a Self, &[&'a Self]) -> Option<T>,
    ) -> Option<T> {
        if let Some(found) = visit(self, ancestors) {
            return Some(found);
        }
        ancestors.push(self);
        for child in &self.children {
            if let Some(found) = child.walk_inner(ancestors, visit) {
                ancestors.pop();
                return Some(found);
            }
        }
        ancestors.pop();
        None
    }
}

/// Plain-data copy of one rendering context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Document URL
    pub url: String,
    /// Frame name attribute, empty for the main document
    #[serde(default)]
    pub name: String,
    /// False for cross-origin frames whose DOM cannot be read
    #[serde(default = "visible_default")]
    pub accessible: bool,
    /// Body element, absent when inaccessible or not yet loaded
    #[serde(default)]
    pub root: Option<DomNode>,
}

impl FrameSnapshot {
    /// Snapshot of a readable document
    #[must_use]
    pub fn new(url: impl Into<String>, root: DomNode) -> Self {
        Self {
            url: url.into(),
            name: String::new(),
            accessible: true,
            root: Some(root),
        }
    }

    /// Snapshot of a frame whose content could not be read
    #[must_use]
    pub fn inaccessible(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: String::new(),
            accessible: false,
            root: None,
        }
    }

    /// Set the frame name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Root element when the frame is readable
    #[must_use]
    pub fn readable_root(&self) -> Option<&DomNode> {
        if self.accessible {
            self.root.as_ref()
        } else {
            None
        }
    }
}
