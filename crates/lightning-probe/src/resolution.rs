//! Locator Resolution Strategy
//!
//! Finds the displayed value of a labeled field on a Lightning record page.
//! Lightning renders the "same" field differently depending on component type,
//! loading state and frame, so no single selector is reliable. The resolver
//! tries four increasingly permissive tiers:
//!
//! | Rank | Strategy | Rule |
//! |------|----------|------|
//! | 1 | [`MatchStrategy::ExactAttribute`] | label attribute equals the label |
//! | 2 | [`MatchStrategy::AttributeContains`] | container label holds every label word |
//! | 3 | [`MatchStrategy::LabelAncestor`] | label node text equals the label, walk up, scan down |
//! | 4 | [`MatchStrategy::DomainSpecial`] | per-field markup (e.g. Owner) |
//!
//! Tiers are pure functions over a [`DomNode`] snapshot. The resolver polls
//! the page's frames, evaluating each tier against every frame before moving
//! to the next tier, and returns the first accepted value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::dom::{DomNode, FrameSnapshot};
use crate::driver::PageDriver;
use crate::label::{is_edit_hint, LabelQuery};
use crate::result::{ProbeError, ProbeResult};
use crate::retry::{Poller, DEFAULT_POLL_INTERVAL_MS};

/// Default time budget for one field lookup (8 seconds)
pub const DEFAULT_FIELD_TIMEOUT_MS: u64 = 8000;

/// Attributes Lightning uses to carry a field label
pub const LABEL_ATTRIBUTES: [&str; 4] = ["data-label", "aria-label", "title", "data-field-label"];

/// How a candidate selector matches a field label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStrategy {
    /// Label attribute equals the label
    ExactAttribute,
    /// Container label contains every label token
    AttributeContains,
    /// Label text node, nearest structural ancestor, value node below it
    LabelAncestor,
    /// Field-specific markup
    DomainSpecial,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExactAttribute => "exact-attribute",
            Self::AttributeContains => "attribute-contains",
            Self::LabelAncestor => "label-ancestor",
            Self::DomainSpecial => "domain-special",
        };
        f.write_str(name)
    }
}

/// Which frames a candidate applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameScope {
    /// Main document only
    MainOnly,
    /// Main document and every readable iframe
    AllFrames,
}

/// One ranked rule for finding a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSelector {
    /// Matching strategy
    pub strategy: MatchStrategy,
    /// Priority, lower is tried first
    pub rank: u8,
    /// Frames searched
    pub scope: FrameScope,
}

impl CandidateSelector {
    /// Create a candidate
    #[must_use]
    pub const fn new(strategy: MatchStrategy, rank: u8, scope: FrameScope) -> Self {
        Self {
            strategy,
            rank,
            scope,
        }
    }

    /// The four standard tiers in rank order
    #[must_use]
    pub fn standard() -> Vec<Self> {
        vec![
            Self::new(MatchStrategy::ExactAttribute, 1, FrameScope::AllFrames),
            Self::new(MatchStrategy::AttributeContains, 2, FrameScope::AllFrames),
            Self::new(MatchStrategy::LabelAncestor, 3, FrameScope::AllFrames),
            Self::new(MatchStrategy::DomainSpecial, 4, FrameScope::AllFrames),
        ]
    }

    /// Restrict to the main document
    #[must_use]
    pub const fn main_only(mut self) -> Self {
        self.scope = FrameScope::MainOnly;
        self
    }

    /// Whether the frame at `index` is in scope
    #[must_use]
    pub const fn applies_to(&self, frame_index: usize) -> bool {
        match self.scope {
            FrameScope::MainOnly => frame_index == 0,
            FrameScope::AllFrames => true,
        }
    }
}

/// Structural pattern over a DOM node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePattern {
    /// Element with tag
    Tag(&'static str),
    /// Element with class
    Class(&'static str),
    /// Element with tag and class
    TagClass(&'static str, &'static str),
    /// Element with tag below an ancestor with tag
    Within {
        /// Ancestor tag
        ancestor: &'static str,
        /// Element tag
        tag: &'static str,
    },
}

impl NodePattern {
    /// Whether `node`, below `ancestors` (outermost first), matches
    #[must_use]
    pub fn matches(&self, node: &DomNode, ancestors: &[&DomNode]) -> bool {
        match *self {
            Self::Tag(tag) => node.tag == tag,
            Self::Class(class) => node.has_class(class),
            Self::TagClass(tag, class) => node.tag == tag && node.has_class(class),
            Self::Within { ancestor, tag } => {
                node.tag == tag && ancestors.iter().any(|a| a.tag == ancestor)
            }
        }
    }

    fn matches_alone(&self, node: &DomNode) -> bool {
        self.matches(node, &[])
    }
}

impl fmt::Display for NodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.write_str(tag),
            Self::Class(class) => write!(f, "{class}"),
            Self::TagClass(tag, class) => write!(f, "{tag}.{class}"),
            Self::Within { ancestor, tag } => write!(f, "{ancestor}>{tag}"),
        }
    }
}

/// Value nodes in preference order
pub const VALUE_PATTERNS: [NodePattern; 5] = [
    NodePattern::Within {
        ancestor: "slot",
        tag: "span",
    },
    NodePattern::TagClass("span", "owner-name"),
    NodePattern::Class("test-id__field-value"),
    NodePattern::Tag("lightning-formatted-text"),
    NodePattern::Class("slds-form-element__static"),
];

/// Field containers searched by the contains tier
pub const CONTAINER_PATTERNS: [NodePattern; 2] = [
    NodePattern::Class("slds-form-element"),
    NodePattern::Tag("records-record-layout-item"),
];

/// Nodes holding label text
pub const LABEL_PATTERNS: [NodePattern; 3] = [
    NodePattern::Class("test-id__field-label"),
    NodePattern::Class("slds-form-element__label"),
    NodePattern::Tag("label"),
];

/// Ancestors the label-ancestor tier stops at
pub const STRUCTURAL_PATTERNS: [NodePattern; 3] = [
    NodePattern::Class("slds-form-element"),
    NodePattern::Tag("records-record-layout-item"),
    NodePattern::Class("slds-grid"),
];

/// Patterns counted per frame when a lookup fails
pub const DIAGNOSTIC_PATTERNS: [NodePattern; 5] = [
    NodePattern::Class("slds-form-element"),
    NodePattern::Tag("records-record-layout-item"),
    NodePattern::Class("test-id__field-label"),
    NodePattern::Class("test-id__field-value"),
    NodePattern::Tag("lightning-formatted-text"),
];

/// Field whose markup needs its own lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialField {
    /// Label the rule applies to (compared case-folded)
    pub label: &'static str,
    /// Value nodes searched anywhere in the frame, in order
    pub patterns: Vec<NodePattern>,
}

impl SpecialField {
    /// Built-in special cases
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![Self {
            label: "owner",
            patterns: vec![
                NodePattern::TagClass("span", "owner-name"),
                NodePattern::Tag("force-owner-lookup"),
            ],
        }]
    }
}

fn accept(text: &str, query: &LabelQuery) -> bool {
    !text.is_empty() && !query.is_echo(text) && !is_edit_hint(text)
}

fn is_shown(node: &DomNode, ancestors: &[&DomNode]) -> bool {
    node.visible && ancestors.iter().all(|a| a.visible)
}

/// Scan below `container` for the first accepted value, pattern by pattern
fn find_value(container: &DomNode, query: &LabelQuery) -> Option<String> {
    VALUE_PATTERNS.iter().find_map(|pattern| {
        container.walk_with_ancestors(&mut |node, ancestors| {
            if !is_shown(node, ancestors) || !pattern.matches(node, ancestors) {
                return None;
            }
            let text = node.inner_text();
            accept(&text, query).then_some(text)
        })
    })
}

/// Tier 1: an element whose label attribute equals the label
#[must_use]
pub fn exact_attribute(root: &DomNode, query: &LabelQuery) -> Option<String> {
    root.walk_with_ancestors(&mut |node, ancestors| {
        if !is_shown(node, ancestors) {
            return None;
        }
        let labelled = LABEL_ATTRIBUTES
            .iter()
            .filter_map(|attr| node.get_attr(attr))
            .any(|value| query.matches_exact(value));
        if !labelled {
            return None;
        }
        if let Some(value) = find_value(node, query) {
            return Some(value);
        }
        if matches!(node.tag.as_str(), "td" | "th") {
            let text = node.inner_text();
            if accept(&text, query) {
                return Some(text);
            }
        }
        ancestors
            .iter()
            .rev()
            .find(|a| CONTAINER_PATTERNS.iter().any(|p| p.matches_alone(a)))
            .and_then(|container| find_value(container, query))
    })
}

fn container_label(container: &DomNode) -> Option<String> {
    let from_node = container
        .walk_with_ancestors(&mut |node, ancestors| {
            (is_shown(node, ancestors) && LABEL_PATTERNS.iter().any(|p| p.matches_alone(node)))
                .then(|| node.inner_text())
        })
        .filter(|text| !text.is_empty());
    from_node.or_else(|| {
        LABEL_ATTRIBUTES
            .iter()
            .find_map(|attr| container.get_attr(attr))
            .map(ToString::to_string)
    })
}

/// Tier 2: a field container whose label holds every word of the label.
///
/// Tighter labels (fewer extra words) are tried first, then document order.
#[must_use]
pub fn attribute_contains(root: &DomNode, query: &LabelQuery) -> Option<String> {
    let mut candidates = Vec::new();
    let _ = root.walk_with_ancestors(&mut |node, ancestors| -> Option<()> {
        if is_shown(node, ancestors) && CONTAINER_PATTERNS.iter().any(|p| p.matches_alone(node))
        {
            if let Some(label) = container_label(node) {
                if query.matches_all_tokens(&label) {
                    candidates.push((query.extra_words(&label), candidates.len(), node));
                }
            }
        }
        None
    });
    candidates.sort_by_key(|&(extra, order, _)| (extra, order));
    candidates
        .into_iter()
        .find_map(|(_, _, container)| find_value(container, query))
}

/// Tier 3: a label node whose text equals the label; walk up to the nearest
/// structural ancestor and scan it for a value node
#[must_use]
pub fn label_ancestor(root: &DomNode, query: &LabelQuery) -> Option<String> {
    root.walk_with_ancestors(&mut |node, ancestors| {
        if !is_shown(node, ancestors)
            || !LABEL_PATTERNS.iter().any(|p| p.matches_alone(node))
            || !query.matches_exact(&node.inner_text())
        {
            return None;
        }
        ancestors
            .iter()
            .rev()
            .filter(|a| STRUCTURAL_PATTERNS.iter().any(|p| p.matches_alone(a)))
            .find_map(|ancestor| find_value(ancestor, query))
    })
}

/// Tier 4 with the built-in special cases
#[must_use]
pub fn domain_special(root: &DomNode, query: &LabelQuery) -> Option<String> {
    domain_special_with(root, query, &SpecialField::defaults())
}

/// Tier 4: field-specific markup searched anywhere in the frame
#[must_use]
pub fn domain_special_with(
    root: &DomNode,
    query: &LabelQuery,
    specials: &[SpecialField],
) -> Option<String> {
    let special = specials.iter().find(|s| s.label == query.folded())?;
    special.patterns.iter().find_map(|pattern| {
        root.walk_with_ancestors(&mut |node, ancestors| {
            if !is_shown(node, ancestors) || !pattern.matches(node, ancestors) {
                return None;
            }
            let text = node.inner_text();
            accept(&text, query).then_some(text)
        })
    })
}

/// Container counts for one frame, reported on lookup failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    /// Frame URL
    pub url: String,
    /// Whether the frame DOM was readable
    pub accessible: bool,
    /// Count per known container pattern
    pub container_counts: Vec<(String, usize)>,
}

impl FrameDiagnostics {
    /// Count known patterns in a snapshot
    #[must_use]
    pub fn capture(frame: &FrameSnapshot) -> Self {
        let container_counts = frame
            .readable_root()
            .map(|root| {
                DIAGNOSTIC_PATTERNS
                    .iter()
                    .map(|p| (p.to_string(), root.count(|n| p.matches_alone(n))))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            url: frame.url.clone(),
            accessible: frame.accessible,
            container_counts,
        }
    }
}

impl fmt::Display for FrameDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.accessible {
            return write!(f, "{} [inaccessible]", self.url);
        }
        let counts = self
            .container_counts
            .iter()
            .map(|(name, n)| format!("{name}={n}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} [{counts}]", self.url)
    }
}

/// Outcome of a lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    /// Still polling
    Pending,
    /// Value found
    Found {
        /// Rank of the winning tier
        rank: u8,
        /// Frame the value came from
        frame_index: usize,
    },
    /// Budget spent with no match
    NotFound,
    /// Last frame capture failed
    Error(String),
}

/// Bookkeeping for one field lookup; logged and dropped when it returns
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionAttempt {
    /// Label searched for
    pub label: String,
    /// Time spent so far
    pub elapsed: Duration,
    /// Poll cycles run
    pub polls: u32,
    /// Frames examined across all polls
    pub frames_searched: usize,
    /// Tier evaluations across all polls
    pub candidates_tried: usize,
    /// Outcome
    pub outcome: AttemptOutcome,
}

impl ResolutionAttempt {
    fn start(label: &str) -> Self {
        Self {
            label: label.to_string(),
            elapsed: Duration::ZERO,
            polls: 0,
            frames_searched: 0,
            candidates_tried: 0,
            outcome: AttemptOutcome::Pending,
        }
    }

    fn log(&self) {
        tracing::debug!(
            label = %self.label,
            elapsed_ms = self.elapsed.as_millis() as u64,
            polls = self.polls,
            frames = self.frames_searched,
            candidates = self.candidates_tried,
            outcome = ?self.outcome,
            "field resolution finished"
        );
    }
}

/// A resolved field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Displayed value
    pub value: String,
    /// Strategy of the winning tier
    pub strategy: MatchStrategy,
    /// Rank of the winning tier
    pub rank: u8,
    /// Index of the frame (0 = main document)
    pub frame_index: usize,
    /// URL of that frame
    pub frame_url: String,
}

/// Polls a page's frames through the candidate tiers
#[derive(Debug, Clone)]
pub struct Resolver {
    candidates: Vec<CandidateSelector>,
    specials: Vec<SpecialField>,
    poll_interval: Duration,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Resolver with the standard tiers and special cases
    #[must_use]
    pub fn new() -> Self {
        Self {
            candidates: CandidateSelector::standard(),
            specials: SpecialField::defaults(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Replace the candidate list (sorted by rank)
    #[must_use]
    pub fn with_candidates(mut self, mut candidates: Vec<CandidateSelector>) -> Self {
        candidates.sort_by_key(|c| c.rank);
        self.candidates = candidates;
        self
    }

    /// Add a special-case field
    #[must_use]
    pub fn with_special(mut self, special: SpecialField) -> Self {
        self.specials.push(special);
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn evaluate(
        &self,
        candidate: &CandidateSelector,
        root: &DomNode,
        query: &LabelQuery,
    ) -> Option<String> {
        match candidate.strategy {
            MatchStrategy::ExactAttribute => exact_attribute(root, query),
            MatchStrategy::AttributeContains => attribute_contains(root, query),
            MatchStrategy::LabelAncestor => label_ancestor(root, query),
            MatchStrategy::DomainSpecial => domain_special_with(root, query, &self.specials),
        }
    }

    /// One pass over the given frames, tier by tier
    #[must_use]
    pub fn resolve_in(&self, frames: &[FrameSnapshot], query: &LabelQuery) -> Option<Resolution> {
        self.resolve_counted(frames, query, &mut ResolutionAttempt::start(query.as_str()))
    }

    fn resolve_counted(
        &self,
        frames: &[FrameSnapshot],
        query: &LabelQuery,
        attempt: &mut ResolutionAttempt,
    ) -> Option<Resolution> {
        if query.is_empty() {
            return None;
        }
        attempt.frames_searched += frames.len();
        for candidate in &self.candidates {
            for (index, frame) in frames.iter().enumerate() {
                if !candidate.applies_to(index) {
                    continue;
                }
                let Some(root) = frame.readable_root() else {
                    continue;
                };
                attempt.candidates_tried += 1;
                if let Some(value) = self.evaluate(candidate, root, query) {
                    return Some(Resolution {
                        value,
                        strategy: candidate.strategy,
                        rank: candidate.rank,
                        frame_index: index,
                        frame_url: frame.url.clone(),
                    });
                }
            }
        }
        None
    }

    /// Poll the page until the field resolves or `timeout` passes
    pub async fn resolve(
        &self,
        driver: &dyn PageDriver,
        label: &str,
        timeout: Duration,
    ) -> ProbeResult<Resolution> {
        let query = LabelQuery::new(label);
        if query.is_empty() {
            return Err(ProbeError::precondition("field label is empty"));
        }
        let mut attempt = ResolutionAttempt::start(query.as_str());
        let mut poller = Poller::new(timeout, self.poll_interval);
        let mut last_frames = Vec::new();

        loop {
            attempt.polls += 1;
            match driver.frames().await {
                Ok(frames) => {
                    if let Some(found) = self.resolve_counted(&frames, &query, &mut attempt) {
                        attempt.elapsed = poller.elapsed();
                        attempt.outcome = AttemptOutcome::Found {
                            rank: found.rank,
                            frame_index: found.frame_index,
                        };
                        attempt.log();
                        return Ok(found);
                    }
                    attempt.outcome = AttemptOutcome::Pending;
                    last_frames = frames;
                }
                Err(err) => {
                    tracing::trace!(label = %query, error = %err, "frame capture failed");
                    attempt.outcome = AttemptOutcome::Error(err.to_string());
                }
            }
            if !poller.wait_next().await {
                break;
            }
        }

        attempt.elapsed = poller.elapsed();
        if attempt.outcome == AttemptOutcome::Pending {
            attempt.outcome = AttemptOutcome::NotFound;
        }
        attempt.log();
        Err(ProbeError::FieldNotFound {
            label: query.as_str().to_string(),
            elapsed: attempt.elapsed,
            diagnostics: last_frames.iter().map(FrameDiagnostics::capture).collect(),
        })
    }
}
