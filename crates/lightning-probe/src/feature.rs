//! Minimal Gherkin reader and tag expressions.
//!
//! Supported: `Feature:`, `Background:`, `Scenario:`, `Scenario Outline:`
//! with `Examples:` tables, `Given/When/Then/And/But` steps, `@tag` lines
//! and `#` comments. Free text under a `Feature:` line is its description.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::result::{ProbeError, ProbeResult};

/// Step keyword as written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKeyword {
    Given,
    When,
    Then,
    And,
    But,
}

impl StepKeyword {
    const ALL: [(&'static str, Self); 5] = [
        ("Given ", Self::Given),
        ("When ", Self::When),
        ("Then ", Self::Then),
        ("And ", Self::And),
        ("But ", Self::But),
    ];

    fn split(line: &str) -> Option<(Self, &str)> {
        Self::ALL
            .iter()
            .find_map(|(prefix, kw)| line.strip_prefix(prefix).map(|rest| (*kw, rest.trim())))
    }
}

impl fmt::Display for StepKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
            Self::And => "And",
            Self::But => "But",
        };
        f.write_str(s)
    }
}

/// One step line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub keyword: StepKeyword,
    pub text: String,
    pub line: usize,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.keyword, self.text)
    }
}

/// A runnable scenario; outlines are already expanded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Scenario tags only; see [`Feature::tags_of`] for inherited ones
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
    pub line: usize,
}

/// A parsed feature file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub background: Vec<Step>,
    pub scenarios: Vec<Scenario>,
}

impl Feature {
    /// Feature tags followed by the scenario's own
    #[must_use]
    pub fn tags_of(&self, scenario: &Scenario) -> Vec<String> {
        self.tags
            .iter()
            .chain(&scenario.tags)
            .cloned()
            .collect()
    }

    /// Scenarios selected by `filter` (all when `None`)
    #[must_use]
    pub fn selected<'a>(&'a self, filter: Option<&'a TagExpr>) -> Vec<&'a Scenario> {
        self.scenarios
            .iter()
            .filter(|s| filter.map_or(true, |f| f.matches(&self.tags_of(s))))
            .collect()
    }
}

#[derive(Debug)]
enum Section {
    None,
    Background,
    Scenario,
    Outline,
    Examples,
}

struct Outline {
    name: String,
    tags: Vec<String>,
    steps: Vec<Step>,
    line: usize,
    header: Option<Vec<String>>,
    rows: usize,
}

fn parse_error(line: usize, message: impl Into<String>) -> ProbeError {
    ProbeError::FeatureParse {
        line,
        message: message.into(),
    }
}

fn table_cells(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

fn substitute(text: &str, header: &[String], row: &[String]) -> String {
    header
        .iter()
        .zip(row)
        .fold(text.to_string(), |acc, (name, value)| acc.replace(&format!("<{name}>"), value))
}

/// Parse feature text
pub fn parse(text: &str) -> ProbeResult<Feature> {
    let mut feature = Feature::default();
    let mut seen_feature = false;
    let mut pending_tags: Vec<String> = Vec::new();
    let mut section = Section::None;
    let mut outline: Option<Outline> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('@') {
            pending_tags.extend(line.split_whitespace().map(str::to_string));
            continue;
        }

        if let Some(name) = line.strip_prefix("Feature:") {
            if seen_feature {
                return Err(parse_error(line_no, "more than one Feature"));
            }
            seen_feature = true;
            feature.name = name.trim().to_string();
            feature.tags = std::mem::take(&mut pending_tags);
            continue;
        }
        if !seen_feature {
            return Err(parse_error(line_no, "expected 'Feature:' first"));
        }

        if line.starts_with("Background:") {
            if !feature.scenarios.is_empty() || outline.is_some() {
                return Err(parse_error(line_no, "Background must come before scenarios"));
            }
            section = Section::Background;
            continue;
        }

        let outline_name = line
            .strip_prefix("Scenario Outline:")
            .or_else(|| line.strip_prefix("Scenario Template:"));
        if let Some(name) = outline_name {
            finish_outline(outline.take())?;
            outline = Some(Outline {
                name: name.trim().to_string(),
                tags: std::mem::take(&mut pending_tags),
                steps: Vec::new(),
                line: line_no,
                header: None,
                rows: 0,
            });
            section = Section::Outline;
            continue;
        }

        let scenario_name = line
            .strip_prefix("Scenario:")
            .or_else(|| line.strip_prefix("Example:"));
        if let Some(name) = scenario_name {
            finish_outline(outline.take())?;
            feature.scenarios.push(Scenario {
                name: name.trim().to_string(),
                tags: std::mem::take(&mut pending_tags),
                steps: Vec::new(),
                line: line_no,
            });
            section = Section::Scenario;
            continue;
        }

        if line.starts_with("Examples:") || line.starts_with("Scenarios:") {
            match section {
                Section::Outline | Section::Examples => {
                    if let Some(o) = outline.as_mut() {
                        o.header = None;
                    }
                    section = Section::Examples;
                    continue;
                }
                _ => return Err(parse_error(line_no, "Examples outside a Scenario Outline")),
            }
        }

        if line.starts_with('|') {
            let Section::Examples = section else {
                return Err(parse_error(line_no, "data tables are only supported under Examples"));
            };
            let Some(o) = outline.as_mut() else {
                return Err(parse_error(line_no, "Examples without an outline"));
            };
            let cells = table_cells(line);
            let Some(header) = o.header.as_deref() else {
                o.header = Some(cells);
                continue;
            };
            if cells.len() != header.len() {
                return Err(parse_error(
                    line_no,
                    format!("expected {} cells, found {}", header.len(), cells.len()),
                ));
            }
            let steps = o
                .steps
                .iter()
                .map(|s| Step {
                    text: substitute(&s.text, header, &cells),
                    ..s.clone()
                })
                .collect();
            feature.scenarios.push(Scenario {
                name: format!("{} ({})", substitute(&o.name, header, &cells), cells.join(", ")),
                tags: o.tags.clone(),
                steps,
                line: line_no,
            });
            o.rows += 1;
            continue;
        }

        if line.starts_with("\"\"\"") {
            return Err(parse_error(line_no, "doc strings are not supported"));
        }

        if let Some((keyword, text)) = StepKeyword::split(line) {
            let step = Step {
                keyword,
                text: text.to_string(),
                line: line_no,
            };
            match section {
                Section::Background => feature.background.push(step),
                Section::Scenario => {
                    if let Some(scenario) = feature.scenarios.last_mut() {
                        scenario.steps.push(step);
                    }
                }
                Section::Outline => {
                    if let Some(o) = outline.as_mut() {
                        o.steps.push(step);
                    }
                }
                Section::Examples | Section::None => {
                    return Err(parse_error(line_no, format!("step outside a scenario: {line}")));
                }
            }
            continue;
        }

        match section {
            Section::None if feature.scenarios.is_empty() && feature.background.is_empty() => {
                if !feature.description.is_empty() {
                    feature.description.push('\n');
                }
                feature.description.push_str(line);
            }
            _ => return Err(parse_error(line_no, format!("unexpected line: {line}"))),
        }
    }

    if !seen_feature {
        return Err(parse_error(1, "no Feature found"));
    }
    finish_outline(outline.take())?;
    Ok(feature)
}

fn finish_outline(outline: Option<Outline>) -> ProbeResult<()> {
    match outline {
        Some(o) if o.rows == 0 => Err(parse_error(
            o.line,
            format!("Scenario Outline '{}' has no Examples rows", o.name),
        )),
        _ => Ok(()),
    }
}

/// Read and parse a `.feature` file
pub fn parse_file(path: &Path) -> ProbeResult<Feature> {
    let text = std::fs::read_to_string(path)?;
    let feature = parse(&text)?;
    tracing::debug!(
        path = %path.display(),
        scenarios = feature.scenarios.len(),
        "feature parsed"
    );
    Ok(feature)
}

/// Tag filter such as `@smoke and not (@wip or @manual)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagExpr {
    Tag(String),
    Not(Box<TagExpr>),
    And(Box<TagExpr>, Box<TagExpr>),
    Or(Box<TagExpr>, Box<TagExpr>),
}

impl TagExpr {
    /// Parse an expression. `not` binds tightest, then `and`, then `or`.
    pub fn parse(input: &str) -> ProbeResult<Self> {
        let tokens = tokenize(input);
        let mut parser = TagParser { tokens, pos: 0 };
        let expr = parser.or_expr()?;
        if let Some(extra) = parser.tokens.get(parser.pos) {
            return Err(ProbeError::Config {
                message: format!("unexpected '{extra}' in tag expression '{input}'"),
            });
        }
        Ok(expr)
    }

    /// Whether a tag set satisfies the expression
    #[must_use]
    pub fn matches(&self, tags: &[String]) -> bool {
        match self {
            Self::Tag(t) => tags.iter().any(|x| x == t),
            Self::Not(e) => !e.matches(tags),
            Self::And(a, b) => a.matches(tags) && b.matches(tags),
            Self::Or(a, b) => a.matches(tags) || b.matches(tags),
        }
    }
}

fn tokenize(input: &str) -> Vec<String> {
    input
        .replace('(', " ( ")
        .replace(')', " ) ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

struct TagParser {
    tokens: Vec<String>,
    pos: usize,
}

impl TagParser {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or_expr(&mut self) -> ProbeResult<TagExpr> {
        let mut left = self.and_expr()?;
        while self.peek() == Some("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = TagExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ProbeResult<TagExpr> {
        let mut left = self.unary()?;
        while self.peek() == Some("and") {
            self.pos += 1;
            let right = self.unary()?;
            left = TagExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> ProbeResult<TagExpr> {
        match self.next() {
            Some(t) if t == "not" => Ok(TagExpr::Not(Box::new(self.unary()?))),
            Some(t) if t == "(" => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(close) if close == ")" => Ok(inner),
                    _ => Err(ProbeError::Config {
                        message: "missing ')' in tag expression".to_string(),
                    }),
                }
            }
            Some(t) if t.starts_with('@') && t.len() > 1 => Ok(TagExpr::Tag(t)),
            Some(t) => Err(ProbeError::Config {
                message: format!("expected a @tag, found '{t}'"),
            }),
            None => Err(ProbeError::Config {
                message: "tag expression ended early".to_string(),
            }),
        }
    }
}
