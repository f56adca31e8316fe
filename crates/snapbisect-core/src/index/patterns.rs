//! Artifact-name patterns.
//!
//! Build servers encode the commit in the artifact file name in a handful of
//! conventions. Each convention is one regex with a `commit` capture group;
//! a [`PatternSet`] tries them in order and the first match wins.

use regex::Regex;

use crate::domain::{BisectError, Result};

const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    (
        "describe",
        r"^(?P<product>[A-Za-z0-9_.+]+(?:-[A-Za-z][A-Za-z0-9_.+]*)*)-v?\d[\w.+-]*?-\d+-g(?P<commit>[0-9a-f]{7,64})(?:[-_.][A-Za-z0-9_]+)*\.(?:dmg|zip|tar\.gz|tgz)$",
    ),
    (
        "product-commit",
        r"^(?P<product>[A-Za-z0-9_.+-]+?)[-_](?P<commit>[0-9a-f]{7,64})(?:[-_.][A-Za-z0-9_]+)*\.(?:dmg|zip|tar\.gz|tgz)$",
    ),
    ("bare-commit", r"^(?P<commit>[0-9a-f]{40}|[0-9a-f]{64})(?:\.[A-Za-z0-9.]+)?$"),
];

/// One naming convention.
#[derive(Debug, Clone)]
pub struct NamePattern {
    label: String,
    regex: Regex,
}

impl NamePattern {
    /// Compile `source`, which must define a `commit` capture group.
    pub fn new(label: impl Into<String>, source: &str) -> Result<Self> {
        let label = label.into();
        let regex = Regex::new(source)
            .map_err(|e| BisectError::Config(format!("pattern {label}: {e}")))?;
        if !regex.capture_names().flatten().any(|name| name == "commit") {
            return Err(BisectError::Config(format!(
                "pattern {label} has no `commit` capture group"
            )));
        }
        Ok(NamePattern { label, regex })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn match_name(&self, name: &str) -> Option<String> {
        self.regex
            .captures(name)
            .and_then(|caps| caps.name("commit"))
            .map(|m| m.as_str().to_ascii_lowercase())
    }
}

/// The commit reference extracted from an artifact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    /// Possibly abbreviated commit id, still to be resolved against history.
    pub commit_ref: String,
    pub pattern: String,
}

/// Ordered list of naming conventions.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<NamePattern>,
}

impl Default for PatternSet {
    fn default() -> Self {
        let patterns = DEFAULT_PATTERNS
            .iter()
            .map(|(label, source)| NamePattern::new(*label, source))
            .collect::<Result<Vec<_>>>()
            .expect("built-in artifact patterns compile");
        PatternSet { patterns }
    }
}

impl PatternSet {
    pub fn new(patterns: Vec<NamePattern>) -> Self {
        PatternSet { patterns }
    }

    /// Compile user-supplied sources, or the defaults when none are given.
    pub fn from_sources(sources: &[String]) -> Result<Self> {
        if sources.is_empty() {
            return Ok(Self::default());
        }
        let patterns = sources
            .iter()
            .enumerate()
            .map(|(i, source)| NamePattern::new(format!("custom-{}", i + 1), source))
            .collect::<Result<Vec<_>>>()?;
        Ok(PatternSet { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First pattern that recognises `name`.
    pub fn match_name(&self, name: &str) -> Option<NameMatch> {
        self.patterns.iter().find_map(|pattern| {
            pattern.match_name(name).map(|commit_ref| NameMatch {
                commit_ref,
                pattern: pattern.label().to_string(),
            })
        })
    }
}
