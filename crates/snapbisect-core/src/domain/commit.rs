//! Commit identifiers and human-readable commit metadata.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::error::BisectError;

/// Full commit identifier (SHA-1 or SHA-256 hex).
///
/// The inner field is private so every value is known to be lowercase hex of
/// one of the two object-name lengths git produces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    /// Parse a full object name.
    pub fn parse(s: &str) -> Result<Self, BisectError> {
        let s = s.trim();
        if !matches!(s.len(), 40 | 64) || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BisectError::InvalidCommitId(s.to_string()));
        }
        Ok(CommitId(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl TryFrom<String> for CommitId {
    type Error = BisectError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        CommitId::parse(&s)
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commit timestamp and subject line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDescription {
    pub timestamp: DateTime<FixedOffset>,
    pub subject: String,
}

/// A commit together with its description, when one could be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub id: CommitId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<CommitDescription>,
}

impl fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(
                f,
                "{} {} {}",
                self.id.short(),
                desc.timestamp.to_rfc3339(),
                desc.subject
            ),
            None => write!(f, "{}", self.id.short()),
        }
    }
}
