//! Snapshot artifact discovery.

pub mod http;
pub mod patterns;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Result, SnapshotCatalog};

pub use http::{parse_listing, HttpArtifactIndex, ListingEntry};
pub use patterns::{NameMatch, NamePattern, PatternSet};

/// Produces the commit -> artifact catalog.
#[async_trait]
pub trait ArtifactIndex: Send + Sync {
    async fn list_snapshot_artifacts(&self) -> Result<SnapshotCatalog>;
}

/// What to do with a listing entry no pattern recognises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    /// Abort the index build with `UnparsableArtifactName`.
    #[default]
    Fail,
    /// Log the entry and leave it out of the catalog.
    Skip,
}

impl fmt::Display for UnmatchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedPolicy::Fail => write!(f, "fail"),
            UnmatchedPolicy::Skip => write!(f, "skip"),
        }
    }
}

impl FromStr for UnmatchedPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(UnmatchedPolicy::Fail),
            "skip" => Ok(UnmatchedPolicy::Skip),
            other => Err(format!("unknown unmatched-entry policy '{other}' (expected fail or skip)")),
        }
    }
}
