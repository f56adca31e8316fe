//! Error taxonomy for snapshot bisection.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::commit::CommitId;

/// Which user-supplied endpoint of the search an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Good,
    Bad,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Good => write!(f, "good"),
            Endpoint::Bad => write!(f, "bad"),
        }
    }
}

/// Stage of materialising and running a snapshot artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStage {
    Download,
    Mount,
    Execute,
    Unmount,
    Cleanup,
}

impl fmt::Display for ArtifactStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactStage::Download => "download",
            ArtifactStage::Mount => "mount",
            ArtifactStage::Execute => "execute",
            ArtifactStage::Unmount => "unmount",
            ArtifactStage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Snapshot bisection errors.
///
/// Every variant is terminal for a run; nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum BisectError {
    #[error("no snapshot-backed commits were found")]
    NoSnapshots,

    #[error("invalid range good={good} bad={bad}: {reason}")]
    InvalidRange {
        good: String,
        bad: String,
        reason: String,
    },

    #[error("no snapshot exists for the {which} commit {commit}")]
    UnknownCommit { which: Endpoint, commit: String },

    #[error("history cannot order commits: {0}")]
    Ordering(String),

    #[error("cannot resolve ref: {0}")]
    UnresolvableRef(String),

    #[error("artifact name matches no known pattern: {0}")]
    UnparsableArtifactName(String),

    #[error("artifact {stage} failed: {reason}")]
    ArtifactRun {
        stage: ArtifactStage,
        reason: String,
    },

    #[error("commit {0} is ordered but has no snapshot")]
    MissingSnapshot(CommitId),

    #[error("invalid commit id: {0}")]
    InvalidCommitId(String),

    #[error("snapshot index error: {0}")]
    Index(String),

    #[error("verdict prompt failed: {0}")]
    Oracle(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BisectError {
    pub(crate) fn artifact(stage: ArtifactStage, reason: impl Into<String>) -> Self {
        BisectError::ArtifactRun {
            stage,
            reason: reason.into(),
        }
    }

    /// Whether the user can fix this by choosing different endpoints.
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            BisectError::InvalidRange { .. }
                | BisectError::UnknownCommit { .. }
                | BisectError::UnresolvableRef(_)
        )
    }
}

impl From<reqwest::Error> for BisectError {
    fn from(err: reqwest::Error) -> Self {
        BisectError::artifact(ArtifactStage::Download, err.to_string())
    }
}

/// Result type for bisection operations.
pub type Result<T> = std::result::Result<T, BisectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_commit_names_the_endpoint() {
        let err = BisectError::UnknownCommit {
            which: Endpoint::Bad,
            commit: "abc123".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bad"));
        assert!(msg.contains("abc123"));
    }

    #[test]
    fn artifact_run_names_the_stage() {
        let err = BisectError::artifact(ArtifactStage::Unmount, "device busy");
        assert_eq!(err.to_string(), "artifact unmount failed: device busy");
    }

    #[test]
    fn range_errors_are_user_correctable() {
        let invalid = BisectError::InvalidRange {
            good: "a".into(),
            bad: "a".into(),
            reason: "same commit".into(),
        };
        assert!(invalid.is_range_error());
        assert!(BisectError::UnresolvableRef("nope".into()).is_range_error());
        assert!(!BisectError::NoSnapshots.is_range_error());
        assert!(!BisectError::Ordering("cycle".into()).is_range_error());
    }
}
