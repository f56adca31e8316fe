//! Materialising and running snapshot artifacts.

pub mod snapshot;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ArtifactLocator, Result};

pub use snapshot::{ArtifactKind, SnapshotRunner};

/// What happened while running one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub artifact: String,
    /// SHA-256 of the downloaded file, hex encoded.
    pub digest: String,
    /// Exit code of the launched program, `None` if killed by a signal.
    pub exit_code: Option<i32>,
}

/// Downloads, prepares, launches and tears down one artifact per call.
///
/// Implementations must release everything they acquired before returning,
/// whether or not a stage failed.
#[async_trait]
pub trait ArtifactRunner: Send + Sync {
    async fn run_artifact(&self, locator: &ArtifactLocator) -> Result<RunOutcome>;
}
