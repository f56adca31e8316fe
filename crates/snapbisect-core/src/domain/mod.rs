//! Domain types shared by every layer of the bisector.

pub mod catalog;
pub mod commit;
pub mod error;
pub mod verdict;

pub use catalog::{ArtifactLocator, SnapshotCatalog};
pub use commit::{CommitDescription, CommitId, CommitSummary};
pub use error::{ArtifactStage, BisectError, Endpoint, Result};
pub use verdict::Verdict;
