//! Snapshot Bisect Core Library
//!
//! Locates the commit that introduced a regression by bisecting prebuilt
//! snapshot artifacts instead of building each candidate from source.
//!
//! ## Components
//!
//! - [`history`]: orders commits and describes them (`GitHistory`)
//! - [`index`]: discovers which commits have snapshots (`HttpArtifactIndex`)
//! - [`runner`]: downloads, mounts, launches and tears down one snapshot
//! - [`oracle`]: asks for the good/bad verdict on a tested snapshot
//! - [`ordering`] and [`engine`]: endpoint validation and the binary search
//! - [`session`]: one run wired end to end

pub mod config;
pub mod domain;
pub mod engine;
pub mod fakes;
pub mod history;
pub mod index;
pub mod oracle;
pub mod ordering;
pub mod reporting;
pub mod runner;
pub mod session;
pub mod telemetry;

pub use config::BisectConfig;
pub use domain::{
    ArtifactLocator, ArtifactStage, BisectError, CommitDescription, CommitId, CommitSummary,
    Endpoint, Result, SnapshotCatalog, Verdict,
};
pub use engine::{BisectReport, BisectStep, Bisector, SearchInterval, SearchState};
pub use history::{GitHistory, HistoryProvider};
pub use index::{
    parse_listing, ArtifactIndex, HttpArtifactIndex, NamePattern, PatternSet, UnmatchedPolicy,
};
pub use oracle::{ScriptedOracle, TerminalOracle, VerdictProvider};
pub use ordering::{build_order, default_endpoints, validate_endpoints, CommitOrder};
pub use reporting::{render_catalog, render_report};
pub use runner::{ArtifactRunner, RunOutcome, SnapshotRunner};
pub use session::Session;
pub use telemetry::init_tracing;

/// Snapbisect version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
