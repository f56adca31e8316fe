//! One bisection run from discovery to report.
//!
//! [`Session::discover`] builds the read-only catalog and order once;
//! [`Session::endpoints`] turns optional user refs into a validated interval;
//! [`Session::bisect`] runs the engine over them.

use tracing::info;

use crate::domain::{CommitId, Endpoint, Result, SnapshotCatalog};
use crate::engine::{BisectReport, Bisector, SearchInterval};
use crate::history::HistoryProvider;
use crate::index::ArtifactIndex;
use crate::oracle::VerdictProvider;
use crate::ordering::{build_order, default_endpoints, validate_endpoints, CommitOrder};
use crate::runner::ArtifactRunner;

/// Catalog and order shared by every step of a run.
#[derive(Debug, Clone)]
pub struct Session {
    pub catalog: SnapshotCatalog,
    pub order: CommitOrder,
}

impl Session {
    /// List snapshots and order their commits.
    ///
    /// An empty catalog fails with `NoSnapshots` before history is consulted.
    pub async fn discover(history: &dyn HistoryProvider, index: &dyn ArtifactIndex) -> Result<Self> {
        let catalog = index.list_snapshot_artifacts().await?;
        let order = build_order(history, &catalog.commits()).await?;
        info!(snapshots = order.len(), "snapshot history ready");
        Ok(Session { catalog, order })
    }

    /// Resolve the requested refs (defaulting to the first and last snapshot)
    /// and validate them against the order.
    pub async fn endpoints(
        &self,
        history: &dyn HistoryProvider,
        good: Option<&str>,
        bad: Option<&str>,
    ) -> Result<SearchInterval> {
        let (default_good, default_bad) = default_endpoints(&self.order)?;
        let good = resolve_endpoint(history, Endpoint::Good, good, default_good).await?;
        let bad = resolve_endpoint(history, Endpoint::Bad, bad, default_bad).await?;
        validate_endpoints(&self.order, &good, &bad)
    }

    pub async fn bisect(
        &self,
        history: &dyn HistoryProvider,
        runner: &dyn ArtifactRunner,
        oracle: &mut dyn VerdictProvider,
        interval: SearchInterval,
    ) -> Result<BisectReport> {
        Bisector::new(&self.order, &self.catalog, history, runner)
            .run(oracle, interval)
            .await
    }
}

async fn resolve_endpoint(
    history: &dyn HistoryProvider,
    which: Endpoint,
    reference: Option<&str>,
    fallback: CommitId,
) -> Result<CommitId> {
    match reference {
        Some(reference) => {
            let id = history.resolve_commit(reference).await?;
            info!(endpoint = %which, reference, commit = %id, "resolved endpoint");
            Ok(id)
        }
        None => Ok(fallback),
    }
}
