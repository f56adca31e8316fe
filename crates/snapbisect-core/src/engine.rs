//! Bisection engine.
//!
//! The engine owns the search interval and nothing else mutable. Each
//! iteration tests the midpoint snapshot, asks the oracle for a verdict and
//! moves exactly one endpoint onto the midpoint:
//!
//! ```text
//! Searching (high - low >= 2) --verdict--> Searching | Converged
//! Converged (high - low == 1) --> report
//! ```
//!
//! `order[low]` is always known good and `order[high]` known bad, so the first
//! bad snapshot is `order[high]` once the interval closes. Commits without a
//! snapshot are never visited; the result is only as precise as the catalog.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{BisectError, CommitId, CommitSummary, Result, SnapshotCatalog, Verdict};
use crate::history::HistoryProvider;
use crate::oracle::VerdictProvider;
use crate::ordering::CommitOrder;
use crate::runner::ArtifactRunner;

/// Phase of the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Searching,
    Converged,
}

/// Positions of the known-good and known-bad bounds in a [`CommitOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchInterval {
    low: usize,
    high: usize,
}

impl SearchInterval {
    pub fn new(low: usize, high: usize) -> Result<Self> {
        if low >= high {
            return Err(BisectError::InvalidRange {
                good: low.to_string(),
                bad: high.to_string(),
                reason: "low index must be below high index".to_string(),
            });
        }
        Ok(SearchInterval { low, high })
    }

    pub fn low(&self) -> usize {
        self.low
    }

    pub fn high(&self) -> usize {
        self.high
    }

    pub fn width(&self) -> usize {
        self.high - self.low
    }

    pub fn state(&self) -> SearchState {
        if self.width() >= 2 {
            SearchState::Searching
        } else {
            SearchState::Converged
        }
    }

    /// `floor((low + high) / 2)`, strictly inside the interval while searching.
    pub fn midpoint(&self) -> Option<usize> {
        match self.state() {
            SearchState::Searching => Some(self.low + (self.high - self.low) / 2),
            SearchState::Converged => None,
        }
    }

    /// Move the bound selected by `verdict` onto `mid`.
    pub fn narrow(&mut self, mid: usize, verdict: Verdict) {
        debug_assert!(self.low < mid && mid < self.high);
        match verdict {
            Verdict::Good => self.low = mid,
            Verdict::Bad => self.high = mid,
        }
    }

    /// Upper bound on the iterations left: `ceil(log2(width))`.
    pub fn max_remaining_steps(&self) -> u32 {
        let width = self.width();
        if width <= 1 {
            0
        } else {
            usize::BITS - (width - 1).leading_zeros()
        }
    }
}

/// One tested snapshot and the verdict it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BisectStep {
    pub index: usize,
    pub commit: CommitId,
    pub verdict: Verdict,
}

/// Outcome of a converged search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BisectReport {
    pub last_good: CommitSummary,
    pub first_bad: CommitSummary,
    pub steps: Vec<BisectStep>,
}

/// Drives the search over an order and catalog built beforehand.
pub struct Bisector<'a> {
    order: &'a CommitOrder,
    catalog: &'a SnapshotCatalog,
    history: &'a dyn HistoryProvider,
    runner: &'a dyn ArtifactRunner,
}

impl<'a> Bisector<'a> {
    pub fn new(
        order: &'a CommitOrder,
        catalog: &'a SnapshotCatalog,
        history: &'a dyn HistoryProvider,
        runner: &'a dyn ArtifactRunner,
    ) -> Self {
        Bisector {
            order,
            catalog,
            history,
            runner,
        }
    }

    /// Search `interval` until it converges, asking `oracle` for each verdict.
    ///
    /// Any runner or oracle failure aborts the search; progress is not kept.
    pub async fn run(
        &self,
        oracle: &mut dyn VerdictProvider,
        mut interval: SearchInterval,
    ) -> Result<BisectReport> {
        if interval.high() >= self.order.len() {
            return Err(BisectError::InvalidRange {
                good: interval.low().to_string(),
                bad: interval.high().to_string(),
                reason: format!("order only has {} commits", self.order.len()),
            });
        }

        let good = self.commit_at(interval.low())?;
        let bad = self.commit_at(interval.high())?;
        info!(
            %good,
            %bad,
            candidates = interval.width() - 1,
            max_steps = interval.max_remaining_steps(),
            "starting bisection"
        );

        let mut steps = Vec::new();
        while let Some(mid) = interval.midpoint() {
            let verdict = self
                .test_commit(oracle, mid, interval.max_remaining_steps())
                .await?;
            steps.push(BisectStep {
                index: mid,
                commit: self.commit_at(mid)?.clone(),
                verdict,
            });
            interval.narrow(mid, verdict);
        }

        let last_good = self.summarize(self.commit_at(interval.low())?).await;
        let first_bad = self.summarize(self.commit_at(interval.high())?).await;
        info!(
            last_good = %last_good.id,
            first_bad = %first_bad.id,
            steps = steps.len(),
            "bisection converged"
        );

        Ok(BisectReport {
            last_good,
            first_bad,
            steps,
        })
    }

    async fn test_commit(
        &self,
        oracle: &mut dyn VerdictProvider,
        index: usize,
        remaining: u32,
    ) -> Result<Verdict> {
        let commit = self.commit_at(index)?;
        let locator = self
            .catalog
            .get(commit)
            .ok_or_else(|| BisectError::MissingSnapshot(commit.clone()))?;
        let summary = self.summarize(commit).await;

        info!(commit = %summary, artifact = %locator.name, remaining, "testing snapshot");
        let outcome = self.runner.run_artifact(locator).await?;
        if let Some(code) = outcome.exit_code.filter(|code| *code != 0) {
            warn!(commit = %commit, exit_code = code, "snapshot exited with non-zero status");
        }

        let verdict = oracle.prompt_verdict(&summary).await?;
        info!(commit = %commit, %verdict, "verdict recorded");
        Ok(verdict)
    }

    fn commit_at(&self, index: usize) -> Result<&'a CommitId> {
        self.order.get(index).ok_or_else(|| BisectError::InvalidRange {
            good: index.to_string(),
            bad: index.to_string(),
            reason: format!("index {index} is outside the commit order"),
        })
    }

    /// Descriptions are informational; failing to load one is only logged.
    async fn summarize(&self, id: &CommitId) -> CommitSummary {
        let description = match self.history.describe_commit(id).await {
            Ok(desc) => Some(desc),
            Err(err) => {
                warn!(commit = %id, error = %err, "could not describe commit");
                None
            }
        };
        CommitSummary {
            id: id.clone(),
            description,
        }
    }
}
