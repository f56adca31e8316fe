//! Commit ordering and endpoint validation.
//!
//! [`build_order`] turns the unordered set of snapshot-backed commits into a
//! [`CommitOrder`]; [`validate_endpoints`] checks the user's good/bad pair
//! against it and yields the initial [`SearchInterval`].

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::domain::{BisectError, CommitId, Endpoint, Result};
use crate::engine::SearchInterval;
use crate::history::HistoryProvider;

/// Strict total order over snapshot-backed commits, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOrder {
    commits: Vec<CommitId>,
    positions: HashMap<CommitId, usize>,
}

impl CommitOrder {
    /// Wrap an already ordered sequence. Duplicates are an ordering error.
    pub fn new(commits: Vec<CommitId>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(commits.len());
        for (index, id) in commits.iter().enumerate() {
            if positions.insert(id.clone(), index).is_some() {
                return Err(BisectError::Ordering(format!(
                    "commit {id} appears more than once"
                )));
            }
        }
        Ok(CommitOrder { commits, positions })
    }

    pub fn position(&self, id: &CommitId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn get(&self, index: usize) -> Option<&CommitId> {
        self.commits.get(index)
    }

    pub fn first(&self) -> Option<&CommitId> {
        self.commits.first()
    }

    pub fn last(&self) -> Option<&CommitId> {
        self.commits.last()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn as_slice(&self) -> &[CommitId] {
        &self.commits
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitId> {
        self.commits.iter()
    }
}

/// Order `refs` through the history provider.
///
/// Duplicate inputs are collapsed. The provider's answer must contain exactly
/// the requested commits, and ordering that answer again must reproduce it.
pub async fn build_order(history: &dyn HistoryProvider, refs: &[CommitId]) -> Result<CommitOrder> {
    let requested: BTreeSet<CommitId> = refs.iter().cloned().collect();
    if requested.is_empty() {
        return Err(BisectError::NoSnapshots);
    }

    let unique: Vec<CommitId> = requested.iter().cloned().collect();
    let order = CommitOrder::new(history.list_ordered_commits(&unique).await?)?;

    if order.len() != requested.len() || order.iter().any(|id| !requested.contains(id)) {
        return Err(BisectError::Ordering(format!(
            "history returned {} commits for {} requested",
            order.len(),
            requested.len()
        )));
    }

    let reordered = history.list_ordered_commits(order.as_slice()).await?;
    if reordered != order.as_slice() {
        return Err(BisectError::Ordering(
            "history order is not stable under reordering".to_string(),
        ));
    }

    debug!(commits = order.len(), "built commit order");
    Ok(order)
}

/// Earliest and latest commits of the order, used when the user gives none.
pub fn default_endpoints(order: &CommitOrder) -> Result<(CommitId, CommitId)> {
    match (order.first(), order.last()) {
        (Some(first), Some(last)) => Ok((first.clone(), last.clone())),
        _ => Err(BisectError::NoSnapshots),
    }
}

/// Check a good/bad pair against the order and return its positions.
///
/// This is a sanity check on user input: the pair must already be ascending,
/// it is never swapped.
pub fn validate_endpoints(
    order: &CommitOrder,
    good: &CommitId,
    bad: &CommitId,
) -> Result<SearchInterval> {
    if good == bad {
        return Err(BisectError::InvalidRange {
            good: good.to_string(),
            bad: bad.to_string(),
            reason: "good and bad are the same commit".to_string(),
        });
    }

    let low = order.position(good).ok_or_else(|| BisectError::UnknownCommit {
        which: Endpoint::Good,
        commit: good.to_string(),
    })?;
    let high = order.position(bad).ok_or_else(|| BisectError::UnknownCommit {
        which: Endpoint::Bad,
        commit: bad.to_string(),
    })?;

    if low >= high {
        return Err(BisectError::InvalidRange {
            good: good.to_string(),
            bad: bad.to_string(),
            reason: "good must precede bad in history".to_string(),
        });
    }

    SearchInterval::new(low, high)
}
