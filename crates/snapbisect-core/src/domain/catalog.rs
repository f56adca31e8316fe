//! Snapshot catalog: which commits have a runnable artifact, and where.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::Url;

use super::commit::CommitId;

/// Where to fetch one snapshot artifact from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocator {
    /// Entry name as it appeared in the listing.
    pub name: String,
    pub url: Url,
}

impl fmt::Display for ArtifactLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// Mapping from commit to its artifact. Keys are exactly the testable commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotCatalog {
    entries: BTreeMap<CommitId, ArtifactLocator>,
}

impl SnapshotCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an artifact unless the commit already has one.
    ///
    /// Returns `false` when an earlier entry was kept.
    pub fn insert(&mut self, commit: CommitId, locator: ArtifactLocator) -> bool {
        match self.entries.entry(commit) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(locator);
                true
            }
        }
    }

    pub fn get(&self, commit: &CommitId) -> Option<&ArtifactLocator> {
        self.entries.get(commit)
    }

    pub fn contains(&self, commit: &CommitId) -> bool {
        self.entries.contains_key(commit)
    }

    pub fn commits(&self) -> Vec<CommitId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CommitId, &ArtifactLocator)> {
        self.entries.iter()
    }
}

impl FromIterator<(CommitId, ArtifactLocator)> for SnapshotCatalog {
    fn from_iter<I: IntoIterator<Item = (CommitId, ArtifactLocator)>>(iter: I) -> Self {
        let mut catalog = SnapshotCatalog::new();
        for (commit, locator) in iter {
            catalog.insert(commit, locator);
        }
        catalog
    }
}
