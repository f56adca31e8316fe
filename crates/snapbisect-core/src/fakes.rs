//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `MemoryHistory`, `MemoryIndex` and `RecordingRunner` that satisfy
//! the trait contracts without git, network or disk images.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration};
use reqwest::Url;

use crate::domain::{
    ArtifactLocator, ArtifactStage, BisectError, CommitDescription, CommitId, Result,
    SnapshotCatalog,
};
use crate::history::HistoryProvider;
use crate::index::ArtifactIndex;
use crate::runner::{ArtifactRunner, RunOutcome};

/// Deterministic commit id for test fixtures: `n` as 40 hex digits.
pub fn commit_id(n: usize) -> CommitId {
    CommitId::parse(&format!("{n:040x}")).expect("40 hex digits")
}

// ---------------------------------------------------------------------------
// MemoryHistory
// ---------------------------------------------------------------------------

/// Linear history held in memory, oldest first.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    commits: Vec<CommitId>,
    refs: HashMap<String, CommitId>,
    undescribed: HashSet<CommitId>,
    unstable: bool,
    calls: Mutex<usize>,
}

impl MemoryHistory {
    pub fn new(commits: Vec<CommitId>) -> Self {
        MemoryHistory {
            commits,
            ..Self::default()
        }
    }

    /// Name a commit, like a branch or tag.
    pub fn with_ref(mut self, name: &str, id: CommitId) -> Self {
        self.refs.insert(name.to_string(), id);
        self
    }

    /// Make `describe_commit` fail for `id`.
    pub fn without_description(mut self, id: CommitId) -> Self {
        self.undescribed.insert(id);
        self
    }

    /// Answer every other ordering request in reverse.
    pub fn unstable(mut self) -> Self {
        self.unstable = true;
        self
    }

    fn position(&self, id: &CommitId) -> Option<usize> {
        self.commits.iter().position(|c| c == id)
    }
}

#[async_trait]
impl HistoryProvider for MemoryHistory {
    async fn list_ordered_commits(&self, refs: &[CommitId]) -> Result<Vec<CommitId>> {
        let wanted: HashSet<&CommitId> = refs.iter().collect();
        if let Some(missing) = wanted.iter().find(|id| self.position(id).is_none()) {
            return Err(BisectError::Ordering(format!("unknown commit {missing}")));
        }

        let mut ordered: Vec<CommitId> = self
            .commits
            .iter()
            .filter(|c| wanted.contains(c))
            .cloned()
            .collect();

        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if self.unstable && *calls % 2 == 0 {
            ordered.reverse();
        }
        Ok(ordered)
    }

    async fn resolve_commit(&self, reference: &str) -> Result<CommitId> {
        if let Some(id) = self.refs.get(reference) {
            return Ok(id.clone());
        }
        let prefix = reference.to_ascii_lowercase();
        if prefix.len() < 4 {
            return Err(BisectError::UnresolvableRef(reference.to_string()));
        }
        let mut matches = self.commits.iter().filter(|c| c.as_str().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id.clone()),
            _ => Err(BisectError::UnresolvableRef(reference.to_string())),
        }
    }

    async fn describe_commit(&self, id: &CommitId) -> Result<CommitDescription> {
        let index = self
            .position(id)
            .filter(|_| !self.undescribed.contains(id))
            .ok_or_else(|| BisectError::UnresolvableRef(id.to_string()))?;
        let epoch = DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap();
        Ok(CommitDescription {
            timestamp: epoch + Duration::hours(index as i64),
            subject: format!("commit {index}"),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryIndex
// ---------------------------------------------------------------------------

/// Fixed catalog.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    catalog: SnapshotCatalog,
}

impl MemoryIndex {
    pub fn new(catalog: SnapshotCatalog) -> Self {
        MemoryIndex { catalog }
    }

    /// One `.dmg` per commit under a fake listing URL.
    pub fn for_commits(commits: &[CommitId]) -> Self {
        let base = Url::parse("https://snapshots.example.com/nightly/").unwrap();
        let catalog = commits
            .iter()
            .map(|id| {
                let name = format!("viewer-{}.dmg", id.short());
                let url = base.join(&name).unwrap();
                (id.clone(), ArtifactLocator { name, url })
            })
            .collect();
        MemoryIndex { catalog }
    }

    pub fn catalog(&self) -> &SnapshotCatalog {
        &self.catalog
    }
}

#[async_trait]
impl ArtifactIndex for MemoryIndex {
    async fn list_snapshot_artifacts(&self) -> Result<SnapshotCatalog> {
        Ok(self.catalog.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordingRunner
// ---------------------------------------------------------------------------

/// Records every artifact it is asked to run; optionally fails on one.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    runs: Mutex<Vec<ArtifactLocator>>,
    fail_on: Option<(String, ArtifactStage)>,
    exit_code: Option<i32>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail at `stage` when asked to run the artifact called `name`.
    pub fn failing_on(name: &str, stage: ArtifactStage) -> Self {
        RecordingRunner {
            fail_on: Some((name.to_string(), stage)),
            ..Self::default()
        }
    }

    /// Report this exit code for every launch.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn runs(&self) -> Vec<ArtifactLocator> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactRunner for RecordingRunner {
    async fn run_artifact(&self, locator: &ArtifactLocator) -> Result<RunOutcome> {
        self.runs.lock().unwrap().push(locator.clone());
        if let Some((name, stage)) = &self.fail_on {
            if *name == locator.name {
                return Err(BisectError::ArtifactRun {
                    stage: *stage,
                    reason: "injected failure".to_string(),
                });
            }
        }
        Ok(RunOutcome {
            artifact: locator.name.clone(),
            digest: "0".repeat(64),
            exit_code: Some(self.exit_code.unwrap_or(0)),
        })
    }
}
