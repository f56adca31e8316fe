//! Version-control history provider.
//!
//! The engine only needs three answers from history: put a set of commits in
//! order, resolve a user-supplied ref to a full id, and describe a commit for
//! the operator. [`GitHistory`] answers them by shelling out to `git`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::DateTime;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{BisectError, CommitDescription, CommitId, Result};

/// Source of commit ordering and metadata.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Return `refs` ordered oldest first.
    ///
    /// Fails with [`BisectError::Ordering`] when the set cannot be linearised.
    async fn list_ordered_commits(&self, refs: &[CommitId]) -> Result<Vec<CommitId>>;

    /// Resolve any ref (branch, tag, abbreviated id) to a full commit id.
    async fn resolve_commit(&self, reference: &str) -> Result<CommitId>;

    /// Timestamp and subject line for display.
    async fn describe_commit(&self, id: &CommitId) -> Result<CommitDescription>;
}

/// [`HistoryProvider`] backed by a local git work tree.
#[derive(Debug, Clone)]
pub struct GitHistory {
    repo_dir: PathBuf,
}

impl GitHistory {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        GitHistory {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl HistoryProvider for GitHistory {
    async fn list_ordered_commits(&self, refs: &[CommitId]) -> Result<Vec<CommitId>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        // Walk everything reachable from the refs in topological order and
        // keep only the requested commits. Committer dates are not trusted:
        // rebases and clock skew can date a child before its parent.
        // Refs go through stdin, sorted so the same set always yields the
        // same walk.
        let mut sorted: Vec<&CommitId> = refs.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut child = self
            .git()
            .args(["rev-list", "--topo-order", "--reverse", "--stdin"])
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| BisectError::Ordering(format!("failed to run git: {e}")))?;

        let mut input = String::with_capacity(sorted.len() * 65);
        for id in &sorted {
            input.push_str(id.as_str());
            input.push('\n');
        }
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BisectError::Ordering(format!(
                "git rev-list failed: {}",
                stderr.trim()
            )));
        }

        let wanted: HashSet<&CommitId> = sorted.iter().copied().collect();
        let ordered = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(CommitId::parse)
            .filter(|id| id.as_ref().map_or(true, |id| wanted.contains(id)))
            .collect::<Result<Vec<_>>>()?;

        debug!(requested = refs.len(), ordered = ordered.len(), "ordered commits");
        Ok(ordered)
    }

    async fn resolve_commit(&self, reference: &str) -> Result<CommitId> {
        if reference.trim().is_empty() || reference.starts_with('-') {
            return Err(BisectError::UnresolvableRef(reference.to_string()));
        }

        let spec = format!("{reference}^{{commit}}");
        let output = self
            .git()
            .args(["rev-parse", "--verify", "--quiet", &spec])
            .output()
            .await
            .map_err(|e| BisectError::UnresolvableRef(format!("{reference}: failed to run git: {e}")))?;

        if !output.status.success() {
            return Err(BisectError::UnresolvableRef(reference.to_string()));
        }

        CommitId::parse(&String::from_utf8_lossy(&output.stdout))
    }

    async fn describe_commit(&self, id: &CommitId) -> Result<CommitDescription> {
        let output = self
            .git()
            .args(["show", "-s", "--format=%cI%x00%s", id.as_str()])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BisectError::UnresolvableRef(format!(
                "{id}: {}",
                stderr.trim()
            )));
        }

        parse_description(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| BisectError::UnresolvableRef(format!("{id}: unexpected git show output")))
    }
}

/// Parse `<iso-8601 timestamp>\0<subject>` as printed by `git show`.
fn parse_description(raw: &str) -> Option<CommitDescription> {
    let (stamp, subject) = raw.trim_end_matches('\n').split_once('\0')?;
    let timestamp = DateTime::parse_from_rfc3339(stamp.trim()).ok()?;
    Some(CommitDescription {
        timestamp,
        subject: subject.trim().to_string(),
    })
}
