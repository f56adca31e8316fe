//! Run configuration.
//!
//! Values layer as defaults, then an optional TOML file, then `SNAPBISECT_*`
//! environment variables; the CLI applies its flags last. Scratch paths are
//! always carried in the config so separate runs never share directories
//! unless told to.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{BisectError, Result};
use crate::index::UnmatchedPolicy;

/// Everything the collaborators need to know about their environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BisectConfig {
    /// Git work tree answering history questions.
    pub repo_dir: PathBuf,
    /// Remote listing of snapshot artifacts.
    pub index_url: Option<String>,
    /// Where artifacts are downloaded to.
    pub download_dir: PathBuf,
    /// Where the current artifact is mounted or extracted.
    pub mount_dir: PathBuf,
    /// Artifact-name patterns, tried in order. Empty means the built-in set.
    pub patterns: Vec<String>,
    pub on_unmatched: UnmatchedPolicy,
    /// Program to launch, relative to the mount point.
    pub executable: Option<PathBuf>,
    pub launch_args: Vec<String>,
}

impl Default for BisectConfig {
    fn default() -> Self {
        let scratch = std::env::temp_dir().join("snapbisect");
        BisectConfig {
            repo_dir: PathBuf::from("."),
            index_url: None,
            download_dir: scratch.join("downloads"),
            mount_dir: scratch.join("mount"),
            patterns: Vec::new(),
            on_unmatched: UnmatchedPolicy::default(),
            executable: None,
            launch_args: Vec::new(),
        }
    }
}

impl BisectConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env()
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BisectError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
            .map_err(|e| BisectError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BisectError::Config(e.to_string()))
    }

    /// Override fields from `SNAPBISECT_*` variables that are set.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(repo) = var("SNAPBISECT_REPO") {
            self.repo_dir = PathBuf::from(repo);
        }
        if let Some(url) = var("SNAPBISECT_INDEX_URL") {
            self.index_url = Some(url);
        }
        if let Some(dir) = var("SNAPBISECT_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("SNAPBISECT_MOUNT_DIR") {
            self.mount_dir = PathBuf::from(dir);
        }
        if let Some(policy) = var("SNAPBISECT_ON_UNMATCHED") {
            self.on_unmatched = policy.parse().map_err(BisectError::Config)?;
        }
        if let Some(exe) = var("SNAPBISECT_EXECUTABLE") {
            self.executable = Some(PathBuf::from(exe));
        }
        Ok(self)
    }

    pub fn with_repo_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.repo_dir = dir.into();
        self
    }

    pub fn with_index_url(mut self, url: &str) -> Self {
        self.index_url = Some(url.to_string());
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_mount_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mount_dir = dir.into();
        self
    }

    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_on_unmatched(mut self, policy: UnmatchedPolicy) -> Self {
        self.on_unmatched = policy;
        self
    }

    pub fn with_executable(mut self, exe: impl Into<PathBuf>) -> Self {
        self.executable = Some(exe.into());
        self
    }

    /// The index URL, required before any snapshot can be listed.
    pub fn require_index_url(&self) -> Result<&str> {
        self.index_url
            .as_deref()
            .ok_or_else(|| BisectError::Config("no snapshot index URL configured".to_string()))
    }

    /// Reject settings that would make the runner clobber its own files.
    pub fn validate(&self) -> Result<()> {
        if self.download_dir == self.mount_dir {
            return Err(BisectError::Config(
                "download_dir and mount_dir must differ".to_string(),
            ));
        }
        if self.mount_dir.starts_with(&self.download_dir)
            || self.download_dir.starts_with(&self.mount_dir)
        {
            return Err(BisectError::Config(
                "download_dir and mount_dir must not contain one another".to_string(),
            ));
        }
        Ok(())
    }
}
