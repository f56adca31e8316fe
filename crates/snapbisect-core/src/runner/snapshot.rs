//! Download / mount / launch runner for snapshot artifacts.
//!
//! Stages run strictly in order: download, mount, execute, unmount, cleanup.
//! Teardown always runs once the download has started, and the first failing
//! stage is the one reported.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{ArtifactRunner, RunOutcome};
use crate::config::BisectConfig;
use crate::domain::{ArtifactLocator, ArtifactStage, BisectError, Result};

/// How an artifact is unpacked before it can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `.dmg`, attached with `hdiutil`.
    DiskImage,
    /// `.zip`, extracted with `unzip`.
    Zip,
    /// `.tar.gz` / `.tgz`, extracted with `tar`.
    Tarball,
}

impl ArtifactKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".dmg") {
            Some(ArtifactKind::DiskImage)
        } else if lower.ends_with(".zip") {
            Some(ArtifactKind::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArtifactKind::Tarball)
        } else {
            None
        }
    }
}

/// Program and arguments used to launch a mounted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for LaunchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// [`ArtifactRunner`] using scratch directories from [`BisectConfig`].
pub struct SnapshotRunner {
    http: reqwest::Client,
    download_dir: PathBuf,
    mount_dir: PathBuf,
    executable: Option<PathBuf>,
    launch_args: Vec<String>,
}

impl SnapshotRunner {
    pub fn new(config: &BisectConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("snapbisect/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BisectError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(SnapshotRunner {
            http,
            download_dir: config.download_dir.clone(),
            mount_dir: config.mount_dir.clone(),
            executable: config.executable.clone(),
            launch_args: config.launch_args.clone(),
        })
    }

    async fn download(&self, locator: &ArtifactLocator, target: &Path) -> Result<String> {
        let stage = ArtifactStage::Download;
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| BisectError::artifact(stage, format!("{}: {e}", self.download_dir.display())))?;

        let mut response = self
            .http
            .get(locator.url.clone())
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(target)
            .await
            .map_err(|e| BisectError::artifact(stage, format!("{}: {e}", target.display())))?;
        let mut hasher = Sha256::new();
        let mut bytes = 0u64;
        while let Some(chunk) = response.chunk().await? {
            hasher.update(&chunk);
            bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| BisectError::artifact(stage, e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| BisectError::artifact(stage, e.to_string()))?;

        let digest = hex::encode(hasher.finalize());
        let short = &digest[..12];
        debug!(artifact = %locator.name, bytes, digest = short, "downloaded artifact");
        Ok(digest)
    }

    async fn mount(&self, kind: ArtifactKind, file: &Path) -> Result<()> {
        let stage = ArtifactStage::Mount;
        let file = file.as_os_str();
        let mount = self.mount_dir.as_os_str();
        match kind {
            ArtifactKind::DiskImage => {
                run_tool(
                    stage,
                    "hdiutil",
                    &[
                        OsStr::new("attach"),
                        OsStr::new("-nobrowse"),
                        OsStr::new("-noautoopen"),
                        OsStr::new("-mountpoint"),
                        mount,
                        file,
                    ],
                )
                .await
            }
            ArtifactKind::Zip => {
                run_tool(stage, "unzip", &[OsStr::new("-q"), file, OsStr::new("-d"), mount]).await
            }
            ArtifactKind::Tarball => {
                run_tool(stage, "tar", &[OsStr::new("-xzf"), file, OsStr::new("-C"), mount]).await
            }
        }
    }

    async fn execute(&self) -> Result<Option<i32>> {
        let plan = resolve_launch(&self.mount_dir, self.executable.as_deref(), &self.launch_args)?;
        info!(command = %plan, "launching snapshot");

        let status = Command::new(&plan.program)
            .args(&plan.args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                BisectError::artifact(ArtifactStage::Execute, format!("{plan}: {e}"))
            })?;
        Ok(status.code())
    }

    async fn unmount(&self, kind: ArtifactKind) -> Result<()> {
        let stage = ArtifactStage::Unmount;
        if kind == ArtifactKind::DiskImage {
            run_tool(
                stage,
                "hdiutil",
                &[OsStr::new("detach"), OsStr::new("-quiet"), self.mount_dir.as_os_str()],
            )
            .await?;
        }
        remove_dir_if_present(&self.mount_dir)
            .await
            .map_err(|e| BisectError::artifact(stage, format!("{}: {e}", self.mount_dir.display())))
    }

    async fn cleanup(&self, file: &Path) -> Result<()> {
        match tokio::fs::remove_file(file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BisectError::artifact(
                ArtifactStage::Cleanup,
                format!("{}: {e}", file.display()),
            )),
        }
    }
}

#[async_trait]
impl ArtifactRunner for SnapshotRunner {
    async fn run_artifact(&self, locator: &ArtifactLocator) -> Result<RunOutcome> {
        let kind = ArtifactKind::from_name(&locator.name).ok_or_else(|| {
            BisectError::artifact(
                ArtifactStage::Mount,
                format!("unsupported artifact type: {}", locator.name),
            )
        })?;
        let file = self.download_dir.join(download_file_name(&locator.name)?);
        prepare_mount_point(&self.mount_dir).await?;

        let digest = match self.download(locator, &file).await {
            Ok(digest) => digest,
            Err(err) => {
                if let Err(cleanup_err) = self.cleanup(&file).await {
                    warn!(error = %cleanup_err, "cleanup after failed download also failed");
                }
                // Only succeeds while the mount point is still empty.
                tokio::fs::remove_dir(&self.mount_dir).await.ok();
                return Err(err);
            }
        };

        let mounted = self.mount(kind, &file).await;
        let executed = match &mounted {
            Ok(()) => Some(self.execute().await),
            Err(_) => None,
        };
        // A failed attach leaves nothing to detach; extraction may leave files.
        let unmounted = match (&mounted, kind) {
            (Err(_), ArtifactKind::DiskImage) => remove_dir_if_present(&self.mount_dir)
                .await
                .map_err(|e| BisectError::artifact(ArtifactStage::Unmount, e.to_string())),
            _ => self.unmount(kind).await,
        };
        let cleaned = self.cleanup(&file).await;

        mounted?;
        let exit_code = match executed {
            Some(result) => result?,
            None => None,
        };
        unmounted?;
        cleaned?;

        Ok(RunOutcome {
            artifact: locator.name.clone(),
            digest,
            exit_code,
        })
    }
}

/// Local file name for a listing entry; never escapes the download dir.
fn download_file_name(name: &str) -> Result<PathBuf> {
    Path::new(name.trim_end_matches('/'))
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| {
            BisectError::artifact(
                ArtifactStage::Download,
                format!("artifact name has no file component: {name}"),
            )
        })
}

/// Create the mount point, refusing to reuse one that still has content.
async fn prepare_mount_point(dir: &Path) -> Result<()> {
    let stage = ArtifactStage::Mount;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BisectError::artifact(stage, format!("{}: {e}", dir.display())))?;

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| BisectError::artifact(stage, format!("{}: {e}", dir.display())))?;
    let occupied = entries
        .next_entry()
        .await
        .map_err(|e| BisectError::artifact(stage, e.to_string()))?
        .is_some();
    if occupied {
        return Err(BisectError::artifact(
            stage,
            format!("mount point {} is not empty", dir.display()),
        ));
    }
    Ok(())
}

async fn remove_dir_if_present(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

async fn run_tool(stage: ArtifactStage, program: &str, args: &[&OsStr]) -> Result<()> {
    debug!(%stage, program, "running tool");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| BisectError::artifact(stage, format!("failed to run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BisectError::artifact(
            stage,
            format!("{program} exited with {}: {}", output.status, stderr.trim()),
        ));
    }
    Ok(())
}

/// Decide what to launch inside `mount`.
///
/// An explicit `executable` wins; otherwise the mount must hold exactly one
/// top-level `.app` bundle. Bundles are started with `open -W -n` so the call
/// returns only when the app quits.
pub fn resolve_launch(
    mount: &Path,
    executable: Option<&Path>,
    launch_args: &[String],
) -> Result<LaunchPlan> {
    let stage = ArtifactStage::Execute;
    let target = match executable {
        Some(relative) => {
            let path = mount.join(relative);
            if !path.exists() {
                return Err(BisectError::artifact(
                    stage,
                    format!("{} not found in snapshot", relative.display()),
                ));
            }
            path
        }
        None => {
            let entries = std::fs::read_dir(mount)
                .map_err(|e| BisectError::artifact(stage, format!("{}: {e}", mount.display())))?;
            let mut bundles: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "app"))
                .collect();
            bundles.sort();
            match bundles.len() {
                1 => bundles.remove(0),
                0 => {
                    return Err(BisectError::artifact(
                        stage,
                        "no .app bundle in snapshot; configure an executable",
                    ))
                }
                n => {
                    return Err(BisectError::artifact(
                        stage,
                        format!("{n} .app bundles in snapshot; configure an executable"),
                    ))
                }
            }
        }
    };

    if target.extension().is_some_and(|ext| ext == "app") {
        let mut args = vec![
            "-W".to_string(),
            "-n".to_string(),
            target.to_string_lossy().into_owned(),
        ];
        if !launch_args.is_empty() {
            args.push("--args".to_string());
            args.extend(launch_args.iter().cloned());
        }
        return Ok(LaunchPlan {
            program: PathBuf::from("open"),
            args,
        });
    }

    Ok(LaunchPlan {
        program: target,
        args: launch_args.to_vec(),
    })
}
