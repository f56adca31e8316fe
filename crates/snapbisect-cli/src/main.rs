//! Snapbisect - find the commit that introduced a regression using prebuilt
//! snapshots.
//!
//! Lists the snapshot artifacts published for a repository, orders their
//! commits through git, then repeatedly installs the midpoint snapshot and
//! asks whether it is good or bad until one commit separates the two.
//!
//! ## Exit codes
//!
//! - `0`: converged (or `--list` finished)
//! - `1`: any other failure
//! - `2`: the good/bad range is invalid
//! - `3`: no snapshots were found

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use snapbisect_core::{
    render_catalog, render_report, BisectConfig, BisectError, GitHistory, HttpArtifactIndex,
    Session, SnapshotRunner, TerminalOracle, UnmatchedPolicy,
};

#[derive(Parser, Debug)]
#[command(name = "snapbisect")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bisect regressions over prebuilt snapshot artifacts", long_about = None)]
struct Cli {
    /// Last known good commit or ref (default: oldest snapshot)
    #[arg(long)]
    good: Option<String>,

    /// First known bad commit or ref (default: newest snapshot)
    #[arg(long)]
    bad: Option<String>,

    /// TOML config file
    #[arg(short, long, env = "SNAPBISECT_CONFIG")]
    config: Option<PathBuf>,

    /// Git work tree to read history from
    #[arg(long)]
    repo: Option<PathBuf>,

    /// URL of the snapshot listing
    #[arg(long)]
    index_url: Option<String>,

    /// Directory artifacts are downloaded to
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Directory artifacts are mounted or extracted to
    #[arg(long)]
    mount_dir: Option<PathBuf>,

    /// Artifact-name regex with a `commit` group; repeat to try several
    #[arg(long = "pattern")]
    patterns: Vec<String>,

    /// What to do with listing entries that name no known commit: fail or skip
    #[arg(long)]
    on_unmatched: Option<UnmatchedPolicy>,

    /// Program to launch, relative to the mounted snapshot
    #[arg(long)]
    executable: Option<PathBuf>,

    /// Argument passed to the launched program; repeatable
    #[arg(long = "launch-arg", allow_hyphen_values = true)]
    launch_args: Vec<String>,

    /// List snapshot-backed commits in order and exit
    #[arg(long)]
    list: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    snapbisect_core::init_tracing(cli.json_logs, level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!(
        repo = %config.repo_dir.display(),
        index = config.index_url.as_deref().unwrap_or("-"),
        "snapbisect {}",
        snapbisect_core::VERSION
    );

    let history = Arc::new(GitHistory::new(&config.repo_dir));
    let index = HttpArtifactIndex::new(&config, history.clone())?;
    let session = Session::discover(history.as_ref(), &index)
        .await
        .context("failed to discover snapshots")?;

    if cli.list {
        print!("{}", render_catalog(&session.order, &session.catalog));
        return Ok(());
    }

    let interval = session
        .endpoints(history.as_ref(), cli.good.as_deref(), cli.bad.as_deref())
        .await?;
    let runner = SnapshotRunner::new(&config)?;
    let mut oracle = TerminalOracle::stdio();

    let report = session
        .bisect(history.as_ref(), &runner, &mut oracle, interval)
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

/// Defaults, then the config file, then `SNAPBISECT_*` variables, then flags.
fn load_config(cli: &Cli) -> Result<BisectConfig> {
    let base = match &cli.config {
        Some(path) => BisectConfig::from_toml_file(path)?,
        None => BisectConfig::default(),
    };
    let config = apply_flags(base.apply_env()?, cli);
    config.validate()?;
    Ok(config)
}

fn apply_flags(mut config: BisectConfig, cli: &Cli) -> BisectConfig {
    if let Some(repo) = &cli.repo {
        config = config.with_repo_dir(repo);
    }
    if let Some(url) = &cli.index_url {
        config = config.with_index_url(url);
    }
    if let Some(dir) = &cli.download_dir {
        config = config.with_download_dir(dir);
    }
    if let Some(dir) = &cli.mount_dir {
        config = config.with_mount_dir(dir);
    }
    if !cli.patterns.is_empty() {
        config = config.with_patterns(cli.patterns.clone());
    }
    if let Some(policy) = cli.on_unmatched {
        config = config.with_on_unmatched(policy);
    }
    if let Some(exe) = &cli.executable {
        config = config.with_executable(exe);
    }
    if !cli.launch_args.is_empty() {
        config.launch_args = cli.launch_args.clone();
    }
    config
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.chain().find_map(|e| e.downcast_ref::<BisectError>()) {
        Some(BisectError::NoSnapshots) => 3,
        Some(e) if e.is_range_error() => 2,
        _ => 1,
    }
}
