//! Verdict oracles.
//!
//! The engine asks a [`VerdictProvider`] to classify each tested snapshot.
//! [`TerminalOracle`] asks a human on a line-oriented terminal and re-prompts
//! until it reads `good` or `bad`; [`ScriptedOracle`] replays a fixed list.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::domain::{BisectError, CommitSummary, Result, Verdict};

/// Supplies the good/bad classification for one tested commit.
#[async_trait]
pub trait VerdictProvider: Send {
    /// Blocks until a verdict is available. There is no default answer.
    async fn prompt_verdict(&mut self, context: &CommitSummary) -> Result<Verdict>;
}

/// Interactive oracle over a reader/writer pair.
pub struct TerminalOracle<R, W> {
    input: R,
    output: W,
}

impl TerminalOracle<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Oracle reading stdin and prompting on stdout.
    pub fn stdio() -> Self {
        TerminalOracle::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> TerminalOracle<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        TerminalOracle { input, output }
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.output
            .write_all(text.as_bytes())
            .await
            .map_err(|e| BisectError::Oracle(e.to_string()))?;
        self.output
            .flush()
            .await
            .map_err(|e| BisectError::Oracle(e.to_string()))
    }
}

#[async_trait]
impl<R, W> VerdictProvider for TerminalOracle<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn prompt_verdict(&mut self, context: &CommitSummary) -> Result<Verdict> {
        self.write(&format!("Tested {context}\n")).await?;
        loop {
            self.write("Is this snapshot good or bad? [good/bad] ").await?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .await
                .map_err(|e| BisectError::Oracle(e.to_string()))?;
            if read == 0 {
                return Err(BisectError::Oracle(
                    "input closed before a verdict was given".to_string(),
                ));
            }

            match line.parse::<Verdict>() {
                Ok(verdict) => return Ok(verdict),
                Err(reason) => {
                    debug!(input = %line.trim(), "rejected verdict input");
                    self.write(&format!("{reason}\n")).await?;
                }
            }
        }
    }
}

/// Oracle answering from a pre-recorded verdict sequence.
#[derive(Debug, Default, Clone)]
pub struct ScriptedOracle {
    verdicts: VecDeque<Verdict>,
    asked: Vec<CommitSummary>,
}

impl ScriptedOracle {
    pub fn new(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        ScriptedOracle {
            verdicts: verdicts.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Commits the oracle was asked about, in order.
    pub fn asked(&self) -> &[CommitSummary] {
        &self.asked
    }

    pub fn remaining(&self) -> usize {
        self.verdicts.len()
    }
}

#[async_trait]
impl VerdictProvider for ScriptedOracle {
    async fn prompt_verdict(&mut self, context: &CommitSummary) -> Result<Verdict> {
        self.asked.push(context.clone());
        self.verdicts.pop_front().ok_or_else(|| {
            BisectError::Oracle(format!("no scripted verdict left for {}", context.id))
        })
    }
}
