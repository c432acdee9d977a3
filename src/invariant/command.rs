//! Evaluator that runs an external program per batch.
//!
//! The serialized job batch is written to the child's stdin (and optionally
//! appended as the last argument). The child's stdout is decoded with
//! [`EvaluatorResponse::from_output`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::collector::InvariantJob;
use super::evaluator::{EvaluatorResponse, InvariantEvaluator};
use crate::error::EvaluatorError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandEvaluatorConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Also pass the JSON batch as the final command-line argument.
    #[serde(default)]
    pub batch_as_argument: bool,
    #[serde(default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl CommandEvaluatorConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            batch_as_argument: false,
            timeout: None,
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_batch_as_argument(mut self, enabled: bool) -> Self {
        self.batch_as_argument = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    config: CommandEvaluatorConfig,
}

impl CommandEvaluator {
    pub fn new(config: CommandEvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandEvaluatorConfig {
        &self.config
    }

    async fn run(&self, payload: String) -> Result<std::process::Output, EvaluatorError> {
        let mut command = Command::new(&self.config.program);
        command.args(&self.config.args);
        if self.config.batch_as_argument {
            command.arg(&payload);
        }
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| EvaluatorError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let write_batch = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(payload.as_bytes()).await {
                    // The child may answer without reading its input.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
                stdin.shutdown().await.ok();
            }
            Ok::<_, std::io::Error>(())
        };

        let (written, output) = tokio::join!(write_batch, child.wait_with_output());
        written?;
        Ok(output?)
    }
}

#[async_trait]
impl InvariantEvaluator for CommandEvaluator {
    async fn evaluate(&self, jobs: &[InvariantJob]) -> Result<EvaluatorResponse, EvaluatorError> {
        let payload = serde_json::to_string(jobs)?;
        tracing::debug!(
            "Submitting {} invariant jobs to '{}' ({} bytes)",
            jobs.len(),
            self.config.program,
            payload.len()
        );

        let output = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(payload))
                .await
                .map_err(|_| EvaluatorError::Timeout {
                    millis: limit.as_millis(),
                })??,
            None => self.run(payload).await?,
        };

        if !output.status.success() {
            return Err(EvaluatorError::ExitStatus {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        EvaluatorResponse::from_output(&String::from_utf8_lossy(&output.stdout))
    }
}
