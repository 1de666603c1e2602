// src/exec/command.rs

//! Executor that delegates to an external shell command.
//!
//! Protocol: the plan is written to the child's stdin as one JSON document
//! `{"plan": .., "units": [..]}`; the child prints one JSON [`UnitReport`]
//! per line on stdout. Stderr is forwarded to the log at debug level.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::exec::backend::{BuildExecutor, BuildOutcome};
use crate::graph::{ReportBuffer, UnitReport};
use crate::planner::BuildPlan;

#[derive(Serialize)]
struct PlanMessage<'a> {
    plan: &'a BuildPlan,
    units: &'a [String],
}

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    cmd: String,
    root: PathBuf,
}

impl CommandExecutor {
    pub fn new(cmd: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            root: root.into(),
        }
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        }
    }

    async fn run(&self, plan: &BuildPlan, units: &[String]) -> Result<BuildOutcome> {
        let payload = serde_json::to_vec(&PlanMessage { plan, units })
            .context("encoding plan for executor")?;

        info!(cmd = %self.cmd, units = plan.unit_count(), full = plan.is_full(), "starting executor");

        let mut cmd = self.shell();
        cmd.current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning executor '{}'", self.cmd))?;

        let mut stdin = child.stdin.take().context("executor stdin not captured")?;
        let stdout = child.stdout.take().context("executor stdout not captured")?;

        // Feed stdin concurrently so a child that streams reports before
        // reading all input can't deadlock us.
        let writer = tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        });

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("executor stderr: {}", line);
                }
            });
        }

        let mut buffer = ReportBuffer::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("reading executor stdout")?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<UnitReport>(line) {
                Ok(report) => buffer.push(report),
                Err(err) => warn!(error = %err, line = %line, "ignoring malformed unit report"),
            }
        }

        let status = child.wait().await.context("waiting for executor")?;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("executor closed stdin before reading the whole plan");
            }
            Ok(Err(err)) => return Err(err).context("writing plan to executor"),
            Err(join) => return Err(join).context("plan writer task"),
        }

        if !status.success() {
            bail!(
                "executor '{}' exited with code {}",
                self.cmd,
                status.code().unwrap_or(-1)
            );
        }

        info!(reports = buffer.len(), "executor finished");
        Ok(BuildOutcome::from_buffers([buffer]))
    }
}

impl BuildExecutor for CommandExecutor {
    fn execute<'a>(
        &'a self,
        plan: &'a BuildPlan,
        units: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<BuildOutcome>> + Send + 'a>> {
        Box::pin(self.run(plan, units))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::planner::FullRebuildReason;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_json_line_reports_and_skips_noise() {
        let dir = TempDir::new().unwrap();
        let script = r#"cat > plan.json; echo '{"unit":"content/a.md","output":"a/index.html"}'; echo 'progress 50%'; echo '{"unit":"content/b.md","success":false}'"#;
        let exec = CommandExecutor::new(script, dir.path());

        let mut plan = BuildPlan::default();
        plan.rebuild.insert("content/a.md".into());
        plan.rebuild.insert("content/b.md".into());

        let outcome = exec.execute(&plan, &[]).await.unwrap();
        assert_eq!(outcome.reports.len(), 2);
        assert_eq!(outcome.reports[0].output.as_deref(), Some("a/index.html"));
        assert_eq!(outcome.failed_count(), 1);

        let sent: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("plan.json")).unwrap()).unwrap();
        assert_eq!(sent["plan"]["rebuild"][0], "content/a.md");
    }

    #[tokio::test]
    async fn full_plan_carries_units_and_reason() {
        let dir = TempDir::new().unwrap();
        let exec = CommandExecutor::new("cat > plan.json", dir.path());
        let plan = BuildPlan::full(FullRebuildReason::ColdCache);
        let units = vec!["content/a.md".to_string()];

        exec.execute(&plan, &units).await.unwrap();
        let sent: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("plan.json")).unwrap()).unwrap();
        assert_eq!(sent["plan"]["full_rebuild"]["reason"], "cold-cache");
        assert_eq!(sent["units"][0], "content/a.md");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let dir = TempDir::new().unwrap();
        let exec = CommandExecutor::new("exit 3", dir.path());
        let err = exec.execute(&BuildPlan::default(), &[]).await.unwrap_err();
        assert!(err.to_string().contains("code 3"));
    }
}
