// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Synchronization through the git binary.
//!
//! [`GitSync`] adapts [`RepoSync`] to real git invocations. Every invocation
//! passes the working copy explicitly through "-C", so the working directory
//! of the serving process is never touched. Every invocation is also bounded
//! by a timeout, such that a hung network call cannot block a request forever.
//! Interactive credential prompts are disabled for the same reason.

use crate::sync::{
    classify::{classify_commit, classify_pull, classify_step, CommitClass, PullClass, ToolOutput},
    commit_message, PublishOutcome, PullOutcome, RepoSync, Result, SyncError,
};

use async_trait::async_trait;
use chrono::Local;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Default bound on a single git invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Layer of indirection for invoking git.
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run git with arguments against working copy at target path.
    ///
    /// Non-zero exit is not an error here. It is reported through
    /// [`ToolOutput::success`] so callers can classify it.
    async fn run(&self, repo: &Path, args: &[&str]) -> std::io::Result<ToolOutput>;
}

/// Run git as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: OsString,
}

impl ProcessRunner {
    /// Construct new runner for target git binary.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl GitRunner for ProcessRunner {
    async fn run(&self, repo: &Path, args: &[&str]) -> std::io::Result<ToolOutput> {
        // INVARIANT: Child dies with the future, so a timeout never leaks it.
        let output = Command::new(&self.program)
            .arg("-C")
            .arg(repo)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
        })
    }
}

/// Remote replica synchronization through git.
#[derive(Debug)]
pub struct GitSync<R = ProcessRunner>
where
    R: GitRunner,
{
    repo: PathBuf,
    runner: R,
    timeout: Duration,
    push_target: Option<(String, String)>,
}

impl GitSync<ProcessRunner> {
    /// Construct new git synchronizer for working copy at target path.
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self::with_runner(repo, ProcessRunner::default())
    }
}

impl<R> GitSync<R>
where
    R: GitRunner,
{
    /// Construct new git synchronizer with custom runner.
    pub fn with_runner(repo: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            repo: repo.into(),
            runner,
            timeout: DEFAULT_TIMEOUT,
            push_target: None,
        }
    }

    /// Bound every git invocation by target duration.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Push to explicit remote and branch instead of the configured upstream.
    pub fn push_target(mut self, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        self.push_target = Some((remote.into(), branch.into()));
        self
    }

    /// Path to working copy.
    pub fn repo(&self) -> &Path {
        self.repo.as_path()
    }

    /// Access underlying runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn ensure_working_copy(&self) -> Result<()> {
        if self.repo.join(".git").is_dir() {
            Ok(())
        } else {
            Err(SyncError::NotWorkingCopy(self.repo.clone()))
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn invoke(&self, args: &[&str]) -> Result<ToolOutput> {
        // INVARIANT: Never spawn git outside of a working copy.
        self.ensure_working_copy()?;

        let subcommand = args.first().copied().unwrap_or_default().to_string();
        debug!("run git {} in {:?}", args.join(" "), self.repo.display());

        let output = tokio::time::timeout(self.timeout, self.runner.run(&self.repo, args))
            .await
            .map_err(|_| {
                warn!("git {subcommand} timed out after {:?}", self.timeout);
                SyncError::Timeout {
                    subcommand: subcommand.clone(),
                    secs: self.timeout.as_secs(),
                }
            })?
            .map_err(|err| SyncError::Spawn {
                subcommand: subcommand.clone(),
                source: err,
            })?;

        if output.success {
            debug!("git {subcommand} ok");
        } else {
            warn!("git {subcommand} exited non-zero: {}", output.failure_text());
        }

        Ok(output)
    }
}

#[async_trait]
impl<R> RepoSync for GitSync<R>
where
    R: GitRunner,
{
    async fn pull(&self) -> Result<PullOutcome> {
        let output = self.invoke(&["pull", "--rebase"]).await?;
        match classify_pull(&output) {
            PullClass::Updated => Ok(PullOutcome::Updated),
            PullClass::AlreadyCurrent => Ok(PullOutcome::AlreadyCurrent),
            PullClass::Failed(text) => Err(SyncError::Pull(text)),
        }
    }

    async fn publish(&self, filename: &str, message_prefix: &str) -> Result<PublishOutcome> {
        let output = self.invoke(&["add", filename]).await?;
        classify_step(&output).map_err(SyncError::Stage)?;

        let message = commit_message(message_prefix, Local::now());
        let output = self.invoke(&["commit", "-m", message.as_str()]).await?;
        match classify_commit(&output) {
            CommitClass::Committed => info!("committed {filename:?}: {message}"),
            CommitClass::NothingToCommit => {
                info!("nothing to commit for {filename:?}");
                return Ok(PublishOutcome::NothingToCommit);
            }
            CommitClass::Failed(text) => return Err(SyncError::Commit(text)),
        }

        let output = match &self.push_target {
            Some((remote, branch)) => {
                self.invoke(&["push", remote.as_str(), branch.as_str()]).await?
            }
            None => self.invoke(&["push"]).await?,
        };
        classify_step(&output).map_err(SyncError::Push)?;
        info!("pushed {filename:?}");

        Ok(PublishOutcome::Pushed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{collections::VecDeque, fs::create_dir, sync::Mutex};
    use tempfile::TempDir;

    /// Scripted reply of a fake git invocation.
    #[derive(Debug, Clone)]
    pub(crate) enum Reply {
        Output(ToolOutput),
        Hang(Duration),
        SpawnError,
    }

    /// Runner that replays scripted replies and records every invocation.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedRunner {
        replies: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: Mutex::default(),
            }
        }

        pub(crate) fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn subcommands(&self) -> Vec<String> {
            self.calls().into_iter().map(|call| call[0].clone()).collect()
        }
    }

    #[async_trait]
    impl GitRunner for ScriptedRunner {
        async fn run(&self, _repo: &Path, args: &[&str]) -> std::io::Result<ToolOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(args.iter().map(ToString::to_string).collect());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::Output(ToolOutput::ok("")));

            match reply {
                Reply::Output(output) => Ok(output),
                Reply::Hang(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(ToolOutput::ok(""))
                }
                Reply::SpawnError => Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "git not found",
                )),
            }
        }
    }

    pub(crate) fn working_copy() -> anyhow::Result<TempDir> {
        let dir = TempDir::new()?;
        create_dir(dir.path().join(".git"))?;
        Ok(dir)
    }

    fn scripted(dir: &TempDir, replies: impl IntoIterator<Item = Reply>) -> GitSync<ScriptedRunner> {
        GitSync::with_runner(dir.path(), ScriptedRunner::new(replies))
    }

    #[tokio::test]
    async fn pull_tolerates_already_current_with_nonzero_exit() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(
            &dir,
            [Reply::Output(ToolOutput::failed("Already Up To Date.", ""))],
        );

        assert_eq!(sync.pull().await?, PullOutcome::AlreadyCurrent);
        assert_eq!(sync.runner().calls(), vec![vec!["pull", "--rebase"]]);

        Ok(())
    }

    #[tokio::test]
    async fn pull_reports_stderr_on_failure() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(
            &dir,
            [Reply::Output(ToolOutput::failed("", "fatal: no upstream\n"))],
        );

        let result = sync.pull().await;
        assert!(matches!(&result, Err(SyncError::Pull(text)) if text == "fatal: no upstream"));

        Ok(())
    }

    #[tokio::test]
    async fn publish_pushes_after_commit() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(
            &dir,
            [
                Reply::Output(ToolOutput::ok("")),
                Reply::Output(ToolOutput::ok("[main abc1234] update")),
                Reply::Output(ToolOutput::ok("")),
            ],
        );

        assert_eq!(sync.publish("lineinput.csv", "更新排程資料").await?, PublishOutcome::Pushed);

        let calls = sync.runner().calls();
        assert_eq!(sync.runner().subcommands(), vec!["add", "commit", "push"]);
        assert_eq!(calls[0], vec!["add", "lineinput.csv"]);
        assert_eq!(calls[1][1], "-m");
        assert!(calls[1][2].starts_with("更新排程資料 ("));
        assert_eq!(calls[2], vec!["push"]);

        Ok(())
    }

    #[tokio::test]
    async fn publish_pushes_when_prefix_echoes_noop_phrase() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(
            &dir,
            [
                Reply::Output(ToolOutput::ok("")),
                Reply::Output(ToolOutput::ok(
                    "[main abc1234] nothing to commit check (2025-03-07 09:05:01)",
                )),
                Reply::Output(ToolOutput::ok("")),
            ],
        );

        assert_eq!(
            sync.publish("lineinput.csv", "nothing to commit check").await?,
            PublishOutcome::Pushed
        );
        assert_eq!(sync.runner().subcommands(), vec!["add", "commit", "push"]);

        Ok(())
    }

    #[tokio::test]
    async fn publish_skips_push_on_noop_commit() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(
            &dir,
            [
                Reply::Output(ToolOutput::ok("")),
                Reply::Output(ToolOutput::failed("nothing to commit, working tree clean", "")),
            ],
        );

        assert_eq!(
            sync.publish("lineinput.csv", "更新排程資料").await?,
            PublishOutcome::NothingToCommit
        );
        assert_eq!(sync.runner().subcommands(), vec!["add", "commit"]);

        Ok(())
    }

    #[tokio::test]
    async fn publish_stops_on_commit_failure() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(
            &dir,
            [
                Reply::Output(ToolOutput::ok("")),
                Reply::Output(ToolOutput::failed("", "Author identity unknown")),
            ],
        );

        let result = sync.publish("lineinput.csv", "更新排程資料").await;
        assert!(matches!(&result, Err(SyncError::Commit(text)) if text == "Author identity unknown"));
        assert_eq!(sync.runner().subcommands(), vec!["add", "commit"]);

        Ok(())
    }

    #[tokio::test]
    async fn publish_stops_on_add_failure() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(
            &dir,
            [Reply::Output(ToolOutput::failed(
                "",
                "fatal: pathspec 'lineinput.csv' did not match any files",
            ))],
        );

        let result = sync.publish("lineinput.csv", "更新排程資料").await;
        assert!(matches!(result, Err(SyncError::Stage(_))));
        assert_eq!(sync.runner().subcommands(), vec!["add"]);

        Ok(())
    }

    #[tokio::test]
    async fn publish_reports_push_rejection() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(
            &dir,
            [
                Reply::Output(ToolOutput::ok("")),
                Reply::Output(ToolOutput::ok("[main abc1234] update")),
                Reply::Output(ToolOutput::failed("", "! [rejected] main -> main (fetch first)\n")),
            ],
        );

        let result = sync.publish("lineinput.csv", "更新排程資料").await;
        let error = result.err().ok_or_else(|| anyhow::anyhow!("push should fail"))?;
        assert_eq!(
            error.to_string(),
            "Git push 失敗: ! [rejected] main -> main (fetch first)"
        );

        Ok(())
    }

    #[tokio::test]
    async fn publish_uses_explicit_push_target() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(&dir, []).push_target("origin", "main");

        assert_eq!(sync.publish("lineinput.csv", "更新排程資料").await?, PublishOutcome::Pushed);
        assert_eq!(sync.runner().calls()[2], vec!["push", "origin", "main"]);

        Ok(())
    }

    #[tokio::test]
    async fn missing_working_copy_never_spawns() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let sync = scripted(&dir, []);

        assert!(matches!(sync.pull().await, Err(SyncError::NotWorkingCopy(_))));
        assert!(matches!(
            sync.publish("lineinput.csv", "更新排程資料").await,
            Err(SyncError::NotWorkingCopy(_))
        ));
        assert!(sync.runner().calls().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn hung_invocation_times_out() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(&dir, [Reply::Hang(Duration::from_secs(5))])
            .timeout(Duration::from_millis(20));

        let result = sync.pull().await;
        assert!(matches!(&result, Err(SyncError::Timeout { subcommand, .. }) if subcommand == "pull"));

        Ok(())
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() -> anyhow::Result<()> {
        let dir = working_copy()?;
        let sync = scripted(&dir, [Reply::SpawnError]);

        assert!(matches!(sync.pull().await, Err(SyncError::Spawn { .. })));

        Ok(())
    }
}
