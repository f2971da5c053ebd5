// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote replica synchronization.
//!
//! Every deployment of gridsync keeps its canonical file inside a git
//! __working copy__. The remote repository that working copy tracks is the
//! authoritative replica that all deployments converge on.
//!
//! # Synchronization Cycle
//!
//! Synchronization is split into two steps:
//!
//! 1. __Pull__: rebase the working copy onto the remote replica. This happens
//!    before every read and before every write.
//! 2. __Publish__: stage the canonical file, commit it with a timestamped
//!    message, and push the commit to the remote replica.
//!
//! A single publish moves through the following states:
//!
//! ```text
//! Start -> Staged -> Committed  -> Pushed
//!                 |            \-> PushFailed
//!                 |-> NoOpCommit
//!                 \-> CommitFailed
//! ```
//!
//! A no-op commit means the working copy already matches its last commit.
//! That is a success, and no push is attempted because there is nothing new to
//! send.
//!
//! # Capability Seam
//!
//! Callers only ever see the [`RepoSync`] trait, so the whole cycle can be
//! replaced by a fake in tests. The production implementation is
//! [`GitSync`](crate::sync::git::GitSync), which drives the git binary through
//! a further [`GitRunner`](crate::sync::git::GitRunner) seam.

pub mod classify;
pub mod git;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use std::{fmt::Display, path::PathBuf};

/// Successful outcome of a pull.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PullOutcome {
    /// Working copy received new commits, or at least git said it was fine.
    Updated,

    /// Working copy was already current with the remote replica.
    AlreadyCurrent,
}

impl PullOutcome {
    /// User-facing message for this outcome.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Updated => "資料已同步",
            Self::AlreadyCurrent => "已是最新版本",
        }
    }
}

/// Successful outcome of a publish.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PublishOutcome {
    /// New commit was pushed to the remote replica.
    Pushed,

    /// Nothing changed, so nothing was committed or pushed.
    NothingToCommit,
}

impl PublishOutcome {
    /// User-facing message for this outcome.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Pushed => "變更已成功推送至 GitHub",
            Self::NothingToCommit => "沒有偵測到檔案變更，無需提交",
        }
    }
}

/// Layer of indirection for remote replica synchronization.
#[async_trait]
pub trait RepoSync: Send + Sync {
    /// Rebase working copy onto remote replica.
    async fn pull(&self) -> Result<PullOutcome>;

    /// Stage, commit, and push target file of working copy.
    ///
    /// The commit message is the prefix followed by a local timestamp.
    async fn publish(&self, filename: &str, message_prefix: &str) -> Result<PublishOutcome>;
}

/// Compose commit message from prefix and timestamp.
///
/// Produces "prefix (YYYY-MM-DD HH:MM:SS)".
pub fn commit_message<Tz>(prefix: &str, timestamp: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{prefix} ({})", timestamp.format("%Y-%m-%d %H:%M:%S"))
}

/// All possible error types for remote replica synchronization.
///
/// Display output is the user-facing failure message.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Target path is not a git working copy.
    #[error("{} 不是 Git 倉庫", .0.display())]
    NotWorkingCopy(PathBuf),

    /// Git did not finish in time.
    #[error("Git {subcommand} 超過 {secs} 秒未回應")]
    Timeout { subcommand: String, secs: u64 },

    /// Git could not be spawned at all.
    #[error("Git {subcommand} 執行錯誤: {source}")]
    Spawn {
        subcommand: String,
        source: std::io::Error,
    },

    /// Pull was rejected.
    #[error("Git pull 失敗: {0}")]
    Pull(String),

    /// Canonical file could not be staged.
    #[error("Git add 失敗: {0}")]
    Stage(String),

    /// Commit was rejected.
    #[error("Git commit 失敗: {0}")]
    Commit(String),

    /// Push was rejected.
    #[error("Git push 失敗: {0}")]
    Push(String),
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
