// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git output classification.
//!
//! Git does not report "already current" or "nothing to commit" through its
//! exit code alone, so outcomes are recognized by phrase. The phrase tables
//! below are the only place where git output text is interpreted.
//!
//! # Pitfalls
//!
//! Git output is meant for humans. Phrasing changes across git versions, and
//! git translates its messages according to the locale of the serving process.
//! Both the default English phrasing and the Chinese translations seen in
//! deployment are listed, and matching is case-insensitive over stdout and
//! stderr. A phrase missing from these tables turns a harmless situation into a
//! reported failure, never the other way around.

/// Phrases meaning the working copy is already current with its upstream.
pub const ALREADY_CURRENT: &[&str] = &[
    "already up to date",
    "already up-to-date",
    "is up to date",
    "已經是最新",
    "已经是最新",
    "無變更",
];

/// Phrases meaning a commit had nothing to record.
pub const NOTHING_TO_COMMIT: &[&str] = &[
    "nothing to commit",
    "nothing added to commit",
    "no changes added to commit",
    "無變更需提交",
    "沒有要提交的",
    "无文件要提交",
];

/// Captured result of one git invocation.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ToolOutput {
    /// Git exited with status zero.
    pub success: bool,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// Construct output of a successful invocation.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Construct output of a failed invocation.
    pub fn failed(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Human-readable failure text.
    ///
    /// Prefers standard error, and falls back to standard output when git
    /// wrote nothing to standard error.
    pub fn failure_text(&self) -> String {
        match self.stderr.trim() {
            "" => self.stdout.trim().to_string(),
            stderr => stderr.to_string(),
        }
    }

    /// Check if either output stream mentions any of the phrases.
    pub fn mentions(&self, phrases: &[&str]) -> bool {
        let stdout = self.stdout.to_lowercase();
        let stderr = self.stderr.to_lowercase();
        phrases
            .iter()
            .any(|phrase| stdout.contains(phrase) || stderr.contains(phrase))
    }
}

/// Classified pull result.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PullClass {
    Updated,
    AlreadyCurrent,
    Failed(String),
}

/// Classified commit result.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CommitClass {
    Committed,
    NothingToCommit,
    Failed(String),
}

/// Classify output of `git pull --rebase`.
///
/// An "already current" phrase counts as success even with a non-zero exit.
pub fn classify_pull(output: &ToolOutput) -> PullClass {
    if output.mentions(ALREADY_CURRENT) {
        PullClass::AlreadyCurrent
    } else if output.success {
        PullClass::Updated
    } else {
        PullClass::Failed(output.failure_text())
    }
}

/// Classify output of `git commit`.
///
/// Git exits non-zero when there is nothing to record, so the "nothing to
/// commit" phrase is only consulted for failed invocations. A successful commit
/// whose message happens to echo such a phrase still counts as committed.
pub fn classify_commit(output: &ToolOutput) -> CommitClass {
    if output.success {
        CommitClass::Committed
    } else if output.mentions(NOTHING_TO_COMMIT) {
        CommitClass::NothingToCommit
    } else {
        CommitClass::Failed(output.failure_text())
    }
}

/// Classify output of a step that only succeeds or fails, e.g., add or push.
///
/// # Errors
///
/// - Return failure text if git exited non-zero.
pub fn classify_step(output: &ToolOutput) -> Result<(), String> {
    if output.success {
        Ok(())
    } else {
        Err(output.failure_text())
    }
}
