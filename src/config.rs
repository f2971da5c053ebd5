// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the gridsync configuration file, and how environment
//! variables override it. Settings are resolved once at process start and
//! then handed to whatever needs them. Nothing re-reads configuration per
//! request. File I/O is left to the caller to figure out.
//!
//! # Resolution Order
//!
//! 1. Built-in defaults, see [`Settings::default`].
//! 2. Configuration file, see [`Settings::from_str`].
//! 3. Environment variables, see [`Settings::with_env`].
//! 4. Command-line flags, applied by the binary.
//!
//! # Environment Variables
//!
//! | Variable                    | Field              |
//! |-----------------------------|--------------------|
//! | `GRIDSYNC_REPO_PATH`        | `repo_path`        |
//! | `GRIDSYNC_DATA_FILENAME`    | `data_filename`    |
//! | `GRIDSYNC_COMMIT_PREFIX`    | `commit_prefix`    |
//! | `GRIDSYNC_DAYS`             | `days`             |
//! | `GRIDSYNC_PEOPLE`           | `people`           |
//! | `GRIDSYNC_BIND`             | `bind`             |
//! | `GRIDSYNC_GIT_TIMEOUT_SECS` | `git_timeout_secs` |
//! | `GRIDSYNC_PUSH_REMOTE`      | `push_remote`      |
//! | `GRIDSYNC_PUSH_BRANCH`      | `push_branch`      |
//!
//! List variables are comma separated.

use crate::grid::Layout;

use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    env::VarError,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

/// Resolved gridsync settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Path to git working copy holding the canonical file.
    pub repo_path: PathBuf,

    /// Name of canonical file relative to working copy.
    pub data_filename: String,

    /// Prefix of every commit message.
    pub commit_prefix: String,

    /// Ordered day labels.
    pub days: Vec<String>,

    /// Ordered person labels.
    pub people: Vec<String>,

    /// Address to serve HTTP on.
    pub bind: SocketAddr,

    /// Bound on every git invocation in seconds.
    pub git_timeout_secs: u64,

    /// Remote to push to instead of the configured upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_remote: Option<String>,

    /// Branch to push to instead of the configured upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_branch: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            data_filename: "lineinput.csv".into(),
            commit_prefix: "更新排程資料".into(),
            days: ["週一", "週二", "週三", "週四", "週五", "週六", "週日"]
                .map(String::from)
                .to_vec(),
            people: ["陳貫裕", "吳伯聰", "簡尚祿", "周文樹", "徐滄興", "蕭金泉"]
                .map(String::from)
                .to_vec(),
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            git_timeout_secs: 10,
            push_remote: None,
            push_branch: None,
        }
    }
}

impl Settings {
    /// Apply overrides from process environment.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Env`] if a variable is not valid unicode, or
    ///   cannot be parsed into its field.
    /// - Return [`ConfigError::ShellExpansion`] if repository path cannot be
    ///   shell expanded.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| match std::env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(err) => Err(ConfigError::Env {
                var: key.into(),
                reason: err.to_string(),
            }),
        })
    }

    /// Apply overrides from arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Env`] if a variable cannot be parsed into its
    ///   field.
    /// - Return [`ConfigError::ShellExpansion`] if repository path cannot be
    ///   shell expanded.
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        if let Some(path) = lookup("GRIDSYNC_REPO_PATH")? {
            self.repo_path = expand_path(&path)?;
        }

        if let Some(filename) = lookup("GRIDSYNC_DATA_FILENAME")? {
            self.data_filename = filename;
        }

        if let Some(prefix) = lookup("GRIDSYNC_COMMIT_PREFIX")? {
            self.commit_prefix = prefix;
        }

        if let Some(days) = lookup("GRIDSYNC_DAYS")? {
            self.days = split_list(&days);
        }

        if let Some(people) = lookup("GRIDSYNC_PEOPLE")? {
            self.people = split_list(&people);
        }

        if let Some(bind) = lookup("GRIDSYNC_BIND")? {
            self.bind = bind.trim().parse().map_err(|err: std::net::AddrParseError| {
                ConfigError::Env {
                    var: "GRIDSYNC_BIND".into(),
                    reason: err.to_string(),
                }
            })?;
        }

        if let Some(secs) = lookup("GRIDSYNC_GIT_TIMEOUT_SECS")? {
            self.git_timeout_secs =
                secs.trim().parse().map_err(|err: std::num::ParseIntError| {
                    ConfigError::Env {
                        var: "GRIDSYNC_GIT_TIMEOUT_SECS".into(),
                        reason: err.to_string(),
                    }
                })?;
        }

        if let Some(remote) = lookup("GRIDSYNC_PUSH_REMOTE")? {
            self.push_remote = Some(remote).filter(|remote| !remote.is_empty());
        }

        if let Some(branch) = lookup("GRIDSYNC_PUSH_BRANCH")? {
            self.push_branch = Some(branch).filter(|branch| !branch.is_empty());
        }

        Ok(self)
    }

    /// Check that settings describe a usable deployment.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Invalid`] if labels are empty or duplicated,
    ///   the canonical filename is not a plain filename, or the git timeout is
    ///   zero.
    pub fn validate(&self) -> Result<()> {
        check_labels("days", &self.days)?;
        check_labels("people", &self.people)?;

        let filename = self.data_filename.as_str();
        if filename.is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains(['/', '\\'])
        {
            return Err(ConfigError::Invalid(format!(
                "data_filename {filename:?} must be a plain filename"
            )));
        }

        if self.git_timeout_secs == 0 {
            return Err(ConfigError::Invalid("git_timeout_secs must be positive".into()));
        }

        if self.push_remote.is_some() != self.push_branch.is_some() {
            return Err(ConfigError::Invalid(
                "push_remote and push_branch must be set together".into(),
            ));
        }

        Ok(())
    }

    /// Grid layout described by configured labels.
    pub fn layout(&self) -> Layout {
        Layout::new(self.days.iter().cloned(), self.people.iter().cloned())
    }

    /// Absolute location of canonical file.
    pub fn data_path(&self) -> PathBuf {
        self.repo_path.join(&self.data_filename)
    }

    /// Bound on every git invocation.
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on repository path field.
        settings.repo_path = expand_path(settings.repo_path.to_string_lossy().as_ref())?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &str) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path)
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn check_labels(field: &str, labels: &[String]) -> Result<()> {
    if labels.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = labels.iter().find(|label| !seen.insert(label.as_str())) {
        return Err(ConfigError::Invalid(format!(
            "{field} lists {duplicate:?} more than once"
        )));
    }

    Ok(())
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<VarError>),

    /// Environment variable cannot be used.
    #[error("invalid environment variable {var}: {reason}")]
    Env { var: String, reason: String },

    /// Settings do not describe a usable deployment.
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
