// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Grid read and write orchestration.
//!
//! [`GridService`] ties the canonical file store to remote replica
//! synchronization. Reads pull then load. Writes pull, save, then publish.
//!
//! # Failure Policy
//!
//! A failed pull never stops a read or a write. The dominant causes are a
//! first run, an unreachable network, or nothing new upstream, and none of
//! those should discard a user's edit. A genuine divergence surfaces later as a
//! rejected push instead, which _is_ reported.
//!
//! A failed save stops a write before anything is published. A failed publish
//! is reported even though the canonical file already holds the new grid.
//!
//! # Serialization
//!
//! Each service holds an async mutex around its read and write sequences, so
//! two requests served by one process never interleave their steps. Separate
//! processes sharing one working copy are still only serialized by git itself.

use crate::{
    config::Settings,
    grid::{Grid, Layout, SparseGrid},
    store::GridStore,
    sync::{git::GitSync, RepoSync},
};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Verdict of a service operation as shown to the user.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Verdict {
    /// Operation completed.
    pub success: bool,

    /// Short user-facing message.
    pub message: String,
}

impl Verdict {
    /// Construct successful verdict.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Construct failed verdict.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Orchestrates grid reads and writes against store and remote replica.
#[derive(Debug)]
pub struct GridService<S = GitSync>
where
    S: RepoSync,
{
    store: GridStore,
    sync: S,
    filename: String,
    message_prefix: String,
    lock: Mutex<()>,
}

impl GridService<GitSync> {
    /// Construct service backed by git from resolved settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut sync = GitSync::new(&settings.repo_path).timeout(settings.git_timeout());
        if let (Some(remote), Some(branch)) = (&settings.push_remote, &settings.push_branch) {
            sync = sync.push_target(remote, branch);
        }

        Self::new(
            GridStore::new(settings.data_path(), settings.layout()),
            sync,
            &settings.data_filename,
            &settings.commit_prefix,
        )
    }
}

impl<S> GridService<S>
where
    S: RepoSync,
{
    /// Construct new grid service.
    ///
    /// The filename is relative to the working copy, and is what gets staged
    /// on publish.
    pub fn new(
        store: GridStore,
        sync: S,
        filename: impl Into<String>,
        message_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sync,
            filename: filename.into(),
            message_prefix: message_prefix.into(),
            lock: Mutex::new(()),
        }
    }

    /// Layout of every grid this service hands out.
    pub fn layout(&self) -> &Layout {
        self.store.layout()
    }

    /// Access synchronization backend.
    pub fn backend(&self) -> &S {
        &self.sync
    }

    /// Fetch current grid.
    ///
    /// Pulls first, then loads whatever the canonical file holds. Neither a
    /// failed pull nor a broken canonical file is fatal.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_grid(&self) -> Grid {
        let _guard = self.lock.lock().await;
        self.pull_best_effort("fetch").await;
        self.store.load_or_unset()
    }

    /// Submit grid edited by a client.
    ///
    /// Pulls, saves the reindexed grid, then publishes it. A failed save skips
    /// publishing entirely.
    #[instrument(skip(self, incoming), level = "debug")]
    pub async fn submit_grid(&self, incoming: &Grid) -> Verdict {
        let _guard = self.lock.lock().await;
        self.pull_best_effort("submit").await;

        if let Err(error) = self.store.save(incoming) {
            warn!("save failed: {error}");
            return Verdict::failure(format!("儲存 CSV 失敗: {error}"));
        }
        debug!("資料已儲存至 CSV: {:?}", self.store.path().display());

        match self.sync.publish(&self.filename, &self.message_prefix).await {
            Ok(outcome) => {
                info!("submit finished: {}", outcome.message());
                Verdict::success(format!("更新成功！{}", outcome.message()))
            }
            Err(error) => {
                warn!("publish failed: {error}");
                Verdict::failure(error.to_string())
            }
        }
    }

    /// Submit partial day to person mapping as sent over the wire.
    pub async fn submit_sparse(&self, incoming: &SparseGrid) -> Verdict {
        self.submit_grid(&Grid::reindex(self.layout(), incoming)).await
    }

    /// Pull only, reporting the outcome as a verdict.
    #[instrument(skip(self), level = "debug")]
    pub async fn sync(&self) -> Verdict {
        let _guard = self.lock.lock().await;
        match self.sync.pull().await {
            Ok(outcome) => Verdict::success(outcome.message()),
            Err(error) => Verdict::failure(error.to_string()),
        }
    }

    async fn pull_best_effort(&self, stage: &str) {
        match self.sync.pull().await {
            Ok(outcome) => info!("{stage}: {}", outcome.message()),
            Err(error) => warn!("{stage}: pull failed, continuing with local data: {error}"),
        }
    }
}
