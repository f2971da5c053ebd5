// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shared schedule grid kept in a git working copy.
//!
//! A __grid__ is a fixed table of days by people, where each cell is either
//! "O", "X", or blank. The grid lives as a CSV file inside a git working copy,
//! and every write is committed and pushed so that all replicas converge on
//! the same file.
//!
//! # Layers
//!
//! - [`grid`] holds the in-memory grid model.
//! - [`store`] reads and writes the canonical CSV file.
//! - [`sync`] pulls and publishes the working copy through git.
//! - [`service`] orchestrates reads and writes over both.
//! - [`http`] exposes the service to browsers.

pub mod config;
pub mod grid;
pub mod http;
pub mod path;
pub mod service;
pub mod store;
pub mod sync;

pub use config::Settings;
pub use grid::{CellState, Grid, Layout, SparseGrid};
pub use service::{GridService, Verdict};
pub use store::GridStore;
pub use sync::{git::GitSync, PublishOutcome, PullOutcome, RepoSync};
