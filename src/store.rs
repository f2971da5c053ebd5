// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Canonical grid file storage.
//!
//! Gridsync keeps exactly one file per deployment called the
//! __canonical file__. It lives inside the git working copy so that it can be
//! published to the remote replica after every write.
//!
//! # Canonical File Layout
//!
//! The canonical file is plain CSV encoded as UTF-8 with a leading byte order
//! mark. The first row is the header, where the first cell is an empty index
//! name and every following cell is a person label. Every other row starts
//! with a day label followed by one cell per person holding "O", "X", or
//! nothing at all:
//!
//! ```text
//! ,陳貫裕,吳伯聰
//! 週一,O,
//! 週二,,X
//! ```
//!
//! # Tolerance
//!
//! The file may be edited by hand, or written by another deployment whose
//! day and person lists differ from ours. Thus, the store never fails closed on
//! shape. Reads and writes are always reindexed onto the current [`Layout`].
//! The byte order mark is optional on read, short rows are padded with unset
//! cells, and the first occurrence wins for duplicate day rows or duplicate
//! person columns.

use crate::grid::{CellState, Grid, Layout, SparseGrid};

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use std::{
    collections::{HashMap, HashSet},
    fs::{read, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Storage for the canonical grid file.
#[derive(Debug, Clone)]
pub struct GridStore {
    path: PathBuf,
    layout: Layout,
}

impl GridStore {
    /// Construct new grid store for canonical file at target path.
    pub fn new(path: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            path: path.into(),
            layout,
        }
    }

    /// Path to canonical file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Layout that every loaded and saved grid is shaped by.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Load grid from canonical file.
    ///
    /// A missing canonical file is not an error. It simply means that nothing
    /// has been scheduled yet, so an unset grid is returned.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Read`] if canonical file cannot be read.
    /// - Return [`StoreError::Parse`] if canonical file is not valid CSV.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&self) -> Result<Grid> {
        let bytes = match read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("canonical file {:?} does not exist yet", self.path.display());
                return Ok(Grid::unset(&self.layout));
            }
            Err(err) => {
                return Err(StoreError::Read {
                    source: err,
                    path: self.path.clone(),
                })
            }
        };

        decode(&self.layout, &bytes).map_err(|err| StoreError::Parse {
            source: err,
            path: self.path.clone(),
        })
    }

    /// Load grid from canonical file, falling back to an unset grid.
    ///
    /// Read and parse failures are logged rather than returned, because a
    /// broken canonical file should not stop the grid from being shown.
    pub fn load_or_unset(&self) -> Grid {
        self.load().unwrap_or_else(|error| {
            warn!("{error}");
            Grid::unset(&self.layout)
        })
    }

    /// Save grid to canonical file.
    ///
    /// The grid is reindexed onto the store's layout before it is written, and
    /// parent directories of the canonical file are created if missing.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Encode`] if grid cannot be encoded as CSV.
    /// - Return [`StoreError::CreateDir`] if parent directories cannot be
    ///   created.
    /// - Return [`StoreError::Write`] if canonical file cannot be written.
    #[instrument(skip(self, grid), level = "debug")]
    pub fn save(&self, grid: &Grid) -> Result<()> {
        let bytes = encode(&grid.conform(&self.layout))?;

        // INVARIANT: Parent directories exist before the write.
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            let _ = mkdirp::mkdirp(parent).map_err(|err| StoreError::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        write(&self.path, bytes).map_err(|err| StoreError::Write {
            source: err,
            path: self.path.clone(),
        })?;
        debug!("saved grid to {:?}", self.path.display());

        Ok(())
    }
}

/// Decode raw canonical file content into a grid shaped by layout.
///
/// # Errors
///
/// - Return [`csv::Error`] if content is not valid UTF-8 CSV.
pub fn decode(layout: &Layout, bytes: &[u8]) -> std::result::Result<Grid, csv::Error> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut records = reader.records();

    let header = match records.next() {
        Some(header) => header?,
        None => return Ok(Grid::unset(layout)),
    };

    // INVARIANT: First column is the index name, and duplicate people lose.
    let mut seen_people = HashSet::new();
    let columns = header
        .iter()
        .enumerate()
        .map(|(idx, person)| (idx > 0 && seen_people.insert(person)).then(|| person.to_string()))
        .collect::<Vec<_>>();

    let mut sparse = SparseGrid::new();
    for record in records {
        let record = record?;
        let Some(day) = record.get(0) else {
            continue;
        };

        // INVARIANT: First occurrence of a day row wins.
        if sparse.contains_key(day) {
            continue;
        }

        let row = columns
            .iter()
            .enumerate()
            .filter_map(|(idx, person)| {
                let person = person.as_ref()?;
                let state = record.get(idx).map(CellState::parse_lossy).unwrap_or_default();
                Some((person.clone(), state))
            })
            .collect::<HashMap<_, _>>();
        sparse.insert(day.to_string(), row);
    }

    Ok(Grid::reindex(layout, &sparse))
}

/// Encode grid as canonical file content.
///
/// # Errors
///
/// - Return [`StoreError::Encode`] if CSV writer fails.
pub fn encode(grid: &Grid) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.to_vec());

    let mut header = vec![""];
    header.extend(grid.layout().people().iter().map(String::as_str));
    writer.write_record(&header)?;

    for (day, cells) in grid.rows() {
        let mut record = vec![day];
        record.extend(cells.iter().map(|cell| cell.as_str() as &str));
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|err| StoreError::Encode(err.into_error().into()))
}

/// All possible error types for canonical file interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Canonical file cannot be read.
    #[error("cannot read {path:?}: {source}")]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Canonical file content is not valid CSV.
    #[error("cannot parse {path:?}: {source}")]
    Parse { source: csv::Error, path: PathBuf },

    /// Grid cannot be encoded as CSV.
    #[error(transparent)]
    Encode(#[from] csv::Error),

    /// Parent directory of canonical file cannot be created.
    #[error("cannot create directory {path:?}: {source}")]
    CreateDir {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Canonical file cannot be written.
    #[error("cannot write {path:?}: {source}")]
    Write {
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
