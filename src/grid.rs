// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Schedule grid representation.
//!
//! A __grid__ is a dense matrix of cell states whose rows are days and whose
//! columns are people. Both label sequences are fixed by a [`Layout`] that is
//! configured once at process start.
//!
//! # Canonical Shape
//!
//! Grids are never sparse. Any partial mapping of day to person to cell state,
//! whether it came from a file edited out-of-band or from a client request, is
//! __reindexed__ onto the current layout: rows and columns that the layout does
//! not know about are dropped, and missing cells are filled with
//! [`CellState::Unset`]. Thus, every grid handed out by this crate has exactly
//! `days × people` cells in configured order.

use serde::{
    de::{self, Deserializer, Visitor},
    ser::{SerializeMap, Serializer},
    Deserialize, Serialize,
};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Partial day to person to cell state mapping.
///
/// This is the shape that clients submit, and the shape that raw file content
/// is parsed into before being reindexed into a [`Grid`].
pub type SparseGrid = HashMap<String, HashMap<String, CellState>>;

/// Ordered row and column labels of a grid.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Layout {
    days: Vec<String>,
    people: Vec<String>,
}

impl Layout {
    /// Construct new layout from ordered day and person labels.
    pub fn new(
        days: impl IntoIterator<Item = impl Into<String>>,
        people: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            days: days.into_iter().map(Into::into).collect(),
            people: people.into_iter().map(Into::into).collect(),
        }
    }

    /// Ordered day labels, i.e., the rows.
    pub fn days(&self) -> &[String] {
        self.days.as_slice()
    }

    /// Ordered person labels, i.e., the columns.
    pub fn people(&self) -> &[String] {
        self.people.as_slice()
    }

    fn day_index(&self, day: &str) -> Option<usize> {
        self.days.iter().position(|label| label == day)
    }

    fn person_index(&self, person: &str) -> Option<usize> {
        self.people.iter().position(|label| label == person)
    }
}

/// State of a single grid cell.
///
/// Only three values exist. Anything else that shows up in storage or in a
/// request is normalized to [`CellState::Unset`].
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum CellState {
    /// No mark, written as an empty string.
    #[default]
    Unset,

    /// Person is present, written as "O".
    Present,

    /// Person is absent, written as "X".
    Absent,
}

impl CellState {
    /// Parse raw cell text, normalizing anything unrecognized to unset.
    ///
    /// Surrounding whitespace is ignored, but matching is otherwise exact.
    pub fn parse_lossy(raw: impl AsRef<str>) -> Self {
        match raw.as_ref().trim() {
            "O" => Self::Present,
            "X" => Self::Absent,
            _ => Self::Unset,
        }
    }

    /// Textual form used on disk and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Present => "O",
            Self::Absent => "X",
        }
    }

    /// Next state in the click cycle: unset, present, absent, unset.
    pub fn next(self) -> Self {
        match self {
            Self::Unset => Self::Present,
            Self::Present => Self::Absent,
            Self::Absent => Self::Unset,
        }
    }

    /// Check if cell carries no mark.
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl Display for CellState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

impl Serialize for CellState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CellState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CellStateVisitor)
    }
}

// INVARIANT: Every scalar maps to some cell state, never to an error.
struct CellStateVisitor;

impl Visitor<'_> for CellStateVisitor {
    type Value = CellState;

    fn expecting(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str("\"O\", \"X\", or an empty string")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(CellState::parse_lossy(value))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(CellState::Unset)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        Ok(CellState::Unset)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        Ok(CellState::Unset)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(CellState::Unset)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(CellState::Unset)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(CellState::Unset)
    }
}

/// Dense day by person matrix of cell states.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Grid {
    layout: Layout,
    cells: Vec<CellState>,
}

impl Grid {
    /// Construct grid with every cell unset.
    pub fn unset(layout: &Layout) -> Self {
        Self {
            layout: layout.clone(),
            cells: vec![CellState::Unset; layout.days.len() * layout.people.len()],
        }
    }

    /// Reindex partial mapping onto layout.
    ///
    /// Unknown days and people are dropped. Missing cells become unset.
    pub fn reindex(layout: &Layout, sparse: &SparseGrid) -> Self {
        let mut grid = Self::unset(layout);
        for (day, row) in sparse {
            for (person, state) in row {
                grid.set(day, person, *state);
            }
        }

        grid
    }

    /// Reshape this grid onto another layout.
    pub fn conform(&self, layout: &Layout) -> Self {
        if &self.layout == layout {
            return self.clone();
        }

        Self::reindex(layout, &self.to_sparse())
    }

    /// Layout this grid is shaped by.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Look up cell state by labels.
    pub fn get(&self, day: &str, person: &str) -> Option<CellState> {
        self.offset(day, person).map(|offset| self.cells[offset])
    }

    /// Set cell state by labels.
    ///
    /// Returns false without touching the grid if either label is not part of
    /// the layout.
    pub fn set(&mut self, day: &str, person: &str, state: CellState) -> bool {
        match self.offset(day, person) {
            Some(offset) => {
                self.cells[offset] = state;
                true
            }
            None => false,
        }
    }

    /// Iterate over rows in configured day order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[CellState])> + '_ {
        let width = self.layout.people.len();
        self.layout
            .days
            .iter()
            .enumerate()
            .map(move |(row, day)| (day.as_str(), &self.cells[row * width..(row + 1) * width]))
    }

    /// Convert into partial mapping form.
    pub fn to_sparse(&self) -> SparseGrid {
        self.rows()
            .map(|(day, cells)| {
                let row = self
                    .layout
                    .people
                    .iter()
                    .cloned()
                    .zip(cells.iter().copied())
                    .collect::<HashMap<_, _>>();
                (day.to_string(), row)
            })
            .collect()
    }

    fn offset(&self, day: &str, person: &str) -> Option<usize> {
        let row = self.layout.day_index(day)?;
        let column = self.layout.person_index(person)?;
        Some(row * self.layout.people.len() + column)
    }
}

impl Serialize for Grid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.layout.days.len()))?;
        for (day, cells) in self.rows() {
            map.serialize_entry(day, &OrderedRow { people: &self.layout.people, cells })?;
        }
        map.end()
    }
}

// INVARIANT: Serialize rows in configured person order, not hash order.
struct OrderedRow<'a> {
    people: &'a [String],
    cells: &'a [CellState],
}

impl Serialize for OrderedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.people.len()))?;
        for (person, state) in self.people.iter().zip(self.cells) {
            map.serialize_entry(person, state)?;
        }
        map.end()
    }
}
