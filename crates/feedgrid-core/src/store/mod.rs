//! The remote document service, as seen by the worksheet cache
//!
//! Transport, authentication and wire format belong to the implementor. The
//! cache only needs the seven primitives of [`RemoteStore`]. Methods take
//! `&self`; implementors keep whatever connection state they need behind
//! interior mutability.

mod memory;

pub use memory::{Call, MemoryStore};

use crate::error::Result;

/// Worksheet metadata from the worksheets feed
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorksheetEntry {
    /// Full URL-form worksheet id
    pub id: String,
    pub title: String,
    pub row_count: u32,
    pub col_count: u32,
}

/// The worksheets of one document
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorksheetsFeed {
    /// Document title
    pub title: String,
    pub entries: Vec<WorksheetEntry>,
}

/// One entry of the cell feed. `row` and `col` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellEntry {
    pub row: u32,
    pub col: u32,
    pub text: String,
    pub input_value: String,
}

/// One row of the list feed: column key to text, in column order.
///
/// The list feed treats sheet row 1 as its header, so entry `i` is sheet
/// row `i + 2`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListEntry {
    /// Opaque handle the store uses to delete this row
    pub id: String,
    pub custom: Vec<(String, String)>,
}

impl ListEntry {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            custom: Vec::new(),
        }
    }

    /// Value for a column key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.custom
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.custom.iter().any(|(k, _)| k == key)
    }

    /// Set a column value, replacing an existing one
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.custom.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.custom.push((key, value)),
        }
    }

    /// Remove a column value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.custom.iter().position(|(k, _)| k == key)?;
        Some(self.custom.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.custom.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.custom.iter().map(|(_, v)| v.as_str())
    }
}

/// The remote tabular document service
pub trait RemoteStore {
    /// Worksheets of a document, with the document title
    fn list_worksheets(&self, key: &str) -> Result<WorksheetsFeed>;

    /// Every non-empty cell of a worksheet
    fn fetch_cells(&self, key: &str, worksheet: &str) -> Result<Vec<CellEntry>>;

    /// The row-as-record view of a worksheet
    fn fetch_list(&self, key: &str, worksheet: &str) -> Result<Vec<ListEntry>>;

    /// Insert a row addressed by column keys; returns the values actually
    /// written.
    fn insert_row(
        &self,
        key: &str,
        worksheet: &str,
        values: &[(String, String)],
    ) -> Result<ListEntry>;

    /// Write one cell; returns the cell as stored
    fn update_cell(
        &self,
        key: &str,
        worksheet: &str,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<CellEntry>;

    /// Delete the row behind a list feed entry
    fn delete_row(&self, entry: &ListEntry) -> Result<()>;

    /// Create a worksheet
    fn add_worksheet(&self, key: &str, title: &str, rows: u32, cols: u32)
        -> Result<WorksheetEntry>;

    /// Whether the list feed stops returning rows at the first blank row.
    fn list_feed_stops_at_blank_row(&self) -> bool {
        true
    }
}
