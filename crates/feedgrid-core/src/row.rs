//! Rows of the worksheet cache

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Index;

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::worksheet::{RowSlot, Worksheet};

/// One sheet row: a sparse run of cells, never ending in an empty slot.
#[derive(Debug, Clone)]
pub struct Row {
    row_number: u32,
    cells: Vec<Option<Cell>>,
}

impl Row {
    pub(crate) fn new(row_number: u32) -> Self {
        Self {
            row_number,
            cells: Vec::new(),
        }
    }

    /// 1-based position in the whole sheet, header rows included
    pub fn row_number(&self) -> u32 {
        self.row_number
    }

    /// One past the last non-empty cell
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at a 0-based column
    pub fn get(&self, icol: usize) -> Option<&Cell> {
        self.cells.get(icol).and_then(Option::as_ref)
    }

    /// Text at a 0-based column; empty for absent cells
    pub fn text(&self, icol: usize) -> &str {
        self.get(icol).map_or("", Cell::text)
    }

    pub fn cells(&self) -> &[Option<Cell>] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Cell>> {
        self.cells.iter().map(Option::as_ref)
    }

    /// Texts of every slot, empty strings for absent cells
    pub fn texts(&self) -> Vec<&str> {
        (0..self.cells.len()).map(|i| self.text(i)).collect()
    }

    /// Distinct non-empty texts
    pub fn non_empty_values(&self) -> BTreeSet<&str> {
        self.iter().flatten().map(Cell::text).collect()
    }

    /// Replace a slot without touching the remote store. Empty cells become
    /// empty slots and trailing empty slots are trimmed.
    pub(crate) fn set_local(&mut self, icol: usize, cell: Option<Cell>) {
        let cell = cell.filter(|c| !c.text().is_empty());
        if cell.is_some() && self.cells.len() <= icol {
            self.cells.resize(icol + 1, None);
        }
        if let Some(slot) = self.cells.get_mut(icol) {
            *slot = cell;
        }
        while matches!(self.cells.last(), Some(None)) {
            self.cells.pop();
        }
    }

    /// Move the row and its cells up one sheet row after a deletion above it
    pub(crate) fn shift_up(&mut self) {
        self.row_number -= 1;
        for cell in self.cells.iter_mut().flatten() {
            cell.shift_up();
        }
    }
}

impl Index<usize> for Row {
    type Output = str;

    fn index(&self, icol: usize) -> &str {
        self.text(icol)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Row {}: {:?}>", self.row_number, self.texts())
    }
}

/// A column addressed by 0-based index or by key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Index(usize),
    /// Header text, column key, or a decimal index, tried in that order
    Key(String),
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl From<&str> for ColumnRef {
    fn from(key: &str) -> Self {
        ColumnRef::Key(key.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(key: String) -> Self {
        ColumnRef::Key(key)
    }
}

impl From<&String> for ColumnRef {
    fn from(key: &String) -> Self {
        ColumnRef::Key(key.clone())
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "{i}"),
            ColumnRef::Key(k) => f.write_str(k),
        }
    }
}

/// A value about to be written, already in display form. `None` writes
/// an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellInput(String);

impl CellInput {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for CellInput {
    fn from(value: &str) -> Self {
        CellInput(value.to_string())
    }
}

impl From<String> for CellInput {
    fn from(value: String) -> Self {
        CellInput(value)
    }
}

impl From<&String> for CellInput {
    fn from(value: &String) -> Self {
        CellInput(value.clone())
    }
}

impl From<&Cell> for CellInput {
    fn from(cell: &Cell) -> Self {
        CellInput(cell.text().to_string())
    }
}

macro_rules! cell_input_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CellInput {
                fn from(value: $ty) -> Self {
                    CellInput(value.to_string())
                }
            }
        )*
    };
}

cell_input_from_display!(i32, i64, u32, u64, usize, f64, bool, char);

impl<T: Into<CellInput>> From<Option<T>> for CellInput {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Write access to one row of a loaded worksheet.
///
/// Every [`set`](RowMut::set) goes to the remote store first; the cache is
/// only changed once the store has accepted the value.
#[derive(Debug)]
pub struct RowMut<'a, 's> {
    sheet: &'a mut Worksheet<'s>,
    slot: RowSlot,
}

impl<'a, 's> RowMut<'a, 's> {
    pub(crate) fn new(sheet: &'a mut Worksheet<'s>, slot: RowSlot) -> Self {
        Self { sheet, slot }
    }

    /// The row as currently cached
    pub fn row(&self) -> Result<&Row> {
        Ok(self.sheet.grid()?.row_at(self.slot))
    }

    pub fn row_number(&self) -> Result<u32> {
        Ok(self.row()?.row_number())
    }

    /// Cell in a column, `None` when empty
    pub fn get<C: Into<ColumnRef>>(&self, col: C) -> Result<Option<&Cell>> {
        let col = col.into();
        let sheet = &*self.sheet;
        let grid = sheet.grid()?;
        let icol = grid.resolve_column(sheet.context(), &col)?;
        Ok(grid.row_at(self.slot).get(icol))
    }

    /// Text in a column, empty when the cell is empty
    pub fn text<C: Into<ColumnRef>>(&self, col: C) -> Result<&str> {
        Ok(self.get(col)?.map_or("", Cell::text))
    }

    /// Coherent write of one cell
    pub fn set<C: Into<ColumnRef>, V: Into<CellInput>>(&mut self, col: C, value: V) -> Result<()> {
        let col = col.into();
        let value = value.into();
        let slot = self.slot;
        self.sheet.with_grid(|ctx, grid| {
            let icol = grid.resolve_column(ctx, &col)?;
            grid.write_cell(ctx, slot, icol, value.as_str())
        })
    }

    /// Delete the row from the remote sheet and the cache. Later rows move up.
    pub fn delete(self) -> Result<()> {
        match self.slot {
            RowSlot::Data(index) => self.sheet.delete_row(index),
            RowSlot::Header(_) => Err(Error::Unsupported("deleting a header row")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_local_trims_trailing_empties() {
        let mut row = Row::new(3);
        row.set_local(4, Some(Cell::new("e", 3, 5)));
        row.set_local(1, Some(Cell::new("b", 3, 2)));
        assert_eq!(row.len(), 5);
        assert_eq!(row.texts(), vec!["", "b", "", "", "e"]);

        row.set_local(4, None);
        assert_eq!(row.len(), 2);
        row.set_local(1, Some(Cell::new("", 3, 2)));
        assert!(row.is_empty());
    }

    #[test]
    fn test_set_local_past_end_with_none_is_noop() {
        let mut row = Row::new(2);
        row.set_local(3, None);
        assert!(row.is_empty());
        assert_eq!(&row[3], "");
    }

    #[test]
    fn test_shift_up_moves_cells() {
        let mut row = Row::new(5);
        row.set_local(0, Some(Cell::new("a", 5, 1)));
        row.shift_up();
        assert_eq!(row.row_number(), 4);
        assert_eq!(row.get(0).unwrap().row(), 4);
    }

    #[test]
    fn test_non_empty_values() {
        let mut row = Row::new(2);
        row.set_local(0, Some(Cell::new("x", 2, 1)));
        row.set_local(2, Some(Cell::new("x", 2, 3)));
        row.set_local(3, Some(Cell::new("y", 2, 4)));
        assert_eq!(row.non_empty_values().into_iter().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_cell_input_normalizes() {
        assert_eq!(CellInput::from(31).as_str(), "31");
        assert_eq!(CellInput::from(2.5).as_str(), "2.5");
        assert_eq!(CellInput::from(None::<&str>).as_str(), "");
        assert_eq!(CellInput::from(Some("v")).as_str(), "v");
        assert_eq!(CellInput::from(true).as_str(), "true");
    }

    #[test]
    fn test_column_ref_from() {
        assert_eq!(ColumnRef::from(2), ColumnRef::Index(2));
        assert_eq!(ColumnRef::from("Age"), ColumnRef::Key("Age".into()));
    }
}
