//! In-memory remote store
//!
//! Behaves like the remote service, quirks included: the list feed derives
//! its column keys from sheet row 1 and stops at the first blank row, inserts
//! land after the last non-blank row, refuse all-empty values and silently
//! drop values for columns past the widest column used so far. Every call is
//! recorded so callers can check what reached the "remote" side.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::column::{ColumnTagger, FALLBACK_SLOTS};
use crate::error::{Error, Result};
use crate::store::{CellEntry, ListEntry, RemoteStore, WorksheetEntry, WorksheetsFeed};

const FEED_BASE: &str = "https://spreadsheets.example.com/feeds/worksheets";

/// A call received by a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListWorksheets {
        key: String,
    },
    FetchCells {
        key: String,
        worksheet: String,
    },
    FetchList {
        key: String,
        worksheet: String,
    },
    InsertRow {
        key: String,
        worksheet: String,
        values: Vec<(String, String)>,
    },
    UpdateCell {
        key: String,
        worksheet: String,
        row: u32,
        col: u32,
        value: String,
    },
    DeleteRow {
        entry: String,
    },
    AddWorksheet {
        key: String,
        title: String,
        rows: u32,
        cols: u32,
    },
}

impl Call {
    /// Whether the call changes remote state
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::InsertRow { .. }
                | Call::UpdateCell { .. }
                | Call::DeleteRow { .. }
                | Call::AddWorksheet { .. }
        )
    }
}

/// Shared handle to an in-memory document service. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<State>>,
}

#[derive(Debug)]
struct State {
    documents: BTreeMap<String, Document>,
    calls: Vec<Call>,
    next_row_id: u64,
    next_sheet: u32,
    failing_updates: u32,
    list_stops_at_blank: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            documents: BTreeMap::new(),
            calls: Vec::new(),
            next_row_id: 1,
            next_sheet: 6,
            failing_updates: 0,
            list_stops_at_blank: true,
        }
    }
}

#[derive(Debug)]
struct Document {
    title: String,
    sheets: Vec<Sheet>,
}

#[derive(Debug)]
struct Sheet {
    short_id: String,
    title: String,
    row_count: u32,
    col_count: u32,
    rows: Vec<StoredRow>,
}

#[derive(Debug)]
struct StoredRow {
    id: u64,
    cells: Vec<StoredCell>,
}

#[derive(Debug, Clone, Default)]
struct StoredCell {
    text: String,
    input: String,
}

impl StoredRow {
    fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.text.is_empty())
    }

    fn width(&self) -> usize {
        self.cells
            .iter()
            .rposition(|c| !c.text.is_empty())
            .map_or(0, |i| i + 1)
    }
}

impl State {
    fn next_row_id(&mut self) -> u64 {
        let id = self.next_row_id;
        self.next_row_id += 1;
        id
    }

    fn document(&self, key: &str) -> Result<&Document> {
        self.documents
            .get(key)
            .ok_or_else(|| Error::remote(format!("document not found: {key}")))
    }

    fn sheet(&self, key: &str, worksheet: &str) -> Result<&Sheet> {
        self.document(key)?
            .sheets
            .iter()
            .find(|s| s.short_id == worksheet)
            .ok_or_else(|| Error::remote(format!("worksheet not found: {key}/{worksheet}")))
    }

    fn sheet_mut(&mut self, key: &str, worksheet: &str) -> Result<&mut Sheet> {
        self.documents
            .get_mut(key)
            .ok_or_else(|| Error::remote(format!("document not found: {key}")))?
            .sheets
            .iter_mut()
            .find(|s| s.short_id == worksheet)
            .ok_or_else(|| Error::remote(format!("worksheet not found: {key}/{worksheet}")))
    }
}

impl Sheet {
    fn width(&self) -> usize {
        self.rows.iter().map(StoredRow::width).max().unwrap_or(0)
    }

    fn column_keys(&self) -> Vec<String> {
        let headers: Vec<&str> = self
            .rows
            .first()
            .map(|r| r.cells.iter().map(|c| c.text.as_str()).collect())
            .unwrap_or_default();
        ColumnTagger::default().tag_slots(&headers, self.width().max(FALLBACK_SLOTS))
    }

    fn entry(&self, key: &str) -> WorksheetEntry {
        WorksheetEntry {
            id: format!("{FEED_BASE}/{key}/private/full/{}", self.short_id),
            title: self.title.clone(),
            row_count: self.row_count,
            col_count: self.col_count,
        }
    }

    fn set(&mut self, row: u32, col: u32, cell: StoredCell, mut next_id: impl FnMut() -> u64) {
        let (r, c) = (row as usize - 1, col as usize - 1);
        while self.rows.len() <= r {
            self.rows.push(StoredRow {
                id: next_id(),
                cells: Vec::new(),
            });
        }
        let cells = &mut self.rows[r].cells;
        if cells.len() <= c {
            cells.resize(c + 1, StoredCell::default());
        }
        cells[c] = cell;
        self.row_count = self.row_count.max(row);
        self.col_count = self.col_count.max(col);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document
    pub fn add_document(&self, key: &str, title: &str) {
        self.state.borrow_mut().documents.insert(
            key.to_string(),
            Document {
                title: title.to_string(),
                sheets: Vec::new(),
            },
        );
    }

    /// Add a worksheet holding `rows` (row 1 first) and return its short id.
    ///
    /// The document is created on demand, titled after its key.
    pub fn add_sheet(&self, key: &str, title: &str, rows: &[&[&str]]) -> String {
        let mut state = self.state.borrow_mut();
        if !state.documents.contains_key(key) {
            state.documents.insert(
                key.to_string(),
                Document {
                    title: key.to_string(),
                    sheets: Vec::new(),
                },
            );
        }

        let used = rows
            .iter()
            .rposition(|r| r.iter().any(|t| !t.is_empty()))
            .map_or(0, |i| i + 1);
        let mut stored = Vec::with_capacity(used);
        for row in &rows[..used] {
            let id = state.next_row_id();
            stored.push(StoredRow {
                id,
                cells: row
                    .iter()
                    .map(|t| StoredCell {
                        text: t.to_string(),
                        input: t.to_string(),
                    })
                    .collect(),
            });
        }

        let short_id = format!("od{}", state.next_sheet);
        state.next_sheet += 1;
        let width = stored.iter().map(StoredRow::width).max().unwrap_or(0);
        let sheet = Sheet {
            short_id: short_id.clone(),
            title: title.to_string(),
            row_count: (used as u32).max(100),
            col_count: (width as u32).max(20),
            rows: stored,
        };
        if let Some(doc) = state.documents.get_mut(key) {
            doc.sheets.push(sheet);
        }
        short_id
    }

    /// Store a cell whose input (e.g. a formula) differs from its text
    pub fn set_formula(
        &self,
        key: &str,
        worksheet: &str,
        row: u32,
        col: u32,
        text: &str,
        input: &str,
    ) -> Result<()> {
        if row == 0 || col == 0 {
            return Err(Error::remote(format!("invalid cell R{row}C{col}")));
        }
        let mut state = self.state.borrow_mut();
        let mut next = state.next_row_id;
        let sheet = state.sheet_mut(key, worksheet)?;
        sheet.set(
            row,
            col,
            StoredCell {
                text: text.to_string(),
                input: input.to_string(),
            },
            || {
                let id = next;
                next += 1;
                id
            },
        );
        state.next_row_id = next;
        Ok(())
    }

    /// Texts of a worksheet, row 1 first, each row without trailing blanks
    pub fn rows(&self, key: &str, worksheet: &str) -> Result<Vec<Vec<String>>> {
        let state = self.state.borrow();
        let sheet = state.sheet(key, worksheet)?;
        Ok(sheet
            .rows
            .iter()
            .map(|r| {
                r.cells[..r.width()]
                    .iter()
                    .map(|c| c.text.clone())
                    .collect()
            })
            .collect())
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Calls that changed remote state
    pub fn writes(&self) -> Vec<Call> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Make the next `n` cell updates fail
    pub fn fail_next_updates(&self, n: u32) {
        self.state.borrow_mut().failing_updates = n;
    }

    /// Toggle the "list feed stops at the first blank row" quirk
    pub fn set_list_feed_stops_at_blank_row(&self, stops: bool) {
        self.state.borrow_mut().list_stops_at_blank = stops;
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl RemoteStore for MemoryStore {
    fn list_worksheets(&self, key: &str) -> Result<WorksheetsFeed> {
        self.record(Call::ListWorksheets {
            key: key.to_string(),
        });
        let state = self.state.borrow();
        let doc = state.document(key)?;
        Ok(WorksheetsFeed {
            title: doc.title.clone(),
            entries: doc.sheets.iter().map(|s| s.entry(key)).collect(),
        })
    }

    fn fetch_cells(&self, key: &str, worksheet: &str) -> Result<Vec<CellEntry>> {
        self.record(Call::FetchCells {
            key: key.to_string(),
            worksheet: worksheet.to_string(),
        });
        let state = self.state.borrow();
        let sheet = state.sheet(key, worksheet)?;

        let mut entries = Vec::new();
        for (r, row) in sheet.rows.iter().enumerate() {
            for (c, cell) in row.cells.iter().enumerate() {
                if !cell.text.is_empty() {
                    entries.push(CellEntry {
                        row: r as u32 + 1,
                        col: c as u32 + 1,
                        text: cell.text.clone(),
                        input_value: cell.input.clone(),
                    });
                }
            }
        }
        Ok(entries)
    }

    fn fetch_list(&self, key: &str, worksheet: &str) -> Result<Vec<ListEntry>> {
        self.record(Call::FetchList {
            key: key.to_string(),
            worksheet: worksheet.to_string(),
        });
        let state = self.state.borrow();
        let sheet = state.sheet(key, worksheet)?;
        let keys = sheet.column_keys();

        let mut entries = Vec::new();
        for row in sheet.rows.iter().skip(1) {
            if row.is_blank() && state.list_stops_at_blank {
                break;
            }
            let mut entry = ListEntry::new(row.id.to_string());
            for (c, cell) in row.cells.iter().enumerate() {
                if !cell.text.is_empty() {
                    entry.set(keys[c].clone(), cell.text.clone());
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    fn insert_row(
        &self,
        key: &str,
        worksheet: &str,
        values: &[(String, String)],
    ) -> Result<ListEntry> {
        self.record(Call::InsertRow {
            key: key.to_string(),
            worksheet: worksheet.to_string(),
            values: values.to_vec(),
        });
        if values.iter().all(|(_, v)| v.is_empty()) {
            return Err(Error::remote("insert requires at least one non-empty value"));
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_row_id();
        let mut next = state.next_row_id;
        let sheet = state.sheet_mut(key, worksheet)?;
        let keys = sheet.column_keys();
        let width = sheet.width();

        // Lands after the last non-blank row, never in row 1
        let position = sheet
            .rows
            .iter()
            .rposition(|r| !r.is_blank())
            .map_or(0, |i| i + 1)
            .max(1);
        sheet.rows.truncate(position);
        while sheet.rows.len() < position {
            sheet.rows.push(StoredRow {
                id: next,
                cells: Vec::new(),
            });
            next += 1;
        }

        let mut row = StoredRow {
            id,
            cells: Vec::new(),
        };
        let mut written = ListEntry::new(id.to_string());
        for (k, v) in values {
            let Some(c) = keys.iter().position(|key| key == k) else {
                continue;
            };
            if c >= width || v.is_empty() {
                continue;
            }
            if row.cells.len() <= c {
                row.cells.resize(c + 1, StoredCell::default());
            }
            row.cells[c] = StoredCell {
                text: v.clone(),
                input: v.clone(),
            };
            written.set(k.clone(), v.clone());
        }
        sheet.rows.push(row);
        sheet.row_count = sheet.row_count.max(sheet.rows.len() as u32);
        state.next_row_id = next;
        Ok(written)
    }

    fn update_cell(
        &self,
        key: &str,
        worksheet: &str,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<CellEntry> {
        self.record(Call::UpdateCell {
            key: key.to_string(),
            worksheet: worksheet.to_string(),
            row,
            col,
            value: value.to_string(),
        });

        let mut state = self.state.borrow_mut();
        if state.failing_updates > 0 {
            state.failing_updates -= 1;
            return Err(Error::remote("injected update failure"));
        }
        if row == 0 || col == 0 {
            return Err(Error::remote(format!("invalid cell R{row}C{col}")));
        }

        let mut next = state.next_row_id;
        let sheet = state.sheet_mut(key, worksheet)?;
        sheet.set(
            row,
            col,
            StoredCell {
                text: value.to_string(),
                input: value.to_string(),
            },
            || {
                let id = next;
                next += 1;
                id
            },
        );
        state.next_row_id = next;

        Ok(CellEntry {
            row,
            col,
            text: value.to_string(),
            input_value: value.to_string(),
        })
    }

    fn delete_row(&self, entry: &ListEntry) -> Result<()> {
        self.record(Call::DeleteRow {
            entry: entry.id.clone(),
        });
        let id: u64 = entry
            .id
            .parse()
            .map_err(|_| Error::remote(format!("invalid list entry id: {}", entry.id)))?;

        let mut state = self.state.borrow_mut();
        for doc in state.documents.values_mut() {
            for sheet in &mut doc.sheets {
                if let Some(pos) = sheet.rows.iter().position(|r| r.id == id) {
                    sheet.rows.remove(pos);
                    return Ok(());
                }
            }
        }
        Err(Error::remote(format!("no row for list entry {id}")))
    }

    fn add_worksheet(
        &self,
        key: &str,
        title: &str,
        rows: u32,
        cols: u32,
    ) -> Result<WorksheetEntry> {
        self.record(Call::AddWorksheet {
            key: key.to_string(),
            title: title.to_string(),
            rows,
            cols,
        });

        let mut state = self.state.borrow_mut();
        let short_id = format!("od{}", state.next_sheet);
        let doc = state
            .documents
            .get_mut(key)
            .ok_or_else(|| Error::remote(format!("document not found: {key}")))?;
        let sheet = Sheet {
            short_id,
            title: title.to_string(),
            row_count: rows,
            col_count: cols,
            rows: Vec::new(),
        };
        let entry = sheet.entry(key);
        doc.sheets.push(sheet);
        state.next_sheet += 1;
        Ok(entry)
    }

    fn list_feed_stops_at_blank_row(&self) -> bool {
        self.state.borrow().list_stops_at_blank
    }
}
