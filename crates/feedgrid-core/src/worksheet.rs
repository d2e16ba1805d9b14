//! The worksheet cache
//!
//! A [`Worksheet`] is created from cheap worksheet metadata. The first read
//! that needs cell data pulls the whole cell feed into a grid of header rows
//! and data rows; later reads are served from that grid. Writes go to the
//! remote store first and reach the grid only after the store accepted them.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::unsync::OnceCell;

use crate::cell::Cell;
use crate::column::{ColumnTagger, FallbackKeys, FALLBACK_SLOTS};
use crate::error::{Error, Result};
use crate::id::{DocumentKey, WorksheetId};
use crate::row::{CellInput, ColumnRef, Row, RowMut};
use crate::row_data::{RowData, RowValues, BLANK_PLACEHOLDER};
use crate::session::Session;
use crate::store::{ListEntry, WorksheetEntry};

/// Options for opening a worksheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorksheetOptions {
    /// Number of leading rows that hold column labels
    pub header_count: usize,
    /// Keys for columns without usable header text
    pub fallback_keys: FallbackKeys,
}

impl Default for WorksheetOptions {
    fn default() -> Self {
        Self {
            header_count: 1,
            fallback_keys: FallbackKeys::default(),
        }
    }
}

impl WorksheetOptions {
    pub fn with_header_count(mut self, header_count: usize) -> Self {
        self.header_count = header_count;
        self
    }

    pub fn with_fallback_keys(mut self, fallback_keys: FallbackKeys) -> Self {
        self.fallback_keys = fallback_keys;
        self
    }
}

/// Where a row lives in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowSlot {
    Header(usize),
    Data(usize),
}

/// Everything a worksheet knows without loading cell data
#[derive(Debug)]
pub(crate) struct SheetContext<'s> {
    pub(crate) session: &'s Session,
    pub(crate) key: DocumentKey,
    pub(crate) id: WorksheetId,
    title: String,
    row_count: u32,
    pub(crate) header_count: usize,
    pub(crate) tagger: ColumnTagger,
    document_title: OnceCell<String>,
}

/// Loaded cell data of one worksheet
#[derive(Debug, Default)]
pub(crate) struct Grid {
    header_rows: Vec<Row>,
    data_rows: Vec<Row>,
    /// Highest 1-based column holding a cell, header rows included
    max_col: usize,
    list_feed: Option<Vec<ListEntry>>,
}

impl Grid {
    fn load(ctx: &SheetContext<'_>) -> Result<Self> {
        tracing::info!(worksheet = %ctx.title, "Loading cell feed");
        let entries = ctx.session.fetch_cells(&ctx.key, &ctx.id)?;
        tracing::info!(worksheet = %ctx.title, cells = entries.len(), "Found cell feed entries");
        if ctx.header_count > 1 {
            tracing::warn!(
                header_count = ctx.header_count,
                "Only the last of multiple header rows is used as headers"
            );
        }

        let mut grid = Grid {
            header_rows: Vec::with_capacity(ctx.header_count),
            ..Default::default()
        };
        for entry in &entries {
            if entry.row == 0 || entry.col == 0 {
                tracing::warn!(row = entry.row, col = entry.col, "Skipping cell outside the sheet");
                continue;
            }
            tracing::debug!(row = entry.row, col = entry.col, "Adding cell");
            let slot = grid.grow_to(ctx.header_count, entry.row as usize);
            grid.set_local(slot, entry.col as usize - 1, Some(Cell::from_entry(entry)));
        }
        while grid.header_rows.len() < ctx.header_count {
            tracing::debug!("Adding blank header row");
            grid.header_rows.push(Row::new(grid.header_rows.len() as u32 + 1));
        }
        Ok(grid)
    }

    /// Synthesize empty rows up to `row_number` and return its slot
    fn grow_to(&mut self, header_count: usize, row_number: usize) -> RowSlot {
        if row_number <= header_count {
            while self.header_rows.len() < row_number {
                self.header_rows.push(Row::new(self.header_rows.len() as u32 + 1));
            }
            RowSlot::Header(row_number - 1)
        } else {
            let index = row_number - header_count - 1;
            while self.data_rows.len() <= index {
                let number = header_count + self.data_rows.len() + 1;
                self.data_rows.push(Row::new(number as u32));
            }
            RowSlot::Data(index)
        }
    }

    // === Row addressing ===

    pub(crate) fn row_at(&self, slot: RowSlot) -> &Row {
        match slot {
            RowSlot::Header(i) => &self.header_rows[i],
            RowSlot::Data(i) => &self.data_rows[i],
        }
    }

    fn row_at_mut(&mut self, slot: RowSlot) -> &mut Row {
        match slot {
            RowSlot::Header(i) => &mut self.header_rows[i],
            RowSlot::Data(i) => &mut self.data_rows[i],
        }
    }

    fn max_row(&self) -> usize {
        self.header_rows.len() + self.data_rows.len()
    }

    fn slot_for(&self, header_count: usize, row_number: usize) -> Result<RowSlot> {
        if row_number == 0 || row_number > self.max_row() {
            return Err(Error::RowOutOfBounds(row_number, self.max_row()));
        }
        if row_number <= header_count {
            Ok(RowSlot::Header(row_number - 1))
        } else {
            Ok(RowSlot::Data(row_number - header_count - 1))
        }
    }

    fn data_slot(&self, index: usize) -> Result<RowSlot> {
        if index < self.data_rows.len() {
            Ok(RowSlot::Data(index))
        } else {
            Err(Error::RowOutOfBounds(index, self.data_rows.len()))
        }
    }

    fn slots(&self) -> impl Iterator<Item = RowSlot> {
        (0..self.header_rows.len())
            .map(RowSlot::Header)
            .chain((0..self.data_rows.len()).map(RowSlot::Data))
    }

    fn row_by_number(&self, row_number: usize) -> Option<&Row> {
        self.header_rows
            .iter()
            .chain(self.data_rows.iter())
            .nth(row_number.checked_sub(1)?)
    }

    fn headers(&self) -> Option<&Row> {
        self.header_rows.last()
    }

    fn header_texts(&self) -> Vec<&str> {
        self.headers().map(Row::texts).unwrap_or_default()
    }

    // === Columns ===

    /// Keys derived from sheet row 1, the row the list feed keys on
    pub(crate) fn column_keys(&self, tagger: ColumnTagger) -> Vec<String> {
        let texts = self.row_by_number(1).map(Row::texts).unwrap_or_default();
        tagger.tag_slots(&texts, self.max_col.max(FALLBACK_SLOTS))
    }

    pub(crate) fn resolve_column(&self, ctx: &SheetContext<'_>, col: &ColumnRef) -> Result<usize> {
        let key = match col {
            ColumnRef::Index(i) => return Ok(*i),
            ColumnRef::Key(key) => key,
        };
        if let Some(i) = self
            .headers()
            .and_then(|h| h.iter().position(|c| c.is_some_and(|c| c.text() == key)))
        {
            return Ok(i);
        }
        if let Some(i) = self.column_keys(ctx.tagger).iter().position(|k| k == key) {
            return Ok(i);
        }
        key.parse::<usize>()
            .map_err(|_| Error::UnknownColumn(key.clone()))
    }

    // === Writes ===

    fn set_local(&mut self, slot: RowSlot, icol: usize, cell: Option<Cell>) {
        if cell.as_ref().is_some_and(|c| !c.text().is_empty()) {
            self.max_col = self.max_col.max(icol + 1);
        }
        self.row_at_mut(slot).set_local(icol, cell);
    }

    /// Write one cell remotely, then mirror the accepted value locally
    pub(crate) fn write_cell(
        &mut self,
        ctx: &SheetContext<'_>,
        slot: RowSlot,
        icol: usize,
        value: &str,
    ) -> Result<()> {
        let row = self.row_at(slot);
        if row.text(icol) == value {
            tracing::info!(row = row.row_number(), col = icol + 1, value, "No change to cell value");
            return Ok(());
        }

        let row_number = row.row_number();
        let col = icol as u32 + 1;
        let entry = ctx
            .session
            .update_cell(&ctx.key, &ctx.id, row_number, col, value)?;
        let cell = Cell::new(entry.text, row_number, col).with_input_value(entry.input_value);
        let text = cell.text().to_string();
        self.set_local(slot, icol, Some(cell));
        self.patch_list_feed(ctx.tagger, row_number, icol, &text);
        Ok(())
    }

    /// Keep a cached list feed in step with a cell write
    fn patch_list_feed(&mut self, tagger: ColumnTagger, row_number: u32, icol: usize, text: &str) {
        if self.list_feed.is_none() {
            return;
        }
        if row_number < 2 {
            tracing::debug!("Row 1 changed, dropping cached list feed");
            self.list_feed = None;
            return;
        }

        let key = self.column_keys(tagger).into_iter().nth(icol);
        let index = row_number as usize - 2;
        let patched = match (key, self.list_feed.as_mut().and_then(|f| f.get_mut(index))) {
            (Some(key), Some(entry)) => {
                if text.is_empty() {
                    entry.remove(&key);
                } else {
                    entry.set(key, text);
                }
                true
            }
            _ => false,
        };
        if !patched {
            self.list_feed = None;
        }
    }

    /// Give blank rows a placeholder for the duration of `op`, then clear it
    /// again whether or not `op` succeeded.
    ///
    /// Every padded row is cleared even when one clear fails. The outcome of
    /// the clearing is returned next to the value of `op`, so a caller can
    /// record what `op` changed remotely before reporting it.
    fn while_padded<T>(
        &mut self,
        ctx: &SheetContext<'_>,
        slots: &[RowSlot],
        op: impl FnOnce() -> Result<T>,
    ) -> Result<(T, Result<()>)> {
        let mut padded = Vec::with_capacity(slots.len());
        let mut outcome = Ok(());
        for &slot in slots {
            if let Err(e) = self.write_cell(ctx, slot, 0, BLANK_PLACEHOLDER) {
                outcome = Err(e);
                break;
            }
            padded.push(slot);
        }

        let result = outcome.and_then(|()| op());
        let mut restored = Ok(());
        for &slot in &padded {
            if let Err(e) = self.write_cell(ctx, slot, 0, "") {
                let row = self.row_at(slot).row_number();
                tracing::warn!(row, error = %e, "Failed to clear placeholder");
                if restored.is_ok() {
                    restored = Err(e);
                }
            }
        }
        result.map(|value| (value, restored))
    }

    fn set_row(&mut self, ctx: &SheetContext<'_>, slot: RowSlot, values: RowValues) -> Result<()> {
        let keys = self.column_keys(ctx.tagger);
        let data = RowData::new(&self.header_texts(), &keys, values)?;
        for val in &data {
            self.write_cell(ctx, slot, val.index, &val.text)?;
        }
        Ok(())
    }

    // === Append ===

    /// Slot of the row an insert lands in: the first row after the last
    /// non-blank one, never sheet row 1.
    fn next_append_slot(&mut self, header_count: usize) -> RowSlot {
        let min_index = usize::from(header_count == 0);
        let index = self
            .data_rows
            .iter()
            .rposition(|r| !r.is_empty())
            .map_or(0, |i| i + 1)
            .max(min_index);
        self.grow_to(header_count, header_count + index + 1)
    }

    fn append(&mut self, ctx: &SheetContext<'_>, values: RowValues, overwrite: bool) -> Result<()> {
        let keys = self.column_keys(ctx.tagger);
        let data = RowData::new(&self.header_texts(), &keys, values)?;
        let insert = data.insert_values(&keys);

        // Inserts land after the last non-blank row, so blank header rows
        // must not look blank while the insert runs.
        let blank_headers: Vec<RowSlot> = (0..self.header_rows.len())
            .filter(|&i| self.header_rows[i].is_empty())
            .map(RowSlot::Header)
            .collect();
        let (inserted, restored) = self.while_padded(ctx, &blank_headers, || {
            ctx.session.insert_row(&ctx.key, &ctx.id, &insert.values)
        })?;
        self.list_feed = None;

        let slot = self.next_append_slot(ctx.header_count);
        let row_number = self.row_at(slot).row_number();
        tracing::info!(worksheet = %ctx.title, row = row_number, "Appended row");

        for val in &data {
            if val.text.is_empty() {
                continue;
            }
            let written = val
                .key
                .as_deref()
                .is_some_and(|k| inserted.contains_key(k));
            if overwrite && !written {
                // The insert silently drops columns past the used width
                self.write_cell(ctx, slot, val.index, &val.text)?;
            } else {
                let cell = Cell::new(val.text.clone(), row_number, val.index as u32 + 1);
                self.set_local(slot, val.index, Some(cell));
            }
        }

        if insert.placeholder {
            let cell = Cell::new(BLANK_PLACEHOLDER, row_number, 1);
            self.set_local(slot, 0, Some(cell));
            self.write_cell(ctx, slot, 0, "")?;
        }
        restored
    }

    // === List feed ===

    fn list_feed(&mut self, ctx: &SheetContext<'_>) -> Result<&[ListEntry]> {
        let feed = match self.list_feed.take() {
            Some(feed) => feed,
            None => self.fetch_list_feed(ctx)?,
        };
        Ok(self.list_feed.insert(feed).as_slice())
    }

    fn fetch_list_feed(&mut self, ctx: &SheetContext<'_>) -> Result<Vec<ListEntry>> {
        if !ctx.session.list_feed_stops_at_blank_row()? {
            return ctx.session.fetch_list(&ctx.key, &ctx.id);
        }

        let blank: Vec<RowSlot> = self
            .slots()
            .filter(|&slot| self.row_at(slot).is_empty())
            .collect();
        if !blank.is_empty() {
            tracing::info!(rows = blank.len(), "Padding blank rows to read the list feed");
        }
        let (mut feed, restored) = self.while_padded(ctx, &blank, || {
            ctx.session.fetch_list(&ctx.key, &ctx.id)
        })?;
        restored?;

        for slot in blank {
            let row_number = self.row_at(slot).row_number() as usize;
            if let Some(entry) = row_number.checked_sub(2).and_then(|i| feed.get_mut(i)) {
                entry.custom.retain(|(_, v)| v != BLANK_PLACEHOLDER);
            }
        }
        Ok(feed)
    }

    // === Delete ===

    fn delete_data_row(&mut self, ctx: &SheetContext<'_>, index: usize) -> Result<()> {
        let slot = self.data_slot(index)?;
        let row_number = self.row_at(slot).row_number();
        // The list feed always treats sheet row 1 as its header
        let list_index = match (row_number as usize).checked_sub(2) {
            Some(i) => i,
            None => return Err(Error::Unsupported("deleting sheet row 1")),
        };

        let entry = self.list_feed(ctx)?.get(list_index).cloned();
        let row = &self.data_rows[index];
        let local = row.non_empty_values();
        let remote: BTreeSet<&str> = entry
            .as_ref()
            .map(|e| e.values().filter(|v| !v.is_empty()).collect())
            .unwrap_or_default();
        let entry = match entry.as_ref() {
            Some(entry) if local == remote => entry,
            _ => {
                return Err(Error::Inconsistent {
                    row: row_number,
                    local: local.into_iter().map(String::from).collect(),
                    remote: remote.into_iter().map(String::from).collect(),
                })
            }
        };

        ctx.session.delete_row(entry)?;
        if let Some(feed) = self.list_feed.as_mut() {
            if list_index < feed.len() {
                feed.remove(list_index);
            }
        }
        let removed = self.data_rows.remove(index);
        tracing::info!(worksheet = %ctx.title, "Deleted row {}", removed);
        tracing::debug!("Decrementing row numbers of following rows");
        for row in &mut self.data_rows[index..] {
            row.shift_up();
        }
        Ok(())
    }
}

/// One worksheet of a remote document, read and written like a 2D array of
/// strings.
///
/// Reads load the cell feed on first use. Indexing, iteration and length
/// cover data rows only; header rows are reached through
/// [`headers`](Worksheet::headers) or by absolute row number.
#[derive(Debug)]
pub struct Worksheet<'s> {
    ctx: SheetContext<'s>,
    /// Empty until the first access that needs cell data
    cache: OnceCell<Grid>,
}

impl<'s> Worksheet<'s> {
    /// Create a worksheet from its metadata. Nothing is fetched yet.
    pub fn new(
        session: &'s Session,
        key: DocumentKey,
        entry: &WorksheetEntry,
        options: WorksheetOptions,
    ) -> Result<Self> {
        if (entry.row_count as usize) < options.header_count {
            return Err(Error::TooFewRows {
                rows: entry.row_count,
                headers: options.header_count,
            });
        }
        Ok(Self {
            ctx: SheetContext {
                session,
                key,
                id: WorksheetId::parse(&entry.id)?,
                title: entry.title.clone(),
                row_count: entry.row_count,
                header_count: options.header_count,
                tagger: ColumnTagger::new(options.fallback_keys),
                document_title: OnceCell::new(),
            },
            cache: OnceCell::new(),
        })
    }

    pub(crate) fn with_document_title(self, title: String) -> Self {
        let _ = self.ctx.document_title.set(title);
        self
    }

    pub(crate) fn context(&self) -> &SheetContext<'s> {
        &self.ctx
    }

    pub(crate) fn grid(&self) -> Result<&Grid> {
        self.cache.get_or_try_init(|| Grid::load(&self.ctx))
    }

    /// Run `f` against the loaded grid, loading it first if needed
    pub(crate) fn with_grid<T>(
        &mut self,
        f: impl FnOnce(&SheetContext<'s>, &mut Grid) -> Result<T>,
    ) -> Result<T> {
        let mut grid = match self.cache.take() {
            Some(grid) => grid,
            None => Grid::load(&self.ctx)?,
        };
        let result = f(&self.ctx, &mut grid);
        self.cache = OnceCell::with_value(grid);
        result
    }

    // === Metadata ===

    pub fn session(&self) -> &'s Session {
        self.ctx.session
    }

    pub fn title(&self) -> &str {
        &self.ctx.title
    }

    pub fn key(&self) -> &DocumentKey {
        &self.ctx.key
    }

    pub fn id(&self) -> &WorksheetId {
        &self.ctx.id
    }

    pub fn header_count(&self) -> usize {
        self.ctx.header_count
    }

    /// Row count reported by the worksheet metadata
    pub fn row_count(&self) -> u32 {
        self.ctx.row_count
    }

    pub fn fallback_keys(&self) -> FallbackKeys {
        self.ctx.tagger.fallback()
    }

    /// Change the number of header rows. Drops the cache.
    pub fn set_header_count(&mut self, header_count: usize) -> Result<()> {
        if (self.ctx.row_count as usize) < header_count {
            return Err(Error::TooFewRows {
                rows: self.ctx.row_count,
                headers: header_count,
            });
        }
        if header_count != self.ctx.header_count {
            tracing::info!(worksheet = %self.ctx.title, header_count, "Header count changed");
            self.ctx.header_count = header_count;
            self.cache = OnceCell::new();
        }
        Ok(())
    }

    /// Title of the document this worksheet belongs to
    pub fn document_title(&self) -> Result<&str> {
        self.ctx
            .document_title
            .get_or_try_init(|| -> Result<String> {
                Ok(self.ctx.session.list_worksheets(&self.ctx.key)?.title)
            })
            .map(String::as_str)
    }

    /// `"<title>" in spreadsheet "<document title>"`
    pub fn full_name(&self) -> Result<String> {
        Ok(format!(
            "\"{}\" in spreadsheet \"{}\"",
            self.title(),
            self.document_title()?
        ))
    }

    // === Cache ===

    /// Fetch cell data if not yet loaded
    pub fn load_data(&self) -> Result<()> {
        self.grid().map(|_| ())
    }

    pub fn has_data(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Drop cached cells and list feed, then fetch again
    pub fn reload(&mut self) -> Result<()> {
        tracing::info!(worksheet = %self.ctx.title, "Reloading worksheet");
        self.cache = OnceCell::new();
        self.load_data()
    }

    // === Reads ===

    /// Data rows, header rows excluded
    pub fn rows(&self) -> Result<&[Row]> {
        Ok(&self.grid()?.data_rows)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.grid()?.data_rows.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.grid()?.data_rows.is_empty())
    }

    pub fn iter(&self) -> Result<std::slice::Iter<'_, Row>> {
        Ok(self.grid()?.data_rows.iter())
    }

    /// Data row by 0-based index
    pub fn row(&self, index: usize) -> Result<&Row> {
        let grid = self.grid()?;
        grid.data_rows
            .get(index)
            .ok_or(Error::RowOutOfBounds(index, grid.data_rows.len()))
    }

    /// Any row by 1-based sheet row number, header rows included
    pub fn get_row(&self, row_number: usize) -> Result<&Row> {
        let grid = self.grid()?;
        let slot = grid.slot_for(self.ctx.header_count, row_number)?;
        Ok(grid.row_at(slot))
    }

    /// The last header row, `None` when the sheet has no header rows
    pub fn headers(&self) -> Result<Option<&Row>> {
        Ok(self.grid()?.headers())
    }

    /// Texts of the last header row
    pub fn header_texts(&self) -> Result<Vec<&str>> {
        Ok(self.grid()?.header_texts())
    }

    pub fn header_rows(&self) -> Result<&[Row]> {
        Ok(&self.grid()?.header_rows)
    }

    /// One key per column, derived from sheet row 1
    pub fn column_keys(&self) -> Result<Vec<String>> {
        Ok(self.grid()?.column_keys(self.ctx.tagger))
    }

    /// Header rows plus data rows
    pub fn max_row(&self) -> Result<usize> {
        Ok(self.grid()?.max_row())
    }

    /// Highest 1-based column holding a cell
    pub fn max_col(&self) -> Result<usize> {
        Ok(self.grid()?.max_col)
    }

    /// Cell of a data row
    pub fn cell<C: Into<ColumnRef>>(&self, index: usize, col: C) -> Result<Option<&Cell>> {
        let grid = self.grid()?;
        let slot = grid.data_slot(index)?;
        let icol = grid.resolve_column(&self.ctx, &col.into())?;
        Ok(grid.row_at(slot).get(icol))
    }

    /// Text of a data row's cell, empty when the cell is empty
    pub fn value<C: Into<ColumnRef>>(&self, index: usize, col: C) -> Result<&str> {
        Ok(self.cell(index, col)?.map_or("", Cell::text))
    }

    /// Whether some data row holds exactly `texts`
    pub fn contains<S: AsRef<str>>(&self, texts: &[S]) -> Result<bool> {
        Ok(self.grid()?.data_rows.iter().any(|row| {
            row.len() == texts.len()
                && texts
                    .iter()
                    .enumerate()
                    .all(|(i, t)| row.text(i) == t.as_ref())
        }))
    }

    /// Header text of the cell's column
    pub fn column_name(&self, cell: &Cell) -> Result<Option<&str>> {
        let icol = (cell.col() as usize).saturating_sub(1);
        Ok(self
            .grid()?
            .headers()
            .and_then(|h| h.get(icol))
            .map(Cell::text))
    }

    // === Writes ===

    /// Write access to a data row
    pub fn row_mut(&mut self, index: usize) -> Result<RowMut<'_, 's>> {
        let slot = self.grid()?.data_slot(index)?;
        Ok(RowMut::new(self, slot))
    }

    /// Write access to a header row, by 1-based row number
    pub fn header_row_mut(&mut self, row_number: usize) -> Result<RowMut<'_, 's>> {
        if row_number == 0 || row_number > self.ctx.header_count {
            return Err(Error::RowOutOfBounds(row_number, self.ctx.header_count));
        }
        self.load_data()?;
        Ok(RowMut::new(self, RowSlot::Header(row_number - 1)))
    }

    /// Write access to any row, by 1-based row number
    pub fn get_row_mut(&mut self, row_number: usize) -> Result<RowMut<'_, 's>> {
        let slot = self.grid()?.slot_for(self.ctx.header_count, row_number)?;
        Ok(RowMut::new(self, slot))
    }

    /// Coherent write of one data row cell
    pub fn set_value<C: Into<ColumnRef>, V: Into<CellInput>>(
        &mut self,
        index: usize,
        col: C,
        value: V,
    ) -> Result<()> {
        self.row_mut(index)?.set(col, value)
    }

    /// Overwrite a row by 1-based row number. Only cells whose value differs
    /// are written.
    pub fn set_row<V: Into<RowValues>>(&mut self, row_number: usize, values: V) -> Result<()> {
        let values = values.into();
        self.with_grid(|ctx, grid| {
            let slot = grid.slot_for(ctx.header_count, row_number)?;
            grid.set_row(ctx, slot, values)
        })
    }

    /// Overwrite a data row by 0-based index
    pub fn set_data_row<V: Into<RowValues>>(&mut self, index: usize, values: V) -> Result<()> {
        let values = values.into();
        self.with_grid(|ctx, grid| {
            let slot = grid.data_slot(index)?;
            grid.set_row(ctx, slot, values)
        })
    }

    /// Overwrite the last header row
    pub fn set_headers<V: Into<RowValues>>(&mut self, values: V) -> Result<()> {
        match self.ctx.header_count {
            0 => Err(Error::Unsupported("setting headers without header rows")),
            n => self.set_row(n, values),
        }
    }

    /// Append a row after the last non-blank row.
    ///
    /// With `overwrite`, values the insert did not report as written are
    /// written again cell by cell.
    pub fn append<V: Into<RowValues>>(&mut self, values: V, overwrite: bool) -> Result<()> {
        let values = values.into();
        self.with_grid(|ctx, grid| grid.append(ctx, values, overwrite))
    }

    /// Delete a data row by 0-based index; later rows move up one row.
    pub fn delete_row(&mut self, index: usize) -> Result<()> {
        self.with_grid(|ctx, grid| grid.delete_data_row(ctx, index))
    }

    /// The list feed, fetched on first use
    pub fn list_feed(&mut self) -> Result<&[ListEntry]> {
        self.with_grid(|ctx, grid| grid.list_feed(ctx).map(|_| ()))?;
        Ok(self
            .cache
            .get()
            .and_then(|grid| grid.list_feed.as_deref())
            .unwrap_or_default())
    }

    /// Column keys used by the list feed, in first-seen order. Keys the
    /// cache does not derive itself are logged.
    pub fn column_key_check(&mut self) -> Result<Vec<String>> {
        self.with_grid(|ctx, grid| {
            let keys = grid.column_keys(ctx.tagger);
            let mut seen: Vec<String> = Vec::new();
            let mut missing: Vec<String> = Vec::new();
            for entry in grid.list_feed(ctx)? {
                for key in entry.keys() {
                    if !seen.iter().any(|k| k == key) {
                        seen.push(key.to_string());
                    }
                    if !keys.iter().any(|k| k == key) && !missing.iter().any(|k| k == key) {
                        missing.push(key.to_string());
                    }
                }
            }
            if !missing.is_empty() {
                tracing::warn!(?missing, "Unrecognized column keys in list feed");
            }
            Ok(seen)
        })
    }
}

impl fmt::Display for Worksheet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<worksheet \"{}\">", self.ctx.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::store::{Call, CellEntry, MemoryStore, RemoteStore, WorksheetsFeed};
    use pretty_assertions::assert_eq;

    fn fixture(rows: &[&[&str]]) -> (MemoryStore, Session, String) {
        let store = MemoryStore::new();
        let sheet = store.add_sheet("doc", "Sheet 1", rows);
        let session = Session::with_store(store.clone()).with_retry_policy(RetryPolicy::none());
        (store, session, sheet)
    }

    fn open_with(session: &Session, options: WorksheetOptions) -> Worksheet<'_> {
        let key = DocumentKey::parse("doc").unwrap();
        let feed = session.list_worksheets(&key).unwrap();
        Worksheet::new(session, key, &feed.entries[0], options).unwrap()
    }

    fn open(session: &Session) -> Worksheet<'_> {
        open_with(session, WorksheetOptions::default())
    }

    fn update(sheet: &str, row: u32, col: u32, value: &str) -> Call {
        Call::UpdateCell {
            key: "doc".into(),
            worksheet: sheet.into(),
            row,
            col,
            value: value.into(),
        }
    }

    fn people() -> (MemoryStore, Session, String) {
        fixture(&[&["Name", "Age"], &["Ann", "30"], &["Bob", "41"], &["Cy", "52"]])
    }

    /// Serves a fixed cell feed in whatever order it was given
    #[derive(Clone)]
    struct FixedCells(Vec<CellEntry>);

    impl RemoteStore for FixedCells {
        fn list_worksheets(&self, _key: &str) -> Result<WorksheetsFeed> {
            Ok(WorksheetsFeed {
                title: "Fixed".into(),
                entries: vec![WorksheetEntry {
                    id: "https://host/feeds/worksheets/doc/private/full/od6".into(),
                    title: "Fixed".into(),
                    row_count: 10,
                    col_count: 10,
                }],
            })
        }

        fn fetch_cells(&self, _key: &str, _worksheet: &str) -> Result<Vec<CellEntry>> {
            Ok(self.0.clone())
        }

        fn fetch_list(&self, _key: &str, _worksheet: &str) -> Result<Vec<ListEntry>> {
            Err(Error::remote("not served"))
        }

        fn insert_row(&self, _: &str, _: &str, _: &[(String, String)]) -> Result<ListEntry> {
            Err(Error::remote("not served"))
        }

        fn update_cell(&self, _: &str, _: &str, _: u32, _: u32, _: &str) -> Result<CellEntry> {
            Err(Error::remote("not served"))
        }

        fn delete_row(&self, _entry: &ListEntry) -> Result<()> {
            Err(Error::remote("not served"))
        }

        fn add_worksheet(&self, _: &str, _: &str, _: u32, _: u32) -> Result<WorksheetEntry> {
            Err(Error::remote("not served"))
        }
    }

    fn entry(row: u32, col: u32, text: &str) -> CellEntry {
        CellEntry {
            row,
            col,
            text: text.into(),
            input_value: text.into(),
        }
    }

    #[test]
    fn test_load_out_of_order_with_gaps() {
        let session = Session::with_store(FixedCells(vec![
            entry(4, 2, "y"),
            entry(1, 1, "Name"),
            entry(2, 1, "x"),
            entry(1, 2, "Age"),
        ]));
        let ws = open(&session);
        assert!(!ws.has_data());

        assert_eq!(ws.header_texts().unwrap(), vec!["Name", "Age"]);
        assert_eq!(ws.len().unwrap(), 3);
        let numbers: Vec<u32> = ws.iter().unwrap().map(Row::row_number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
        assert!(ws.row(1).unwrap().is_empty());
        assert_eq!(ws.value(2, "Age").unwrap(), "y");
        assert_eq!(ws.row(2).unwrap().get(1).unwrap().row(), 4);
        assert_eq!(ws.max_col().unwrap(), 2);
        assert_eq!(ws.max_row().unwrap(), 4);
        assert!(ws.has_data());
    }

    #[test]
    fn test_blank_header_rows_are_synthesized() {
        let session = Session::with_store(FixedCells(vec![entry(3, 1, "data")]));
        let ws = open_with(&session, WorksheetOptions::default().with_header_count(2));
        assert_eq!(ws.header_rows().unwrap().len(), 2);
        assert!(ws.headers().unwrap().unwrap().is_empty());
        assert_eq!(ws.row(0).unwrap().row_number(), 3);
        assert_eq!(ws.get_row(3).unwrap().text(0), "data");
    }

    #[test]
    fn test_loads_once() {
        let (store, session, _) = people();
        let mut ws = open(&session);
        store.clear_calls();

        ws.len().unwrap();
        ws.rows().unwrap();
        let fetches = |store: &MemoryStore| {
            store
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::FetchCells { .. }))
                .count()
        };
        assert_eq!(fetches(&store), 1);

        ws.reload().unwrap();
        assert_eq!(fetches(&store), 2);
    }

    #[test]
    fn test_update_cell_by_header() {
        let (store, session, sheet) = fixture(&[&["Name", "Age"], &["Ann", "30"]]);
        let mut ws = open(&session);

        ws.row_mut(0).unwrap().set("Age", "31").unwrap();

        assert_eq!(store.writes(), vec![update(&sheet, 2, 2, "31")]);
        assert_eq!(ws.value(0, "Age").unwrap(), "31");
        assert_eq!(ws.cell(0, 1usize).unwrap().unwrap().col(), 2);
    }

    #[test]
    fn test_failed_write_leaves_cache() {
        let (store, session, sheet) = fixture(&[&["Name", "Age"], &["Ann", "30"]]);
        let mut ws = open(&session);
        ws.load_data().unwrap();

        store.fail_next_updates(1);
        let err = ws.set_value(0, "Age", 31).unwrap_err();
        assert!(err.is_remote());
        assert_eq!(ws.value(0, "Age").unwrap(), "30");
        assert_eq!(store.rows("doc", &sheet).unwrap()[1], vec!["Ann", "30"]);
    }

    #[test]
    fn test_equal_value_is_not_written() {
        let (store, session, _) = people();
        let mut ws = open(&session);

        ws.set_value(0, "Age", 30).unwrap();
        ws.set_value(0, 0usize, "Ann").unwrap();
        ws.set_value(0, 5usize, None::<&str>).unwrap();
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_clearing_cell_trims_row() {
        let (store, session, sheet) = people();
        let mut ws = open(&session);

        ws.set_value(0, "Age", "").unwrap();
        assert_eq!(store.writes(), vec![update(&sheet, 2, 2, "")]);
        assert_eq!(ws.row(0).unwrap().len(), 1);
    }

    #[test]
    fn test_column_by_key_or_number() {
        let (_, session, _) = fixture(&[&["Full Name", "Age"], &["Ann", "30"]]);
        let mut ws = open(&session);

        assert_eq!(ws.value(0, "FullName").unwrap(), "Ann");
        assert_eq!(ws.value(0, "1").unwrap(), "30");
        let err = ws.set_value(0, "Height", 180).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn(_)));
    }

    #[test]
    fn test_set_row_mapping_clears_other_columns() {
        let (store, session, sheet) = people();
        let mut ws = open(&session);

        ws.set_row(3, RowValues::mapping([("Age", 42)])).unwrap();
        assert_eq!(
            store.writes(),
            vec![update(&sheet, 3, 1, ""), update(&sheet, 3, 2, "42")]
        );
        assert_eq!(ws.row(1).unwrap().texts(), vec!["", "42"]);
    }

    #[test]
    fn test_set_headers() {
        let (store, session, sheet) = people();
        let mut ws = open(&session);

        ws.set_headers(["Name", "Years"]).unwrap();
        assert_eq!(store.writes(), vec![update(&sheet, 1, 2, "Years")]);
        assert_eq!(ws.column_keys().unwrap()[1], "Years");
    }

    #[test]
    fn test_append_written_by_insert() {
        let (store, session, sheet) = people();
        let mut ws = open(&session);

        ws.append(["Dee", "23"], true).unwrap();
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert!(matches!(&writes[0], Call::InsertRow { .. }));
        assert_eq!(ws.len().unwrap(), 4);
        assert_eq!(ws.row(3).unwrap().row_number(), 5);
        assert_eq!(store.rows("doc", &sheet).unwrap()[4], vec!["Dee", "23"]);
    }

    #[test]
    fn test_append_overwrites_dropped_columns() {
        let (store, session, sheet) = people();
        let mut ws = open(&session);

        ws.append(["Dee", "23", "extra"], true).unwrap();
        let writes = store.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1], update(&sheet, 5, 3, "extra"));
        assert_eq!(store.rows("doc", &sheet).unwrap()[4], vec!["Dee", "23", "extra"]);
        assert_eq!(ws.row(3).unwrap().texts(), vec!["Dee", "23", "extra"]);
        assert_eq!(ws.max_col().unwrap(), 3);
    }

    #[test]
    fn test_append_without_overwrite_trusts_cache() {
        let (store, session, sheet) = people();
        let mut ws = open(&session);

        ws.append(["Dee", "23", "extra"], false).unwrap();
        assert_eq!(store.writes().len(), 1);
        assert_eq!(ws.row(3).unwrap().text(2), "extra");
        assert_eq!(store.rows("doc", &sheet).unwrap()[4], vec!["Dee", "23"]);
    }

    #[test]
    fn test_append_blank_row() {
        let (store, session, sheet) = fixture(&[&["Name", "Age"], &["Ann", "30"]]);
        let mut ws = open(&session);

        ws.append(Vec::<&str>::new(), true).unwrap();
        let writes = store.writes();
        assert_eq!(
            writes[0],
            Call::InsertRow {
                key: "doc".into(),
                worksheet: sheet.clone(),
                values: vec![("Name".into(), " ".into())],
            }
        );
        assert_eq!(writes[1], update(&sheet, 3, 1, ""));
        assert_eq!(ws.len().unwrap(), 2);
        assert!(ws.row(1).unwrap().is_empty());
        assert_eq!(ws.value(1, 0usize).unwrap(), "");
    }

    #[test]
    fn test_append_pads_blank_header() {
        let (store, session, sheet) = fixture(&[&[], &["a"]]);
        let mut ws = open(&session);

        ws.append(["b"], true).unwrap();
        let writes = store.writes();
        assert_eq!(writes[0], update(&sheet, 1, 1, " "));
        assert!(matches!(&writes[1], Call::InsertRow { .. }));
        assert_eq!(writes[2], update(&sheet, 1, 1, ""));
        assert_eq!(writes.len(), 3);

        assert!(ws.headers().unwrap().unwrap().is_empty());
        assert_eq!(ws.row(1).unwrap().text(0), "b");
        let rows = store.rows("doc", &sheet).unwrap();
        assert_eq!(rows[2], vec!["b"]);
    }

    #[test]
    fn test_append_unkeyed_values_clears_placeholder() {
        let (store, session, sheet) = fixture(&[&["Name", "Age"], &["Ann", "30"]]);
        let mut ws = open(&session);

        let mut values = vec![""; 30];
        values.push("x");
        ws.append(values, true).unwrap();
        let writes = store.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[1], update(&sheet, 3, 31, "x"));
        assert_eq!(writes[2], update(&sheet, 3, 1, ""));

        let rows = store.rows("doc", &sheet).unwrap();
        assert_eq!(rows[2].len(), 31);
        assert_eq!(rows[2][0], "");
        assert_eq!(ws.value(1, 0usize).unwrap(), "");
        assert_eq!(ws.value(1, 30usize).unwrap(), "x");

        ws.delete_row(1).unwrap();
        assert_eq!(ws.len().unwrap(), 1);
    }

    /// Fails every write that clears the first cell of sheet row 1
    #[derive(Clone)]
    struct FailingRestore(MemoryStore);

    impl RemoteStore for FailingRestore {
        fn list_worksheets(&self, key: &str) -> Result<WorksheetsFeed> {
            self.0.list_worksheets(key)
        }

        fn fetch_cells(&self, key: &str, worksheet: &str) -> Result<Vec<CellEntry>> {
            self.0.fetch_cells(key, worksheet)
        }

        fn fetch_list(&self, key: &str, worksheet: &str) -> Result<Vec<ListEntry>> {
            self.0.fetch_list(key, worksheet)
        }

        fn insert_row(
            &self,
            key: &str,
            worksheet: &str,
            values: &[(String, String)],
        ) -> Result<ListEntry> {
            self.0.insert_row(key, worksheet, values)
        }

        fn update_cell(
            &self,
            key: &str,
            worksheet: &str,
            row: u32,
            col: u32,
            value: &str,
        ) -> Result<CellEntry> {
            if row == 1 && col == 1 && value.is_empty() {
                return Err(Error::remote("restore failed"));
            }
            self.0.update_cell(key, worksheet, row, col, value)
        }

        fn delete_row(&self, entry: &ListEntry) -> Result<()> {
            self.0.delete_row(entry)
        }

        fn add_worksheet(
            &self,
            key: &str,
            title: &str,
            rows: u32,
            cols: u32,
        ) -> Result<WorksheetEntry> {
            self.0.add_worksheet(key, title, rows, cols)
        }
    }

    #[test]
    fn test_append_records_row_when_clearing_header_fails() {
        let store = MemoryStore::new();
        let sheet = store.add_sheet("doc", "Sheet 1", &[&[], &[], &["a"]]);
        let session =
            Session::with_store(FailingRestore(store.clone())).with_retry_policy(RetryPolicy::none());
        let mut ws = open_with(&session, WorksheetOptions::default().with_header_count(2));

        let err = ws.append(["b"], true).unwrap_err();
        assert!(err.is_remote());

        // The insert went through, so the row is cached all the same
        assert_eq!(ws.len().unwrap(), 2);
        assert_eq!(ws.row(1).unwrap().text(0), "b");
        assert_eq!(ws.row(1).unwrap().row_number(), 4);

        // Row 2 is cleared even though clearing row 1 failed
        let writes = store.writes();
        assert_eq!(writes.last(), Some(&update(&sheet, 2, 1, "")));
        let rows = store.rows("doc", &sheet).unwrap();
        assert_eq!(rows[0], vec![" "]);
        assert!(rows[1].is_empty());
        assert_eq!(rows[3], vec!["b"]);
        assert_eq!(ws.header_rows().unwrap()[0].text(0), " ");
        assert!(ws.header_rows().unwrap()[1].is_empty());
    }

    #[test]
    fn test_append_mapping() {
        let (store, session, sheet) = people();
        let mut ws = open(&session);

        ws.append(RowValues::mapping([("Age", "19")]), true).unwrap();
        assert_eq!(store.writes().len(), 1);
        assert_eq!(store.rows("doc", &sheet).unwrap()[4], vec!["", "19"]);
        assert_eq!(ws.row(3).unwrap().texts(), vec!["", "19"]);
    }

    #[test]
    fn test_delete_renumbers_following_rows() {
        let (store, session, sheet) = people();
        let mut ws = open(&session);

        ws.delete_row(0).unwrap();
        assert!(matches!(store.writes().as_slice(), [Call::DeleteRow { .. }]));
        assert_eq!(ws.len().unwrap(), 2);
        for (i, row) in ws.iter().unwrap().enumerate() {
            assert_eq!(row.row_number() as usize, ws.header_count() + i + 1);
            assert!(row.iter().flatten().all(|c| c.row() == row.row_number()));
        }

        store.clear_calls();
        ws.set_value(0, "Age", 42).unwrap();
        assert_eq!(store.writes(), vec![update(&sheet, 2, 2, "42")]);
        assert_eq!(
            store.rows("doc", &sheet).unwrap(),
            vec![vec!["Name", "Age"], vec!["Bob", "42"], vec!["Cy", "52"]]
        );
    }

    #[test]
    fn test_delete_mismatch_is_fatal() {
        let (store, session, sheet) = people();
        let mut ws = open(&session);
        ws.load_data().unwrap();

        store.update_cell("doc", &sheet, 3, 1, "Zed").unwrap();
        store.clear_calls();

        let err = ws.delete_row(1).unwrap_err();
        assert!(matches!(err, Error::Inconsistent { row: 3, .. }));
        assert!(store.writes().is_empty());
        assert_eq!(ws.len().unwrap(), 3);
    }

    #[test]
    fn test_delete_past_blank_row() {
        let (store, session, sheet) = fixture(&[&["Name"], &["a"], &[], &["b"]]);
        let mut ws = open(&session);

        ws.delete_row(2).unwrap();
        let writes = store.writes();
        assert_eq!(writes[0], update(&sheet, 3, 1, " "));
        assert_eq!(writes[1], update(&sheet, 3, 1, ""));
        assert!(matches!(writes[2], Call::DeleteRow { .. }));
        assert_eq!(ws.len().unwrap(), 2);
        assert_eq!(
            store.rows("doc", &sheet).unwrap(),
            vec![vec!["Name".to_string()], vec!["a".to_string()], vec![]]
        );
    }

    #[test]
    fn test_delete_header_row_is_unsupported() {
        let (_, session, _) = people();
        let mut ws = open(&session);
        let err = ws.header_row_mut(1).unwrap().delete().unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_list_feed_padding_is_removed() {
        let (store, session, _) = fixture(&[&["Name"], &["a"], &[], &["b"]]);
        let mut ws = open(&session);

        let feed = ws.list_feed().unwrap().to_vec();
        assert_eq!(feed.len(), 3);
        assert!(feed[1].custom.is_empty());
        assert_eq!(feed[2].get("Name"), Some("b"));
        assert!(ws.row(1).unwrap().is_empty());

        store.set_list_feed_stops_at_blank_row(false);
        ws.reload().unwrap();
        store.clear_calls();
        assert_eq!(ws.list_feed().unwrap().len(), 3);
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_list_feed_follows_writes() {
        let (store, session, _) = people();
        let mut ws = open(&session);
        ws.list_feed().unwrap();

        ws.set_value(1, "Name", "Bea").unwrap();
        ws.set_value(2, "Age", "").unwrap();
        let feed = ws.list_feed().unwrap();
        assert_eq!(feed[1].get("Name"), Some("Bea"));
        assert_eq!(feed[2].get("Age"), None);

        let fetches = store
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::FetchList { .. }))
            .count();
        assert_eq!(fetches, 1);
    }

    #[test]
    fn test_column_key_check() {
        let (_, session, _) = fixture(&[&["Name", "Name", "Zip Code"], &["a", "b", "c"]]);
        let mut ws = open(&session);
        assert_eq!(ws.column_key_check().unwrap(), vec!["Name", "Name_2", "ZipCode"]);
    }

    #[test]
    fn test_multiple_header_rows() {
        let (_, session, _) = fixture(&[&["Report"], &["Name", "Age"], &["Ann", "30"]]);
        let ws = open_with(&session, WorksheetOptions::default().with_header_count(2));

        assert_eq!(ws.header_texts().unwrap(), vec!["Name", "Age"]);
        assert_eq!(ws.get_row(1).unwrap().text(0), "Report");
        assert_eq!(ws.len().unwrap(), 1);
        assert_eq!(ws.row(0).unwrap().row_number(), 3);
        assert_eq!(ws.value(0, "Age").unwrap(), "30");
    }

    #[test]
    fn test_set_header_count_reloads() {
        let (_, session, _) = people();
        let mut ws = open(&session);
        assert_eq!(ws.len().unwrap(), 3);

        ws.set_header_count(2).unwrap();
        assert!(!ws.has_data());
        assert_eq!(ws.len().unwrap(), 2);
        assert_eq!(ws.header_texts().unwrap(), vec!["Ann", "30"]);
    }

    #[test]
    fn test_too_few_rows() {
        let (_, session, _) = people();
        let key = DocumentKey::parse("doc").unwrap();
        let entry = session.add_worksheet(&key, "Tiny", 1, 5).unwrap();

        let err = Worksheet::new(
            &session,
            key.clone(),
            &entry,
            WorksheetOptions::default().with_header_count(2),
        )
        .unwrap_err();
        assert!(matches!(err, Error::TooFewRows { rows: 1, headers: 2 }));

        let mut ws = Worksheet::new(&session, key, &entry, WorksheetOptions::default()).unwrap();
        assert!(ws.set_header_count(3).is_err());
    }

    #[test]
    fn test_names() {
        let store = MemoryStore::new();
        store.add_document("doc", "Budget");
        store.add_sheet("doc", "Sheet 1", &[&["Name"], &["a"]]);
        let session = Session::with_store(store);
        let ws = open(&session);

        assert_eq!(ws.full_name().unwrap(), "\"Sheet 1\" in spreadsheet \"Budget\"");
        assert_eq!(ws.to_string(), "<worksheet \"Sheet 1\">");
        let cell = ws.cell(0, 0usize).unwrap().unwrap();
        assert_eq!(ws.column_name(cell).unwrap(), Some("Name"));
    }

    #[test]
    fn test_contains_and_out_of_bounds() {
        let (_, session, _) = people();
        let ws = open(&session);
        assert!(ws.contains(&["Bob", "41"]).unwrap());
        assert!(!ws.contains(&["Bob"]).unwrap());
        assert!(matches!(ws.row(9), Err(Error::RowOutOfBounds(9, 3))));
        assert!(ws.get_row(0).is_err());
    }
}
