//! Documents and worksheet selection

use std::fmt;

use crate::error::{Error, Result};
use crate::id::{DocumentKey, WorksheetId};
use crate::session::Session;
use crate::worksheet::{Worksheet, WorksheetOptions};

/// The worksheets of one remote document, in document order
#[derive(Debug)]
pub struct Spreadsheet<'s> {
    key: DocumentKey,
    title: String,
    worksheets: Vec<Worksheet<'s>>,
}

impl<'s> Spreadsheet<'s> {
    pub fn new<S: Into<String>>(key: DocumentKey, title: S) -> Self {
        Self {
            key,
            title: title.into(),
            worksheets: Vec::new(),
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Document title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Add a worksheet; a worksheet with the same id is rejected.
    pub fn push(&mut self, worksheet: Worksheet<'s>) -> Result<()> {
        if self.by_id(worksheet.id().short_id()).is_some() {
            return Err(Error::DuplicateWorksheet(worksheet.id().to_string()));
        }
        self.worksheets.push(worksheet);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.worksheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Worksheet<'s>> {
        self.worksheets.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Worksheet<'s>> {
        self.worksheets.get_mut(index)
    }

    /// First worksheet with the given title
    pub fn by_title(&self, title: &str) -> Option<&Worksheet<'s>> {
        self.worksheets.iter().find(|ws| ws.title() == title)
    }

    pub fn by_title_mut(&mut self, title: &str) -> Option<&mut Worksheet<'s>> {
        self.worksheets.iter_mut().find(|ws| ws.title() == title)
    }

    /// Worksheet by short id
    pub fn by_id(&self, short_id: &str) -> Option<&Worksheet<'s>> {
        self.worksheets.iter().find(|ws| *ws.id() == short_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Worksheet<'s>> {
        self.worksheets.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Worksheet<'s>> {
        self.worksheets.iter_mut()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.worksheets.iter().map(Worksheet::title).collect()
    }
}

impl<'s> IntoIterator for Spreadsheet<'s> {
    type Item = Worksheet<'s>;
    type IntoIter = std::vec::IntoIter<Worksheet<'s>>;

    fn into_iter(self) -> Self::IntoIter {
        self.worksheets.into_iter()
    }
}

impl<'a, 's> IntoIterator for &'a Spreadsheet<'s> {
    type Item = &'a Worksheet<'s>;
    type IntoIter = std::slice::Iter<'a, Worksheet<'s>>;

    fn into_iter(self) -> Self::IntoIter {
        self.worksheets.iter()
    }
}

impl fmt::Display for Spreadsheet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<spreadsheet \"{}\" ({} worksheets)>", self.title, self.len())
    }
}

/// Criteria selecting one worksheet of a document.
///
/// Every criterion given must match. With none given the document must hold
/// exactly one worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorksheetQuery {
    /// 1-based position in the document
    pub num: Option<usize>,
    /// Short or full worksheet id
    pub id: Option<String>,
    pub title: Option<String>,
    /// Header row count for the selected worksheet
    pub header_count: Option<usize>,
}

impl WorksheetQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num(mut self, num: usize) -> Self {
        self.num = Some(num);
        self
    }

    pub fn id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn header_count(mut self, header_count: usize) -> Self {
        self.header_count = Some(header_count);
        self
    }

    fn is_unfiltered(&self) -> bool {
        self.num.is_none() && self.id.is_none() && self.title.is_none()
    }
}

impl fmt::Display for WorksheetQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "num={:?} id={:?} title={:?}",
            self.num, self.id, self.title
        )
    }
}

fn title_selected(titles: Option<&[&str]>, title: &str) -> bool {
    titles.map_or(true, |titles| titles.contains(&title))
}

impl Session {
    /// Worksheets of a document, optionally only those whose title is in
    /// `titles`. The key may be a document URL.
    pub fn worksheets(&self, key: &str, titles: Option<&[&str]>) -> Result<Vec<Worksheet<'_>>> {
        let key = DocumentKey::parse(key)?;
        let feed = self.list_worksheets(&key)?;

        let mut worksheets = Vec::new();
        for entry in &feed.entries {
            if !title_selected(titles, &entry.title) {
                continue;
            }
            let ws = Worksheet::new(self, key.clone(), entry, WorksheetOptions::default())?
                .with_document_title(feed.title.clone());
            worksheets.push(ws);
        }
        Ok(worksheets)
    }

    /// Exactly one worksheet matching `query`
    pub fn worksheet(&self, key: &str, query: &WorksheetQuery) -> Result<Worksheet<'_>> {
        if query.num == Some(0) {
            return Err(Error::InvalidSelection("num counts from 1".to_string()));
        }
        let wanted_id = query.id.as_deref().map(WorksheetId::parse).transpose()?;

        let worksheets = self.worksheets(key, None)?;
        let titles: Vec<String> = worksheets.iter().map(|ws| ws.title().to_string()).collect();
        let mut matches: Vec<Worksheet<'_>> = worksheets
            .into_iter()
            .enumerate()
            .filter(|(i, ws)| {
                query.num.map_or(true, |n| n == i + 1)
                    && wanted_id.as_ref().map_or(true, |id| ws.id() == id)
                    && query.title.as_deref().map_or(true, |t| ws.title() == t)
            })
            .map(|(_, ws)| ws)
            .collect();

        if matches.len() != 1 {
            let query = if query.is_unfiltered() {
                "no criteria".to_string()
            } else {
                query.to_string()
            };
            return Err(Error::WorksheetSelection {
                matched: matches.len(),
                query,
                titles,
            });
        }

        let mut ws = matches.remove(0);
        if let Some(header_count) = query.header_count {
            ws.set_header_count(header_count)?;
        }
        Ok(ws)
    }

    /// A spreadsheet holding every worksheet of the document
    pub fn spreadsheet(&self, key: &str) -> Result<Spreadsheet<'_>> {
        let key = DocumentKey::parse(key)?;
        let feed = self.list_worksheets(&key)?;

        let mut spreadsheet = Spreadsheet::new(key.clone(), feed.title.clone());
        for entry in &feed.entries {
            let ws = Worksheet::new(self, key.clone(), entry, WorksheetOptions::default())?
                .with_document_title(feed.title.clone());
            spreadsheet.push(ws)?;
        }
        Ok(spreadsheet)
    }

    /// Create a worksheet and open it
    pub fn add_worksheet_to(
        &self,
        key: &str,
        title: &str,
        rows: u32,
        cols: u32,
        header_count: usize,
    ) -> Result<Worksheet<'_>> {
        let key = DocumentKey::parse(key)?;
        let entry = self.add_worksheet(&key, title, rows, cols)?;
        Worksheet::new(
            self,
            key,
            &entry,
            WorksheetOptions::default().with_header_count(header_count),
        )
    }

    /// Short ids of a document's worksheets, optionally filtered by title
    pub fn worksheet_ids(&self, key: &str, titles: Option<&[&str]>) -> Result<Vec<WorksheetId>> {
        let key = DocumentKey::parse(key)?;
        self.list_worksheets(&key)?
            .entries
            .iter()
            .filter(|entry| title_selected(titles, &entry.title))
            .map(|entry| WorksheetId::parse(&entry.id))
            .collect()
    }

    /// Resolve a worksheet id.
    ///
    /// A full id is parsed without a remote call. Otherwise `key_or_full_id`
    /// is a document key and the single worksheet titled `title` is looked
    /// up.
    pub fn worksheet_id(&self, key_or_full_id: &str, title: &str) -> Result<WorksheetId> {
        if WorksheetId::is_full_id(key_or_full_id) && !key_or_full_id.contains("key=") {
            return WorksheetId::from_full(key_or_full_id);
        }
        let mut ids = self.worksheet_ids(key_or_full_id, Some(&[title]))?;
        match ids.len() {
            1 => Ok(ids.remove(0)),
            0 => Err(Error::WorksheetSelection {
                matched: 0,
                query: format!("title={title:?}"),
                titles: Vec::new(),
            }),
            _ => Err(Error::AmbiguousWorksheetId(title.to_string())),
        }
    }

    /// Create a worksheet from a whole array in one import.
    ///
    /// The service offers no import call to build this on, so this always
    /// fails without contacting the store.
    pub fn create_worksheet(&self, key: &str, _values: &[&[&str]]) -> Result<Worksheet<'_>> {
        tracing::warn!(key, "Bulk worksheet import is not available");
        Err(Error::Unsupported("bulk worksheet import"))
    }
}
