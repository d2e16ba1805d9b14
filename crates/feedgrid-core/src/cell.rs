//! Cell values read from the cell feed

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::store::CellEntry;

static HYPERLINK_FORMULA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)HYPERLINK\(\s*(?:"([^"]*)"|'([^']*)').*\)"#).expect("valid hyperlink pattern")
});

static ALLCAPS_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]{2,}").expect("valid allcaps pattern"));

/// One non-empty cell of a worksheet.
///
/// `row` and `col` are 1-based positions in the whole sheet, header rows
/// included. The text is fixed once read; a write replaces the cell.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    text: String,
    row: u32,
    col: u32,
    input_value: String,
}

impl Cell {
    /// Create a cell whose input value is its text
    pub fn new<S: Into<String>>(text: S, row: u32, col: u32) -> Self {
        let text = text.into();
        Self {
            input_value: text.clone(),
            text,
            row,
            col,
        }
    }

    /// Create a cell from a cell feed entry
    pub fn from_entry(entry: &CellEntry) -> Self {
        Self {
            text: entry.text.clone(),
            row: entry.row,
            col: entry.col,
            input_value: entry.input_value.clone(),
        }
    }

    /// Replace the input value (the formula or literal the user typed)
    pub fn with_input_value<S: Into<String>>(mut self, input_value: S) -> Self {
        self.input_value = input_value.into();
        self
    }

    /// Displayed text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 1-based row number in the sheet
    pub fn row(&self) -> u32 {
        self.row
    }

    /// 1-based column number in the sheet
    pub fn col(&self) -> u32 {
        self.col
    }

    /// The raw input, e.g. `=HYPERLINK("http://x", "label")`
    pub fn input_value(&self) -> &str {
        &self.input_value
    }

    /// URL of a `HYPERLINK(...)` formula input, if any
    pub fn link(&self) -> Option<&str> {
        let caps = HYPERLINK_FORMULA.captures(&self.input_value)?;
        caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
    }

    pub fn is_link(&self) -> bool {
        self.link().is_some()
    }

    /// Turn runs of two or more capitals into a capitalized word:
    /// `"HELLO World"` becomes `"Hello World"`.
    pub fn undo_allcaps(&self) -> String {
        let result = ALLCAPS_RUN
            .replace_all(&self.text, |caps: &regex::Captures<'_>| {
                let run = &caps[0];
                let mut chars = run.chars();
                match chars.next() {
                    Some(first) => {
                        let mut word = String::with_capacity(run.len());
                        word.push(first);
                        word.push_str(&chars.as_str().to_lowercase());
                        word
                    }
                    None => String::new(),
                }
            })
            .into_owned();

        if result != self.text {
            tracing::info!("Undid allcaps in {:?} to {:?}", self.text, result);
        }
        result
    }

    pub(crate) fn shift_up(&mut self) {
        self.row -= 1;
    }
}

impl AsRef<str> for Cell {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq<str> for Cell {
    fn eq(&self, other: &str) -> bool {
        self.text == other
    }
}

impl PartialEq<&str> for Cell {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

impl PartialEq<String> for Cell {
    fn eq(&self, other: &String) -> bool {
        &self.text == other
    }
}
