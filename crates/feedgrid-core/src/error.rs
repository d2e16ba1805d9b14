//! Error types for feedgrid-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in feedgrid-core
#[derive(Debug, Error)]
pub enum Error {
    /// A worksheet id that neither parses as a full id nor forms a short token
    #[error("Could not parse worksheet ID \"{0}\"")]
    InvalidWorksheetId(String),

    /// A document key that could not be extracted from its input
    #[error("Invalid document key: {0}")]
    InvalidDocumentKey(String),

    /// More than one worksheet matched a title lookup for an id
    #[error("Multiple matching worksheet IDs found for title {0:?}")]
    AmbiguousWorksheetId(String),

    /// Zero or several worksheets matched a selection query
    #[error("{matched} worksheets matching {query}\ntitles={titles:?}")]
    WorksheetSelection {
        matched: usize,
        query: String,
        titles: Vec<String>,
    },

    /// A selection query that can never match (e.g. `num == 0`)
    #[error("Invalid worksheet selection: {0}")]
    InvalidSelection(String),

    /// The remote sheet has fewer rows than the configured header rows
    #[error("Fewer rows ({rows}) than specified headers ({headers})")]
    TooFewRows { rows: u32, headers: usize },

    /// A column key that matches neither a header nor a derived column key
    #[error("Invalid column key \"{0}\"")]
    UnknownColumn(String),

    /// Row index out of bounds
    #[error("Row {0} out of bounds (count: {1})")]
    RowOutOfBounds(usize, usize),

    /// A worksheet with the same id is already part of the spreadsheet
    #[error("Worksheet already present: {0}")]
    DuplicateWorksheet(String),

    /// A remote store call failed
    #[error("Remote store error: {0}")]
    Remote(String),

    /// The cached row and the list feed disagree about a row's contents
    #[error("Mismatch of remote and cached values in row {row}: cached {local:?}, remote {remote:?}")]
    Inconsistent {
        row: u32,
        local: Vec<String>,
        remote: Vec<String>,
    },

    /// Operation that is deliberately not implemented
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// Create a new remote store error with a message
    pub fn remote<S: Into<String>>(msg: S) -> Self {
        Error::Remote(msg.into())
    }

    /// Whether the error came back from the remote store rather than from
    /// local validation.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Remote(_))
    }
}
