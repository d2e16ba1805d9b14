//! # feedgrid
//!
//! A lazy, write-through cache over worksheets held by a remote document
//! service.
//!
//! Worksheets act like two-dimensional arrays: rows of cells, with the first
//! row(s) holding column labels. Cell data is fetched on first access, and
//! every write goes to the remote service before the cache changes, so the
//! cache never shows a value the service has not accepted.
//!
//! ## Features
//!
//! - Lazy cell feed loading with header/data row split
//! - Coherent cell writes with retry
//! - Row append through the list feed, row deletion with consistency check
//! - Column keys derived the way the list feed derives them
//! - XML export - optional (`xml` feature, on by default)
//!
//! ## Example
//!
//! ```rust
//! use feedgrid::prelude::*;
//!
//! let store = MemoryStore::new();
//! store.add_sheet("doc", "Tasks", &[&["Task", "Done"], &["Write", "no"]]);
//!
//! let session = Session::with_store(store);
//! let mut sheet = session.worksheet("doc", &WorksheetQuery::new()).unwrap();
//!
//! for row in sheet.iter().unwrap() {
//!     println!("{}", &row[0]);
//! }
//!
//! sheet.set_value(0, "Done", "yes").unwrap();
//! assert_eq!(sheet.value(0, 1usize).unwrap(), "yes");
//! ```

pub mod prelude;

// Re-export core types
pub use feedgrid_core::{
    normalize_header,
    Cell,
    CellEntry,
    CellInput,
    ColumnRef,
    ColumnTagger,
    Connector,
    Credentials,
    DocumentKey,
    // Error types
    Error,
    FallbackKeys,
    ListEntry,
    MemoryStore,
    RemoteStore,
    Result,
    RetryPolicy,
    Row,
    RowData,
    RowDataVal,
    RowMut,
    RowValues,
    // Main types
    Session,
    Spreadsheet,
    Worksheet,
    WorksheetEntry,
    WorksheetId,
    WorksheetOptions,
    WorksheetQuery,
    WorksheetsFeed,
    DEFAULT_SOURCE,
    SERVICE_FALLBACK_KEYS,
};

/// Recorded store calls
pub use feedgrid_core::store::Call;

// Re-export I/O types
#[cfg(feature = "xml")]
pub use feedgrid_xml::{XmlError, XmlResult, XmlWriteOptions, XmlWriter};

#[cfg(feature = "xml")]
use std::path::Path;

/// Extension trait for Worksheet to add XML export
#[cfg(feature = "xml")]
pub trait WorksheetExt {
    /// The data rows as an XML document
    fn to_xml(&self) -> XmlResult<String>;

    /// Save the data rows as an XML file
    fn save_xml<P: AsRef<Path>>(&self, path: P) -> XmlResult<()>;
}

#[cfg(feature = "xml")]
impl WorksheetExt for Worksheet<'_> {
    fn to_xml(&self) -> XmlResult<String> {
        feedgrid_xml::to_xml_string(self)
    }

    fn save_xml<P: AsRef<Path>>(&self, path: P) -> XmlResult<()> {
        feedgrid_xml::write_xml_file(self, path)
    }
}
