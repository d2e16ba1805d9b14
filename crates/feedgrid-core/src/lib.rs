//! # feedgrid-core
//!
//! A lazy, write-through cache over worksheets held by a remote document
//! service.
//!
//! The service exposes each worksheet twice: as a cell feed (every non-empty
//! cell with its position) and as a list feed (each row as a record keyed by
//! column keys derived from sheet row 1). This crate provides:
//! - [`Session`] - Credentials and the lazily opened [`RemoteStore`]
//! - [`Worksheet`] - The cached grid of one worksheet, split into header and
//!   data rows, with coherent cell writes, appends and deletes
//! - [`Spreadsheet`] and [`WorksheetQuery`] - Documents and worksheet selection
//! - [`ColumnTagger`] - Column keys the way the list feed derives them
//! - [`MemoryStore`] - An in-memory service for tests and offline use
//!
//! ## Example
//!
//! ```rust
//! use feedgrid_core::{MemoryStore, Session, WorksheetQuery};
//!
//! let store = MemoryStore::new();
//! store.add_sheet("doc", "People", &[&["Name", "Age"], &["Ann", "30"]]);
//!
//! let session = Session::with_store(store.clone());
//! let mut sheet = session
//!     .worksheet("doc", &WorksheetQuery::new().title("People"))
//!     .unwrap();
//!
//! assert_eq!(sheet.value(0, "Name").unwrap(), "Ann");
//!
//! // Writes go to the store first, then to the cache
//! sheet.set_value(0, "Age", 31).unwrap();
//! sheet.append(vec!["Bob", "41"], true).unwrap();
//! assert_eq!(sheet.len().unwrap(), 2);
//! assert_eq!(store.rows("doc", "od6").unwrap()[2], vec!["Bob", "41"]);
//! ```

pub mod cell;
pub mod column;
pub mod error;
pub mod id;
pub mod retry;
pub mod row;
pub mod row_data;
pub mod session;
pub mod spreadsheet;
pub mod store;
pub mod worksheet;

// Re-exports for convenience
pub use cell::Cell;
pub use column::{normalize_header, ColumnTagger, FallbackKeys, SERVICE_FALLBACK_KEYS};
pub use error::{Error, Result};
pub use id::{DocumentKey, WorksheetId};
pub use retry::RetryPolicy;
pub use row::{CellInput, ColumnRef, Row, RowMut};
pub use row_data::{InsertPayload, RowData, RowDataVal, RowValues};
pub use session::{Connector, Credentials, Session};
pub use spreadsheet::{Spreadsheet, WorksheetQuery};
pub use store::{
    CellEntry, ListEntry, MemoryStore, RemoteStore, WorksheetEntry, WorksheetsFeed,
};
pub use worksheet::{Worksheet, WorksheetOptions};

/// Client identifier sent with a login unless overridden
pub const DEFAULT_SOURCE: &str = "feedgrid-v1";
