//! Prelude module - common imports for feedgrid users
//!
//! ```rust
//! use feedgrid::prelude::*;
//! ```

pub use crate::{
    CellInput,
    ColumnRef,
    Connector,
    Credentials,
    // Error types
    Error,
    // In-memory service
    MemoryStore,
    RemoteStore,
    Result,
    RetryPolicy,
    Row,
    RowValues,
    // Main types
    Session,
    Spreadsheet,
    Worksheet,
    WorksheetOptions,
    WorksheetQuery,
};

#[cfg(feature = "xml")]
pub use crate::{WorksheetExt, XmlError};
