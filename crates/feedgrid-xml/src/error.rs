//! XML export error types

use thiserror::Error;

/// Result type for XML export
pub type XmlResult<T> = std::result::Result<T, XmlError>;

/// Errors that can occur while exporting a worksheet
#[derive(Debug, Error)]
pub enum XmlError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Loading the worksheet failed
    #[error("Core error: {0}")]
    Core(#[from] feedgrid_core::Error),
}
