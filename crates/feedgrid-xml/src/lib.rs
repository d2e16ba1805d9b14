//! # feedgrid-xml
//!
//! Plain XML export of a worksheet's data rows. Each row becomes a row
//! element with one child per cell, named after the column header.

mod error;
mod options;
mod writer;

pub use error::{XmlError, XmlResult};
pub use options::XmlWriteOptions;
pub use writer::{tag_name, XmlWriter};

use std::io::Write;
use std::path::Path;

use feedgrid_core::Worksheet;

/// Write the worksheet's data rows with default options
pub fn write_xml<W: Write>(worksheet: &Worksheet<'_>, writer: W) -> XmlResult<()> {
    XmlWriter::write(worksheet, writer, &XmlWriteOptions::default())
}

/// Write the worksheet's data rows to a file with default options
pub fn write_xml_file<P: AsRef<Path>>(worksheet: &Worksheet<'_>, path: P) -> XmlResult<()> {
    XmlWriter::write_file(worksheet, path, &XmlWriteOptions::default())
}

/// The export as a string
pub fn to_xml_string(worksheet: &Worksheet<'_>) -> XmlResult<String> {
    let mut buf = Vec::new();
    write_xml(worksheet, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
