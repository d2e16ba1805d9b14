//! XML writer

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use feedgrid_core::Worksheet;
use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use regex::Regex;

use crate::error::XmlResult;
use crate::options::XmlWriteOptions;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid tag pattern"));

/// Element name for a column: the header text with non-word characters
/// removed, or `fallback` when nothing is left. Names cannot start with a
/// digit, so those get a leading underscore.
pub fn tag_name<'a>(header: &'a str, fallback: &'a str) -> Cow<'a, str> {
    match NON_WORD.replace_all(header, "") {
        name if name.is_empty() => Cow::Borrowed(fallback),
        name if name.starts_with(|c: char| c.is_ascii_digit()) => Cow::Owned(format!("_{name}")),
        name => name,
    }
}

/// Worksheet XML writer
pub struct XmlWriter;

impl XmlWriter {
    /// Write a worksheet to an XML file
    pub fn write_file<P: AsRef<Path>>(
        worksheet: &Worksheet<'_>,
        path: P,
        options: &XmlWriteOptions,
    ) -> XmlResult<()> {
        let file = File::create(path)?;
        Self::write(worksheet, BufWriter::new(file), options)
    }

    /// Write a worksheet to a writer, loading its cells first if needed
    pub fn write<W: Write>(
        worksheet: &Worksheet<'_>,
        mut writer: W,
        options: &XmlWriteOptions,
    ) -> XmlResult<()> {
        let headers = worksheet.header_texts()?;
        let keys = worksheet.column_keys()?;
        let tags: Vec<String> = (0..worksheet.max_col()?)
            .map(|i| {
                let fallback = keys.get(i).cloned().unwrap_or_else(|| format!("c{}", i + 1));
                tag_name(headers.get(i).copied().unwrap_or(""), &fallback).into_owned()
            })
            .collect();

        writeln!(writer, "<{}>", options.root_tag)?;
        for row in worksheet.iter()? {
            writeln!(writer, "<{}>", options.row_tag)?;
            for (tag, text) in tags.iter().zip(row.texts()) {
                writeln!(writer, "<{tag}>{}</{tag}>", escape(text))?;
            }
            writeln!(writer, "</{}>", options.row_tag)?;
            if options.blank_line_after_row {
                writeln!(writer)?;
            }
        }
        writeln!(writer, "</{}>", options.root_tag)?;
        writer.flush()?;
        Ok(())
    }
}
