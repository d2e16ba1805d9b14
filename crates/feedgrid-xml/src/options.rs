//! XML export options

/// Options for writing a worksheet as XML
#[derive(Debug, Clone)]
pub struct XmlWriteOptions {
    /// Root element name (default: `worksheet`)
    pub root_tag: String,
    /// Element name for each data row (default: `row`)
    pub row_tag: String,
    /// Blank line after each row element
    pub blank_line_after_row: bool,
}

impl Default for XmlWriteOptions {
    fn default() -> Self {
        Self {
            root_tag: "worksheet".to_string(),
            row_tag: "row".to_string(),
            blank_line_after_row: true,
        }
    }
}
