//! Worksheet ids and document keys
//!
//! The remote service refers to a worksheet either by a full feed URL such as
//! `https://host/feeds/worksheets/<key>/private/full/od6` or by the short
//! token after the last `/`. Document keys are pasted from browser URLs and
//! may carry a `key=` query parameter and a trailing `#gid=<n>` fragment.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static FULL_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://.*/(\w+)").expect("valid worksheet id pattern"));

static KEY_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://.*key=(\w+)").expect("valid document key pattern"));

static GID_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#gid=\d+$").expect("valid gid pattern"));

static SHORT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+$").expect("valid short id pattern"));

/// Identity of a worksheet in both of its textual forms
#[derive(Debug, Clone, Eq)]
pub struct WorksheetId {
    full_id: Option<String>,
    short_id: String,
}

impl WorksheetId {
    /// Build from the full URL form, extracting the short token
    pub fn from_full(full_id: &str) -> Result<Self> {
        let short_id = FULL_ID_PATTERN
            .captures(full_id)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::InvalidWorksheetId(full_id.to_string()))?;

        Ok(Self {
            full_id: Some(full_id.to_string()),
            short_id,
        })
    }

    /// Build from the bare short token
    pub fn from_short(short_id: &str) -> Result<Self> {
        if !SHORT_TOKEN.is_match(short_id) {
            return Err(Error::InvalidWorksheetId(short_id.to_string()));
        }
        Ok(Self {
            full_id: None,
            short_id: short_id.to_string(),
        })
    }

    /// Accept either form: URL-shaped input is treated as a full id.
    pub fn parse(input: &str) -> Result<Self> {
        if Self::is_full_id(input) {
            Self::from_full(input)
        } else {
            Self::from_short(input)
        }
    }

    /// Whether `input` looks like a full URL-form id
    pub fn is_full_id(input: &str) -> bool {
        FULL_ID_PATTERN.is_match(input)
    }

    /// The full URL form, if this id was built from one
    pub fn full_id(&self) -> Option<&str> {
        self.full_id.as_deref()
    }

    /// The short token used by the feed calls
    pub fn short_id(&self) -> &str {
        &self.short_id
    }
}

impl PartialEq for WorksheetId {
    fn eq(&self, other: &Self) -> bool {
        self.short_id == other.short_id
    }
}

impl PartialEq<str> for WorksheetId {
    fn eq(&self, other: &str) -> bool {
        self.short_id == other
    }
}

impl PartialEq<&str> for WorksheetId {
    fn eq(&self, other: &&str) -> bool {
        self.short_id == *other
    }
}

impl fmt::Display for WorksheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_id)
    }
}

impl FromStr for WorksheetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Key of a remote document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Parse a bare key or a document URL carrying `key=<key>`.
    ///
    /// A trailing `#gid=<digits>` fragment is stripped first.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = GID_SUFFIX.replace(input.trim(), "");

        let key = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            KEY_URL_PATTERN
                .captures(&trimmed)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| Error::InvalidDocumentKey(input.to_string()))?
        } else {
            trimmed.into_owned()
        };

        if key.is_empty() {
            return Err(Error::InvalidDocumentKey(input.to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DocumentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
