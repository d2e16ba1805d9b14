//! Column keys derived from header text
//!
//! The list feed addresses cells by a column key rather than by position.
//! Keys are derived from the header row: every character that is not an
//! ASCII letter, digit or hyphen is dropped, repeated keys get `_2`, `_3`,
//! ... appended, and columns without usable header text fall back to a
//! fixed placeholder per column position.

use ahash::AHashMap;

/// Placeholder keys the remote service assigns to columns with blank headers,
/// in column order.
pub const SERVICE_FALLBACK_KEYS: [&str; 29] = [
    "_cn6ca", "_cokwr", "_cpzh4", "_cre1l", "_chk2m", "_ciyn3", "_ckd7g", "_clrrx", "_cyevm",
    "_cztg3", "_d180g", "_d2mkx", "_cssly", "_cu76f", "_cvlqs", "_cx0b9", "_d9ney", "_db1zf",
    "_dcgjs", "_ddv49", "_d415a", "_d5fpr", "_d6ua4", "_d88ul", "_dkvya", "_dmair", "_dnp34",
    "_dp3nl", "_df9om",
];

/// Minimum number of column keys produced for any header row
pub const FALLBACK_SLOTS: usize = SERVICE_FALLBACK_KEYS.len();

/// How columns without usable header text are keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FallbackKeys {
    /// The service's own placeholder table, needed to address blank-header
    /// columns through the list feed. Columns past the table use `_col<n>`.
    #[default]
    Service,
    /// `_col1`, `_col2`, ... for every blank-header column
    Synthetic,
}

impl FallbackKeys {
    /// Placeholder key for the column at `index` (0-based)
    pub fn key(&self, index: usize) -> String {
        match self {
            FallbackKeys::Service if index < SERVICE_FALLBACK_KEYS.len() => {
                SERVICE_FALLBACK_KEYS[index].to_string()
            }
            _ => format!("_col{}", index + 1),
        }
    }
}

/// Derives one unique key per column from header text
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnTagger {
    fallback: FallbackKeys,
}

impl ColumnTagger {
    /// Create a tagger with the given fallback scheme
    pub fn new(fallback: FallbackKeys) -> Self {
        Self { fallback }
    }

    /// The fallback scheme in use
    pub fn fallback(&self) -> FallbackKeys {
        self.fallback
    }

    /// Keys for `headers`, producing at least [`FALLBACK_SLOTS`] keys.
    pub fn tag<S: AsRef<str>>(&self, headers: &[S]) -> Vec<String> {
        self.tag_slots(headers, FALLBACK_SLOTS)
    }

    /// Keys for `headers`, producing `max(headers.len(), min_slots)` keys.
    pub fn tag_slots<S: AsRef<str>>(&self, headers: &[S], min_slots: usize) -> Vec<String> {
        let slots = headers.len().max(min_slots);
        let mut seen: AHashMap<String, usize> = AHashMap::new();

        (0..slots)
            .map(|i| {
                let candidate = headers
                    .get(i)
                    .map(|h| normalize_header(h.as_ref()))
                    .filter(|k| !k.is_empty());

                match candidate {
                    Some(key) => {
                        let count = seen.entry(key.clone()).or_insert(0);
                        *count += 1;
                        if *count > 1 {
                            format!("{}_{}", key, count)
                        } else {
                            key
                        }
                    }
                    None => self.fallback.key(i),
                }
            })
            .collect()
    }
}

/// Strip everything but ASCII letters, digits and hyphens. Case is kept.
pub fn normalize_header(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}
