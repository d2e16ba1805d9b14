//! New row values on their way to the remote store
//!
//! Values arrive either positionally or keyed by header text / column key.
//! Inserts need them keyed by column key, cell writes need them by position,
//! so [`RowData`] carries both.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::error::{Error, Result};
use crate::row::CellInput;

/// Placeholder written where the store refuses an empty value
pub(crate) const BLANK_PLACEHOLDER: &str = " ";

/// Values for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowValues {
    /// Value `i` goes to column `i`
    Sequence(Vec<CellInput>),
    /// Values keyed by header text or column key; columns not named are
    /// cleared when the row is overwritten.
    Mapping(Vec<(String, CellInput)>),
}

impl RowValues {
    pub fn mapping<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<CellInput>,
        I: IntoIterator<Item = (K, V)>,
    {
        RowValues::Mapping(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<T: Into<CellInput>> From<Vec<T>> for RowValues {
    fn from(values: Vec<T>) -> Self {
        RowValues::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<CellInput>, const N: usize> From<[T; N]> for RowValues {
    fn from(values: [T; N]) -> Self {
        RowValues::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<CellInput>> From<BTreeMap<K, V>> for RowValues {
    fn from(values: BTreeMap<K, V>) -> Self {
        RowValues::mapping(values)
    }
}

impl<K: Into<String>, V: Into<CellInput>, S: BuildHasher> From<HashMap<K, V, S>> for RowValues {
    fn from(values: HashMap<K, V, S>) -> Self {
        RowValues::mapping(values)
    }
}

/// One value with its column position and, when the column has one, its key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDataVal {
    pub index: usize,
    pub text: String,
    pub key: Option<String>,
}

/// Row values resolved against a worksheet's headers and column keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowData {
    values: Vec<RowDataVal>,
}

impl RowData {
    /// Resolve `values` against header texts and column keys.
    ///
    /// A mapping covers at least every header column; names must match a
    /// header text or a column key.
    pub fn new<H: AsRef<str>>(headers: &[H], keys: &[String], values: RowValues) -> Result<Self> {
        let texts: Vec<(usize, String)> = match values {
            RowValues::Sequence(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i, v.into_string()))
                .collect(),
            RowValues::Mapping(pairs) => {
                let mut texts = vec![String::new(); headers.len()];
                for (name, value) in pairs {
                    let index = headers
                        .iter()
                        .position(|h| h.as_ref() == name)
                        .or_else(|| keys.iter().position(|k| *k == name))
                        .ok_or_else(|| Error::UnknownColumn(name.clone()))?;
                    if texts.len() <= index {
                        texts.resize(index + 1, String::new());
                    }
                    texts[index] = value.into_string();
                }
                texts.into_iter().enumerate().collect()
            }
        };

        let values = texts
            .into_iter()
            .map(|(index, text)| RowDataVal {
                index,
                text,
                key: keys.get(index).cloned(),
            })
            .collect();
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RowDataVal> {
        self.values.iter()
    }

    /// Text for a column, empty when not given
    pub fn text_at(&self, index: usize) -> &str {
        self.values.get(index).map_or("", |v| v.text.as_str())
    }

    /// Whether every value is empty
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.text.is_empty())
    }

    /// Key/value pairs for an insert. The store refuses an insert without a
    /// non-empty value, so when no keyed value is left the payload is a
    /// single placeholder in the first column.
    pub fn insert_values(&self, keys: &[String]) -> InsertPayload {
        let values: Vec<(String, String)> = self
            .values
            .iter()
            .filter(|v| !v.text.is_empty())
            .filter_map(|v| v.key.clone().map(|k| (k, v.text.clone())))
            .collect();

        match keys.first() {
            Some(first) if values.is_empty() => InsertPayload {
                values: vec![(first.clone(), BLANK_PLACEHOLDER.to_string())],
                placeholder: true,
            },
            _ => InsertPayload {
                values,
                placeholder: false,
            },
        }
    }
}

/// Values sent with an insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPayload {
    pub values: Vec<(String, String)>,
    /// The first column carries a placeholder that must be cleared once the
    /// insert succeeded
    pub placeholder: bool,
}

impl<'a> IntoIterator for &'a RowData {
    type Item = &'a RowDataVal;
    type IntoIter = std::slice::Iter<'a, RowDataVal>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
