//! Row encoding.
//!
//! Rows serialize straight from the driver result; values keep their JSON
//! types (numbers stay numbers, NULL is `null`) and an empty result is `[]`.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::pg::{PgValue, QueryResult};

/// Output shape selected by the caller's format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    /// One object per row, column name to value, in column order.
    Named,
    /// One array per row, values in column order.
    Positional,
}

impl RowFormat {
    /// `json` (any case) selects named rows; anything else is positional.
    pub fn from_flag(flag: &str) -> Self {
        if flag.eq_ignore_ascii_case("json") {
            RowFormat::Named
        } else {
            RowFormat::Positional
        }
    }
}

pub struct NamedRows<'a>(pub &'a QueryResult);

pub struct PositionalRows<'a>(pub &'a QueryResult);

struct NamedRow<'a> {
    /// Column name for each value, `None` where a later column reuses it
    keys: &'a [Option<&'a str>],
    values: &'a [PgValue],
}

impl Serialize for NamedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.keys.iter().flatten().count();
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in self.keys.iter().zip(self.values) {
            if let Some(name) = key {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

/// Keys for a named row. A repeated column name keeps only its last
/// occurrence, so every object has unique keys.
fn named_keys(result: &QueryResult) -> Vec<Option<&str>> {
    let names: Vec<&str> = result.column_names().collect();
    names
        .iter()
        .enumerate()
        .map(|(i, name)| (!names[i + 1..].contains(name)).then_some(*name))
        .collect()
}

impl Serialize for NamedRows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let keys = named_keys(self.0);
        let mut seq = serializer.serialize_seq(Some(self.0.rows.len()))?;
        for row in &self.0.rows {
            seq.serialize_element(&NamedRow {
                keys: &keys,
                values: row.as_slice(),
            })?;
        }
        seq.end()
    }
}

impl Serialize for PositionalRows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.rows.len()))?;
        for row in &self.0.rows {
            seq.serialize_element(row.as_slice())?;
        }
        seq.end()
    }
}

pub fn encode_rows(result: &QueryResult, format: RowFormat) -> serde_json::Result<String> {
    match format {
        RowFormat::Named => serde_json::to_string(&NamedRows(result)),
        RowFormat::Positional => serde_json::to_string(&PositionalRows(result)),
    }
}
