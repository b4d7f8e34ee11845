//! Clipboard table decoding.
//!
//! The target application has no export API; it writes tab/newline-delimited
//! text to the system clipboard. The first line is the header row, every
//! later line a data row zipped positionally against the headers.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

/// One decoded row: column header to cell value, insertion order of columns
/// preserved. A column can carry no value (its control was unreadable); it
/// still appears, serialized as `null`. Produced fresh per extraction and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRecord {
    fields: Vec<(String, Option<String>)>,
}

impl TableRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.fields.push((header.into(), Some(value.into())));
    }

    pub(crate) fn push_missing(&mut self, header: impl Into<String>) {
        self.fields.push((header.into(), None));
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(h, v)| (h.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for TableRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (header, value) in &self.fields {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}

/// Decode a clipboard payload into ordered records.
///
/// A row whose field count does not match the header count is dropped
/// silently: partial or corrupted rows are not worth failing the whole
/// query. Empty or header-only input yields an empty vector, not an error.
pub fn decode(raw: &str) -> Vec<TableRecord> {
    let mut lines = raw.lines();
    let headers: Vec<&str> = match lines.next() {
        Some(line) if !line.is_empty() => line.split('\t').collect(),
        _ => return Vec::new(),
    };

    let mut records = Vec::new();
    for line in lines {
        let values: Vec<&str> = line.split('\t').collect();
        if values.len() != headers.len() {
            debug!(
                expected = headers.len(),
                got = values.len(),
                "dropping clipboard row with mismatched field count"
            );
            continue;
        }
        let mut record = TableRecord::new();
        for (header, value) in headers.iter().zip(values) {
            record.push(*header, value);
        }
        records.push(record);
    }
    records
}
