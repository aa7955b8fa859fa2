//! Typed tables: a schema of trimmed column names plus positional records.
//!
//! Column names are resolved to positions once through [`Schema::position`];
//! the resolver and filter passes work on positions only.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::value::Scalar;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Builds a schema from raw header cells. Names are whitespace-trimmed;
    /// blank headers become `Unnamed: N` and repeated names get a `.N`
    /// suffix so every column stays addressable.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut schema = Self::default();
        for (position, raw) in headers.into_iter().enumerate() {
            let trimmed = raw.as_ref().trim();
            let base = if trimmed.is_empty() {
                format!("Unnamed: {position}")
            } else {
                trimmed.to_string()
            };
            let mut name = base.clone();
            let mut suffix = 1;
            while schema.index.contains_key(&name) {
                name = format!("{base}.{suffix}");
                suffix += 1;
            }
            schema.index.insert(name.clone(), schema.columns.len());
            schema.columns.push(name);
        }
        schema
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One row, positionally aligned with its table's [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Scalar>,
}

impl Record {
    pub fn new(values: Vec<Scalar>) -> Self {
        Self { values }
    }

    pub fn get(&self, position: usize) -> Option<&Scalar> {
        self.values.get(position)
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }
}

impl AsRef<Record> for Record {
    fn as_ref(&self) -> &Record {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    schema: Schema,
    records: Vec<Record>,
}

impl Table {
    /// Rows shorter than the header are padded with [`Scalar::Missing`];
    /// longer rows are cut to the header width.
    pub fn new(schema: Schema, rows: Vec<Vec<Scalar>>) -> Self {
        let width = schema.len();
        let records = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Scalar::Missing);
                Record::new(row)
            })
            .collect();
        Self { schema, records }
    }

    /// Builds a table from row objects (the `data` array of a settings file).
    /// Columns appear in first-seen order; keys absent from a row are missing.
    pub fn from_json_rows(rows: &[Map<String, Value>]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
        let values = rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|h| row.get(h).cloned().map_or(Scalar::Missing, Scalar::from))
                    .collect()
            })
            .collect();
        Self::new(Schema::new(&headers), values)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a cell by column name. `None` when the column is unknown.
    pub fn value<'a>(&self, record: &'a Record, column: &str) -> Option<&'a Scalar> {
        self.schema.position(column).and_then(|pos| record.get(pos))
    }

    /// Serialises one record as a JSON object in schema order.
    pub fn record_to_json(&self, record: &Record) -> Map<String, Value> {
        self.schema
            .columns()
            .iter()
            .zip(record.values())
            .map(|(column, value)| (column.clone(), Value::from(value.clone())))
            .collect()
    }
}
