//! Column selection: turns a loaded [`Table`] into located records once the
//! latitude, longitude and name columns have been chosen.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::coords::{coerce_coordinate, in_range};
use super::table::{Record, Schema, Table};
use super::value::Scalar;

/// The three columns a user must pick before anything is mapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ColumnSelection {
    pub fn new(latitude: &str, longitude: &str, name: &str) -> Self {
        Self {
            latitude: Some(latitude.to_string()),
            longitude: Some(longitude.to_string()),
            name: Some(name.to_string()),
        }
    }

    /// Field names still unset (blank counts as unset).
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("latitude", &self.latitude),
            ("longitude", &self.longitude),
            ("name", &self.name),
        ]
        .into_iter()
        .filter(|(_, column)| column.as_deref().map_or(true, |c| c.trim().is_empty()))
        .map(|(field, _)| field)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("select the {} column(s) first", .missing.join(", "))]
    MissingSelection { missing: Vec<&'static str> },
    #[error("{field} column '{column}' does not exist")]
    UnknownColumn { field: &'static str, column: String },
}

/// Column positions validated against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColumns {
    pub latitude: usize,
    pub longitude: usize,
    pub name: usize,
}

impl SelectedColumns {
    pub fn resolve(schema: &Schema, selection: &ColumnSelection) -> Result<Self, IngestError> {
        let missing = selection.missing();
        if !missing.is_empty() {
            return Err(IngestError::MissingSelection { missing });
        }
        let position = |field: &'static str, column: &Option<String>| {
            let column = column.as_deref().unwrap_or_default().trim();
            schema.position(column).ok_or_else(|| IngestError::UnknownColumn {
                field,
                column: column.to_string(),
            })
        };
        Ok(Self {
            latitude: position("latitude", &selection.latitude)?,
            longitude: position("longitude", &selection.longitude)?,
            name: position("name", &selection.name)?,
        })
    }

    pub fn contains(&self, position: usize) -> bool {
        position == self.latitude || position == self.longitude || position == self.name
    }
}

/// A record with its cleaned coordinates and display name.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRecord {
    pub record: Record,
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
}

impl AsRef<Record> for GeoRecord {
    fn as_ref(&self) -> &Record {
        &self.record
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
    pub out_of_range_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoTable {
    schema: Schema,
    columns: SelectedColumns,
    records: Vec<GeoRecord>,
    report: IngestReport,
}

impl GeoTable {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &SelectedColumns {
        &self.columns
    }

    pub fn records(&self) -> &[GeoRecord] {
        &self.records
    }

    pub fn report(&self) -> IngestReport {
        self.report
    }
}

/// Validates the selection and coerces coordinates. Rows whose latitude or
/// longitude does not coerce to a number are dropped; rows outside the valid
/// coordinate range are kept and counted.
pub fn locate(table: &Table, selection: &ColumnSelection) -> Result<GeoTable, IngestError> {
    let columns = SelectedColumns::resolve(table.schema(), selection)?;

    let mut report = IngestReport {
        total_rows: table.len(),
        ..IngestReport::default()
    };
    let mut records = Vec::with_capacity(table.len());
    for record in table.records() {
        let latitude = record.get(columns.latitude).and_then(coerce_coordinate);
        let longitude = record.get(columns.longitude).and_then(coerce_coordinate);
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            report.dropped_rows += 1;
            continue;
        };
        if !in_range(latitude, longitude) {
            report.out_of_range_rows += 1;
        }
        let name = record
            .get(columns.name)
            .map(Scalar::to_string)
            .unwrap_or_default();
        records.push(GeoRecord {
            record: record.clone(),
            latitude,
            longitude,
            name,
        });
    }
    report.kept_rows = records.len();

    if report.dropped_rows > 0 {
        debug!(dropped = report.dropped_rows, "rows without usable coordinates dropped");
    }
    if report.out_of_range_rows > 0 {
        warn!(rows = report.out_of_range_rows, "coordinates outside valid range");
    }

    Ok(GeoTable {
        schema: table.schema().clone(),
        columns,
        records,
        report,
    })
}
