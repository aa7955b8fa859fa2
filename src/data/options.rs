//! Distinct-value listings used to populate filter and color pickers.

use std::collections::HashSet;

use serde::Serialize;

use super::ingest::GeoTable;
use super::table::{Record, Schema};
use super::value::Scalar;

/// Columns with fewer distinct values than this get a filter.
pub const DEFAULT_MAX_FILTER_OPTIONS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub column: String,
    pub options: Vec<Scalar>,
}

/// Sorted distinct non-missing values of one column.
pub fn distinct_values<'a, R, I>(records: I, position: usize) -> Vec<Scalar>
where
    R: AsRef<Record> + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut seen = HashSet::new();
    let mut values: Vec<Scalar> = Vec::new();
    for record in records {
        let Some(value) = record.as_ref().get(position) else {
            continue;
        };
        if value.is_missing() || !seen.insert(value.to_string()) {
            continue;
        }
        values.push(value.clone());
    }
    values.sort_by(Scalar::display_cmp);
    values
}

/// One entry per filterable column: every column except the three selected
/// ones whose distinct value count is below `max_options`.
pub fn filter_options(table: &GeoTable, max_options: usize) -> Vec<FilterOptions> {
    let schema: &Schema = table.schema();
    schema
        .columns()
        .iter()
        .enumerate()
        .filter(|(position, _)| !table.columns().contains(*position))
        .filter_map(|(position, column)| {
            let options = distinct_values(table.records(), position);
            (options.len() < max_options).then(|| FilterOptions {
                column: column.clone(),
                options,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ingest::{locate, ColumnSelection};
    use crate::data::table::Table;

    fn table(rows: Vec<Vec<Scalar>>) -> GeoTable {
        let table = Table::new(Schema::new(["Lat", "Lon", "Nama", "Cabang", "Id"]), rows);
        locate(&table, &ColumnSelection::new("Lat", "Lon", "Nama")).unwrap()
    }

    #[test]
    fn distinct_values_skip_missing_and_sort() {
        let geo = table(vec![
            vec![1.0.into(), 1.0.into(), "a".into(), "B".into(), 1.0.into()],
            vec![1.0.into(), 1.0.into(), "b".into(), Scalar::Missing, 2.0.into()],
            vec![1.0.into(), 1.0.into(), "c".into(), "A".into(), 3.0.into()],
            vec![1.0.into(), 1.0.into(), "d".into(), "B".into(), 4.0.into()],
        ]);
        assert_eq!(
            distinct_values(geo.records(), 3),
            vec![Scalar::Text("A".into()), Scalar::Text("B".into())]
        );
    }

    #[test]
    fn selected_and_high_cardinality_columns_get_no_filter() {
        let geo = table(vec![
            vec![1.0.into(), 1.0.into(), "a".into(), "B".into(), 1.0.into()],
            vec![1.0.into(), 1.0.into(), "b".into(), "A".into(), 2.0.into()],
            vec![1.0.into(), 1.0.into(), "c".into(), "A".into(), 3.0.into()],
        ]);
        let options = filter_options(&geo, 3);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].column, "Cabang");
    }
}
