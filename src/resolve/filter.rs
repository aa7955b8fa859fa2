use std::collections::{BTreeMap, BTreeSet};
use std::slice;

use serde::{Deserialize, Serialize};

use crate::data::table::{Record, Schema};
use crate::data::value::Scalar;

/// Per-column allow-lists. A column absent from the set is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    columns: BTreeMap<String, BTreeSet<String>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrains `column` to `values`. An empty selection removes the
    /// constraint, the way an untouched multiselect does.
    pub fn allow<I>(&mut self, column: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = Scalar>,
    {
        let column = column.into();
        let allowed: BTreeSet<String> = values.into_iter().filter_map(|v| v.key()).collect();
        if allowed.is_empty() {
            self.columns.remove(&column);
        } else {
            self.columns.insert(column, allowed);
        }
    }

    pub fn remove(&mut self, column: &str) {
        self.columns.remove(column);
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn allowed(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.columns.get(column)
    }

    /// Resolves column names against `schema`. Constraints on columns the
    /// schema lacks are kept and reject every record.
    pub fn compile(&self, schema: &Schema) -> CompiledFilter<'_> {
        CompiledFilter {
            constraints: self
                .columns
                .iter()
                .map(|(column, allowed)| (schema.position(column), allowed))
                .collect(),
        }
    }
}

impl FromIterator<(String, Vec<Scalar>)> for FilterSet {
    fn from_iter<T: IntoIterator<Item = (String, Vec<Scalar>)>>(iter: T) -> Self {
        let mut filters = Self::new();
        for (column, values) in iter {
            filters.allow(column, values);
        }
        filters
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFilter<'a> {
    constraints: Vec<(Option<usize>, &'a BTreeSet<String>)>,
}

impl<'a> CompiledFilter<'a> {
    pub fn matches(&self, record: &Record) -> bool {
        self.constraints.iter().all(|(position, allowed)| {
            position
                .and_then(|pos| record.get(pos))
                .and_then(Scalar::key)
                .is_some_and(|key| allowed.contains(&key))
        })
    }
}

pub fn matches_filters(schema: &Schema, record: &Record, filters: &FilterSet) -> bool {
    filters.compile(schema).matches(record)
}

/// Lazily yields the records `filter` accepts, in their original order.
/// The iterator is `Clone`, so a pass can be restarted from any point.
pub fn apply_filters<'a, R: AsRef<Record>>(
    records: &'a [R],
    filter: &'a CompiledFilter<'a>,
) -> Filtered<'a, R> {
    Filtered {
        records: records.iter(),
        filter,
    }
}

pub struct Filtered<'a, R> {
    records: slice::Iter<'a, R>,
    filter: &'a CompiledFilter<'a>,
}

impl<R> Clone for Filtered<'_, R> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            filter: self.filter,
        }
    }
}

impl<'a, R: AsRef<Record>> Iterator for Filtered<'a, R> {
    type Item = &'a R;

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter;
        self.records.find(|record| filter.matches((*record).as_ref()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.records.size_hint().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Table;

    fn table() -> Table {
        Table::new(
            Schema::new(["Nama", "Cabang", "Kelas"]),
            vec![
                vec!["a".into(), "Jakarta".into(), 1.0.into()],
                vec!["b".into(), "Bandung".into(), 2.0.into()],
                vec!["c".into(), "Jakarta".into(), 2.0.into()],
                vec!["d".into(), Scalar::Missing, 1.0.into()],
                vec!["e".into(), "Surabaya".into(), 3.0.into()],
            ],
        )
    }

    fn names<'a>(records: impl Iterator<Item = &'a Record>, table: &Table) -> Vec<String> {
        records
            .map(|r| table.value(r, "Nama").map(ToString::to_string).unwrap_or_default())
            .collect()
    }

    #[test]
    fn empty_filter_set_matches_everything() {
        let table = table();
        let filters = FilterSet::new();
        assert!(table
            .records()
            .iter()
            .all(|r| matches_filters(table.schema(), r, &filters)));
    }

    #[test]
    fn every_constraint_must_hold() {
        let table = table();
        let filters: FilterSet = [
            ("Cabang".to_string(), vec!["Jakarta".into(), "Bandung".into()]),
            ("Kelas".to_string(), vec![2.0.into()]),
        ]
        .into_iter()
        .collect();
        let compiled = filters.compile(table.schema());
        assert_eq!(
            names(apply_filters(table.records(), &compiled), &table),
            vec!["b", "c"]
        );
    }

    #[test]
    fn missing_values_and_unknown_columns_never_match() {
        let table = table();
        let mut filters = FilterSet::new();
        filters.allow("Cabang", vec!["Jakarta".into()]);
        assert!(!matches_filters(table.schema(), &table.records()[3], &filters));

        let mut unknown = FilterSet::new();
        unknown.allow("Wilayah", vec!["Barat".into()]);
        let compiled = unknown.compile(table.schema());
        assert_eq!(apply_filters(table.records(), &compiled).count(), 0);
    }

    #[test]
    fn empty_selection_lifts_the_constraint() {
        let mut filters = FilterSet::new();
        filters.allow("Cabang", vec!["Jakarta".into()]);
        filters.allow("Cabang", Vec::new());
        assert!(filters.is_empty());
    }

    #[test]
    fn filtering_is_idempotent_and_restartable() {
        let table = table();
        let mut filters = FilterSet::new();
        filters.allow("Kelas", vec![1.0.into(), 3.0.into()]);
        let compiled = filters.compile(table.schema());

        let pass = apply_filters(table.records(), &compiled);
        let first: Vec<Record> = pass.clone().cloned().collect();
        let again: Vec<Record> = pass.cloned().collect();
        assert_eq!(first, again);

        let refiltered: Vec<Record> = apply_filters(first.as_slice(), &compiled).cloned().collect();
        assert_eq!(refiltered, first);
        assert_eq!(names(first.iter(), &table), vec!["a", "d", "e"]);
    }
}
