use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::table::{Record, Schema};
use crate::data::value::Scalar;
use crate::palette::Palette;

/// User-chosen colors keyed by a reference column value.
///
/// Entries are not checked against the palette here; an entry naming an
/// unknown color resolves to the default color instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorAssignment {
    colors: BTreeMap<String, String>,
}

impl ColorAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, value: impl Into<String>, color: impl Into<String>) {
        self.colors.insert(value.into(), color.into());
    }

    pub fn reset(&mut self) {
        self.colors.clear();
    }

    pub fn get(&self, value: &str) -> Option<&str> {
        self.colors.get(value).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.colors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColorAssignment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut assignment = Self::new();
        for (value, color) in iter {
            assignment.assign(value, color);
        }
        assignment
    }
}

/// Inserts or overwrites `value -> color`.
pub fn assign_color(assignment: &mut ColorAssignment, value: &Scalar, color: &str) {
    if let Some(key) = value.key() {
        assignment.assign(key, color);
    }
}

pub fn reset_colors(assignment: &mut ColorAssignment) {
    assignment.reset();
}

/// Color resolution with column names already resolved against a schema.
///
/// Precedence, first hit wins: the assignment entry for the record's
/// reference value, then the record's own fallback color cell, then the
/// default. A candidate outside the palette is replaced by the default.
#[derive(Debug, Clone, Copy)]
pub struct ColorResolver<'a> {
    reference: Option<usize>,
    fallback: Option<usize>,
    assignment: &'a ColorAssignment,
    palette: &'a Palette,
    default_color: &'a str,
}

impl<'a> ColorResolver<'a> {
    /// `default_color` is expected to be a palette member; it is returned
    /// as-is.
    pub fn new(
        schema: &Schema,
        reference_column: Option<&str>,
        fallback_column: &str,
        assignment: &'a ColorAssignment,
        palette: &'a Palette,
        default_color: &'a str,
    ) -> Self {
        Self {
            reference: reference_column.and_then(|column| schema.position(column)),
            fallback: schema.position(fallback_column),
            assignment,
            palette,
            default_color,
        }
    }

    pub fn resolve(&self, record: &Record) -> &'a str {
        match self.candidate(record) {
            Some(candidate) => self.palette.get(&candidate).unwrap_or(self.default_color),
            None => self.default_color,
        }
    }

    fn candidate(&self, record: &Record) -> Option<String> {
        let assigned = self
            .reference
            .and_then(|pos| record.get(pos))
            .and_then(Scalar::key)
            .and_then(|key| self.assignment.get(&key).map(str::to_string));
        if assigned.is_some() {
            return assigned;
        }
        self.fallback
            .and_then(|pos| record.get(pos))
            .and_then(Scalar::key)
    }
}

/// Resolves one record's display color; see [`ColorResolver`] for the rules.
pub fn resolve_color<'a>(
    schema: &Schema,
    record: &Record,
    reference_column: Option<&str>,
    assignment: &'a ColorAssignment,
    fallback_column: &str,
    palette: &'a Palette,
    default_color: &'a str,
) -> &'a str {
    ColorResolver::new(
        schema,
        reference_column,
        fallback_column,
        assignment,
        palette,
        default_color,
    )
    .resolve(record)
}
