//! Export of the filtered records with their resolved colors, as CSV or as
//! a single-sheet `.xlsx` workbook.

use std::io::Write;
use std::string::FromUtf8Error;

use thiserror::Error;

use crate::data::ingest::GeoTable;
use crate::data::value::Scalar;
use crate::map::{MarkerStyle, Selections};
use crate::resolve::{apply_filters, ColorResolver};

mod workbook;

pub use workbook::SheetWriter;

pub const DEFAULT_EXPORT_COLOR_COLUMN: &str = "Warna_Akhir";

/// Worksheet name of exported workbooks.
pub const EXPORT_SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to pack xlsx workbook: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("csv output is not utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// Feeds `emit` the header and then every filtered record in its original
/// column order plus `color_column` holding the record's resolved color.
/// When the table already has a column of that name it is overwritten in
/// place.
///
/// Returns the number of data rows emitted.
fn visit_colored_rows<F>(
    table: &GeoTable,
    selections: Selections<'_>,
    style: MarkerStyle<'_>,
    color_column: &str,
    mut emit: F,
) -> Result<usize, ExportError>
where
    F: FnMut(&[Scalar]) -> Result<(), ExportError>,
{
    let schema = table.schema();
    let existing = schema.position(color_column);
    let compiled = selections.filters.compile(schema);
    let resolver = ColorResolver::new(
        schema,
        selections.reference_column,
        style.fallback_column,
        selections.colors,
        style.palette,
        style.default_color,
    );

    let mut header: Vec<Scalar> = schema.columns().iter().map(|c| Scalar::from(c.as_str())).collect();
    if existing.is_none() {
        header.push(Scalar::from(color_column));
    }
    emit(&header)?;

    let mut rows = 0;
    for located in apply_filters(table.records(), &compiled) {
        let color = Scalar::from(resolver.resolve(&located.record));
        let mut fields = located.record.values().to_vec();
        match existing {
            Some(position) => fields[position] = color,
            None => fields.push(color),
        }
        emit(&fields)?;
        rows += 1;
    }
    Ok(rows)
}

/// Writes the colored export as CSV. Returns the number of data rows.
pub fn write_colored_csv<W: Write>(
    writer: W,
    table: &GeoTable,
    selections: Selections<'_>,
    style: MarkerStyle<'_>,
    color_column: &str,
) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    let rows = visit_colored_rows(table, selections, style, color_column, |fields| {
        csv.write_record(fields.iter().map(ToString::to_string))?;
        Ok(())
    })?;
    csv.flush()?;
    Ok(rows)
}

pub fn colored_csv_string(
    table: &GeoTable,
    selections: Selections<'_>,
    style: MarkerStyle<'_>,
    color_column: &str,
) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_colored_csv(&mut buffer, table, selections, style, color_column)?;
    Ok(String::from_utf8(buffer)?)
}

/// Builds the colored export as an `.xlsx` workbook. Returns the workbook
/// bytes and the number of data rows.
pub fn colored_xlsx(
    table: &GeoTable,
    selections: Selections<'_>,
    style: MarkerStyle<'_>,
    color_column: &str,
) -> Result<(Vec<u8>, usize), ExportError> {
    let mut sheet = SheetWriter::new();
    let rows = visit_colored_rows(table, selections, style, color_column, |fields| {
        sheet.push_row(fields);
        Ok(())
    })?;
    Ok((sheet.finish(EXPORT_SHEET_NAME)?, rows))
}
