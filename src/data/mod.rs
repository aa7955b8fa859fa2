//! Spreadsheet loading and the typed table model everything else reads.

pub mod coords;
pub mod ingest;
pub mod loader;
pub mod options;
pub mod table;
pub mod value;
