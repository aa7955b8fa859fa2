//! The "save progress" settings file: data rows, color assignments and
//! display options in one JSON document.
//!
//! Every field is optional on load; absent fields take the defaults below.
//! Older files name the color map `marker_colors`, newer ones
//! `kcp_custom_colors`; both are accepted and the latter is written.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::data::ingest::ColumnSelection;
use crate::data::table::Table;
use crate::resolve::ColorAssignment;

pub const DEFAULT_CIRCLE_RADIUS_KM: f64 = 1.0;
pub const DEFAULT_SHAPE_COLOR: &str = "red";
pub const DEFAULT_SHAPE_TARGET_COLOR: &str = "green";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse settings JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Circle and clustering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Kilometers.
    #[serde(default = "default_circle_radius")]
    pub circle_radius: f64,
    #[serde(default)]
    pub show_circle: bool,
    #[serde(default = "default_shape_color")]
    pub shape_color: String,
    #[serde(default = "default_shape_target_color")]
    pub shape_target_color: String,
    #[serde(default)]
    pub enable_cluster: bool,
}

fn default_circle_radius() -> f64 {
    DEFAULT_CIRCLE_RADIUS_KM
}

fn default_shape_color() -> String {
    DEFAULT_SHAPE_COLOR.to_string()
}

fn default_shape_target_color() -> String {
    DEFAULT_SHAPE_TARGET_COLOR.to_string()
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            circle_radius: DEFAULT_CIRCLE_RADIUS_KM,
            show_circle: false,
            shape_color: default_shape_color(),
            shape_target_color: default_shape_target_color(),
            enable_cluster: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
    #[serde(default, rename = "kcp_custom_colors", alias = "marker_colors")]
    pub colors: ColorAssignment,
    #[serde(flatten)]
    pub display: DisplaySettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_column: Option<String>,
}

impl SettingsFile {
    pub fn parse(raw: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(raw).map_err(SettingsError::Parse)
    }

    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(SettingsError::Serialize)
    }

    /// The saved rows as a table, columns in first-seen order.
    pub fn table(&self) -> Table {
        Table::from_json_rows(&self.data)
    }
}

/// The color assignment alone, as a flat `{value: color}` object.
pub fn colors_json(colors: &ColorAssignment) -> Result<String, SettingsError> {
    serde_json::to_string_pretty(colors).map_err(SettingsError::Serialize)
}
