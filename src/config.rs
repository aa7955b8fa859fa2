//! Service configuration, read from an optional YAML file.
//!
//! ```yaml
//! bind: 0.0.0.0:3000
//! default_color: blue
//! fallback_color_column: Warna
//! circles:
//!   mode: concentric
//!   trigger_color: green
//!   radii_km: [1, 2, 3, 4]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::options::DEFAULT_MAX_FILTER_OPTIONS;
use crate::export::DEFAULT_EXPORT_COLOR_COLUMN;
use crate::map::{CircleRule, MarkerStyle};
use crate::palette::{Palette, DEFAULT_COLOR};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_FALLBACK_COLOR_COLUMN: &str = "Warna";
pub const DEFAULT_ASSETS_DIR: &str = "frontend/dist";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 4 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind: String,
    /// Served under `/assets` when the directory exists.
    pub assets_dir: PathBuf,
    pub palette: Palette,
    pub default_color: String,
    /// Per-row color column consulted when no assignment applies.
    pub fallback_color_column: String,
    /// Column appended to CSV exports.
    pub export_color_column: String,
    pub max_filter_options: usize,
    pub max_upload_bytes: usize,
    /// Idle sessions older than this are dropped.
    pub session_ttl_secs: u64,
    pub circles: CircleRule,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            palette: Palette::default(),
            default_color: DEFAULT_COLOR.to_string(),
            fallback_color_column: DEFAULT_FALLBACK_COLOR_COLUMN.to_string(),
            export_color_column: DEFAULT_EXPORT_COLOR_COLUMN.to_string(),
            max_filter_options: DEFAULT_MAX_FILTER_OPTIONS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            circles: CircleRule::default(),
        }
    }
}

impl AppConfig {
    /// Defaults when `path` is `None`, otherwise the file's settings over the
    /// defaults. The result is validated either way.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.palette.is_empty() {
            return Err(ConfigError::Invalid("palette must not be empty".to_string()));
        }
        if !self.palette.contains(&self.default_color) {
            return Err(ConfigError::Invalid(format!(
                "default_color '{}' is not in the palette",
                self.default_color
            )));
        }
        if self.export_color_column.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "export_color_column must not be empty".to_string(),
            ));
        }
        if let CircleRule::Concentric { radii_km, .. } = &self.circles {
            if radii_km.iter().any(|r| !r.is_finite() || *r <= 0.0) {
                return Err(ConfigError::Invalid(
                    "circles.radii_km must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn marker_style(&self) -> MarkerStyle<'_> {
        MarkerStyle {
            palette: &self.palette,
            default_color: &self.default_color,
            fallback_column: &self.fallback_color_column,
            circle_rule: &self.circles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_is_the_default_config() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.export_color_column, "Warna_Akhir");
        assert_eq!(config.max_filter_options, 100);
    }

    #[test]
    fn partial_yaml_overrides_selected_fields() {
        let config = AppConfig::from_yaml(
            "bind: 0.0.0.0:8080\nfallback_color_column: Color\ncircles:\n  mode: concentric\n  trigger_color: green\n  radii_km: [1, 2.5]\n",
        )
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.fallback_color_column, "Color");
        assert_eq!(config.default_color, "blue");
        assert_eq!(
            config.circles,
            CircleRule::Concentric {
                trigger_color: "green".into(),
                radii_km: vec![1.0, 2.5]
            }
        );
    }

    #[test]
    fn default_color_must_be_in_palette() {
        let config = AppConfig::from_yaml("palette: [red, green]\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_color 'blue'"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/geodash.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
