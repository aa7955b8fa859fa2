//! Radius circles drawn around selected markers.

use serde::{Deserialize, Serialize};

use crate::settings::DisplaySettings;

pub const CIRCLE_FILL_OPACITY: f64 = 0.2;

/// Which markers get circles, and how many.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CircleRule {
    #[default]
    /// One circle of the user's radius around markers whose resolved color
    /// equals `shape_target_color`.
    Target,
    /// A fixed ring of radii around markers whose resolved color equals
    /// `trigger_color`. The user's radius is ignored.
    Concentric {
        trigger_color: String,
        radii_km: Vec<f64>,
    },
}

impl CircleRule {
    pub fn concentric_default() -> Self {
        Self::Concentric {
            trigger_color: "green".to_string(),
            radii_km: vec![1.0, 2.0, 3.0, 4.0],
        }
    }

    /// Circles for one marker, outermost first. Empty unless circles are
    /// switched on and the marker's color triggers the rule.
    pub fn circles_for(
        &self,
        display: &DisplaySettings,
        marker_color: &str,
        latitude: f64,
        longitude: f64,
    ) -> Vec<Circle> {
        if !display.show_circle {
            return Vec::new();
        }
        let mut radii_km: Vec<f64> = match self {
            Self::Target if marker_color == display.shape_target_color => {
                vec![display.circle_radius]
            }
            Self::Concentric {
                trigger_color,
                radii_km,
            } if marker_color == trigger_color.as_str() => radii_km.clone(),
            _ => return Vec::new(),
        };
        radii_km.retain(|r| r.is_finite() && *r > 0.0);
        radii_km.sort_by(|a, b| b.total_cmp(a));
        radii_km
            .into_iter()
            .map(|radius_km| Circle {
                latitude,
                longitude,
                radius_m: radius_km * 1000.0,
                color: display.shape_color.clone(),
                fill_opacity: CIRCLE_FILL_OPACITY,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circle {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    pub color: String,
    pub fill_opacity: f64,
}
