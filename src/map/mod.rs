//! Map view construction: one pass over the filtered records producing
//! colored markers, radius circles and the view center.
//!
//! Drawing is left to the browser's mapping library; this module only
//! decides what to draw.

pub mod circles;

use serde::Serialize;
use serde_json::{json, Value};

use crate::data::ingest::GeoTable;
use crate::palette::Palette;
use crate::resolve::{apply_filters, ColorAssignment, ColorResolver, FilterSet};
use crate::settings::DisplaySettings;

pub use circles::{Circle, CircleRule};

pub const DEFAULT_ZOOM: u8 = 6;

/// The color rules that do not change per session.
#[derive(Debug, Clone, Copy)]
pub struct MarkerStyle<'a> {
    pub palette: &'a Palette,
    pub default_color: &'a str,
    pub fallback_column: &'a str,
    pub circle_rule: &'a CircleRule,
}

/// Per-session choices that feed a pass.
#[derive(Debug, Clone, Copy)]
pub struct Selections<'a> {
    pub filters: &'a FilterSet,
    pub colors: &'a ColorAssignment,
    pub reference_column: Option<&'a str>,
    pub display: &'a DisplaySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    /// `[latitude, longitude]` mean of the markers; `None` with no markers.
    pub center: Option<[f64; 2]>,
    pub zoom: u8,
    pub cluster: bool,
    pub markers: Vec<Marker>,
    pub circles: Vec<Circle>,
}

pub fn build_map(table: &GeoTable, selections: Selections<'_>, style: MarkerStyle<'_>) -> MapView {
    let compiled = selections.filters.compile(table.schema());
    let resolver = ColorResolver::new(
        table.schema(),
        selections.reference_column,
        style.fallback_column,
        selections.colors,
        style.palette,
        style.default_color,
    );

    let mut markers = Vec::new();
    let mut circles = Vec::new();
    for located in apply_filters(table.records(), &compiled) {
        let color = resolver.resolve(&located.record);
        circles.extend(style.circle_rule.circles_for(
            selections.display,
            color,
            located.latitude,
            located.longitude,
        ));
        markers.push(Marker {
            latitude: located.latitude,
            longitude: located.longitude,
            name: located.name.clone(),
            color: color.to_string(),
        });
    }

    MapView {
        center: mean_center(&markers),
        zoom: DEFAULT_ZOOM,
        cluster: selections.display.enable_cluster,
        markers,
        circles,
    }
}

fn mean_center(markers: &[Marker]) -> Option<[f64; 2]> {
    if markers.is_empty() {
        return None;
    }
    let n = markers.len() as f64;
    let (lat, lon) = markers
        .iter()
        .fold((0.0, 0.0), |(lat, lon), m| (lat + m.latitude, lon + m.longitude));
    Some([lat / n, lon / n])
}

impl MapView {
    /// GeoJSON `FeatureCollection`: markers and circle centers as `Point`
    /// features, told apart by the `kind` property.
    pub fn to_geojson(&self) -> Value {
        let markers = self.markers.iter().map(|m| {
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [m.longitude, m.latitude] },
                "properties": { "kind": "marker", "name": m.name, "color": m.color },
            })
        });
        let circles = self.circles.iter().map(|c| {
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [c.longitude, c.latitude] },
                "properties": {
                    "kind": "circle",
                    "radius_m": c.radius_m,
                    "color": c.color,
                    "fill_opacity": c.fill_opacity,
                },
            })
        });
        json!({
            "type": "FeatureCollection",
            "features": markers.chain(circles).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ingest::{locate, ColumnSelection};
    use crate::data::table::{Schema, Table};
    use crate::data::value::Scalar;
    use crate::palette::DEFAULT_COLOR;

    fn geo() -> GeoTable {
        let table = Table::new(
            Schema::new(["Lat", "Lon", "Nama", "Cabang", "Warna"]),
            vec![
                vec![(-6.0).into(), 106.0.into(), "A".into(), "Jakarta".into(), Scalar::Missing],
                vec![(-8.0).into(), 110.0.into(), "B".into(), "Bandung".into(), "green".into()],
                vec![(-7.0).into(), 112.0.into(), "C".into(), "Jakarta".into(), "pink".into()],
            ],
        );
        locate(&table, &ColumnSelection::new("Lat", "Lon", "Nama")).unwrap()
    }

    #[test]
    fn markers_follow_filters_and_colors() {
        let geo = geo();
        let palette = Palette::default();
        let rule = CircleRule::Target;
        let mut filters = FilterSet::new();
        filters.allow("Cabang", vec!["Jakarta".into()]);
        let colors: ColorAssignment = [("Jakarta", "darkred")].into_iter().collect();
        let display = DisplaySettings::default();

        let view = build_map(
            &geo,
            Selections {
                filters: &filters,
                colors: &colors,
                reference_column: Some("Cabang"),
                display: &display,
            },
            MarkerStyle {
                palette: &palette,
                default_color: DEFAULT_COLOR,
                fallback_column: "Warna",
                circle_rule: &rule,
            },
        );

        let summary: Vec<(&str, &str)> = view
            .markers
            .iter()
            .map(|m| (m.name.as_str(), m.color.as_str()))
            .collect();
        assert_eq!(summary, vec![("A", "darkred"), ("C", "darkred")]);
        assert_eq!(view.center, Some([-6.5, 109.0]));
        assert!(view.circles.is_empty());
    }

    #[test]
    fn circles_surround_target_colored_markers() {
        let geo = geo();
        let palette = Palette::default();
        let rule = CircleRule::Target;
        let filters = FilterSet::new();
        let colors = ColorAssignment::new();
        let display = DisplaySettings {
            show_circle: true,
            enable_cluster: true,
            ..DisplaySettings::default()
        };

        let view = build_map(
            &geo,
            Selections {
                filters: &filters,
                colors: &colors,
                reference_column: None,
                display: &display,
            },
            MarkerStyle {
                palette: &palette,
                default_color: DEFAULT_COLOR,
                fallback_column: "Warna",
                circle_rule: &rule,
            },
        );

        assert!(view.cluster);
        assert_eq!(view.circles.len(), 1);
        assert_eq!(view.circles[0].latitude, -8.0);
        assert_eq!(view.circles[0].radius_m, 1000.0);

        let geojson = view.to_geojson();
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), 4);
        assert_eq!(features[0]["geometry"]["coordinates"][0], 106.0);
        assert_eq!(features[3]["properties"]["kind"], "circle");
    }

    #[test]
    fn empty_selection_has_no_center() {
        let geo = geo();
        let palette = Palette::default();
        let rule = CircleRule::Target;
        let mut filters = FilterSet::new();
        filters.allow("Cabang", vec!["Medan".into()]);
        let colors = ColorAssignment::new();
        let display = DisplaySettings::default();
        let view = build_map(
            &geo,
            Selections {
                filters: &filters,
                colors: &colors,
                reference_column: None,
                display: &display,
            },
            MarkerStyle {
                palette: &palette,
                default_color: DEFAULT_COLOR,
                fallback_column: "Warna",
                circle_rule: &rule,
            },
        );
        assert!(view.markers.is_empty());
        assert_eq!(view.center, None);
    }
}
