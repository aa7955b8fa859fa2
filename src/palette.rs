//! The enumerated set of marker colors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Marker colors understood by Leaflet's awesome-markers icon set.
pub const MARKER_COLORS: [&str; 19] = [
    "red",
    "blue",
    "green",
    "purple",
    "orange",
    "darkred",
    "lightred",
    "beige",
    "darkblue",
    "darkgreen",
    "cadetblue",
    "darkpurple",
    "white",
    "pink",
    "lightblue",
    "lightgreen",
    "gray",
    "black",
    "lightgray",
];

pub const DEFAULT_COLOR: &str = "blue";

/// Browser color for a marker color name. Several names (`lightred`,
/// `darkpurple`, `cadetblue` shades) are not CSS keywords, so every marker
/// color maps to the hex value of its awesome-markers icon.
pub fn css_color(name: &str) -> Option<&'static str> {
    let hex = match name {
        "red" => "#D63E2A",
        "blue" => "#38AADD",
        "green" => "#72B026",
        "purple" => "#D252B9",
        "orange" => "#F69730",
        "darkred" => "#A23336",
        "lightred" => "#FF8E7F",
        "beige" => "#FFCB92",
        "darkblue" => "#0067A3",
        "darkgreen" => "#728224",
        "cadetblue" => "#436978",
        "darkpurple" => "#5B396B",
        "white" => "#FBFBFB",
        "pink" => "#FF91EA",
        "lightblue" => "#8ADAFF",
        "lightgreen" => "#BBF970",
        "gray" => "#575757",
        "black" => "#303030",
        "lightgray" => "#A3A3A3",
        _ => return None,
    };
    Some(hex)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette {
    colors: Vec<String>,
}

impl Palette {
    pub fn new<I, S>(colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut palette = Self { colors: Vec::new() };
        for color in colors {
            let color = color.into();
            if !palette.colors.contains(&color) {
                palette.colors.push(color);
            }
        }
        palette
    }

    pub fn contains(&self, color: &str) -> bool {
        self.colors.iter().any(|c| c == color)
    }

    /// The palette's own copy of `color`, if it is a member.
    pub fn get(&self, color: &str) -> Option<&str> {
        self.colors.iter().find(|c| *c == color).map(String::as_str)
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Each member paired with its browser color. Names without a known hex
    /// value are passed through unchanged.
    pub fn css_colors(&self) -> BTreeMap<&str, &str> {
        self.colors
            .iter()
            .map(|c| (c.as_str(), css_color(c).unwrap_or(c.as_str())))
            .collect()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(MARKER_COLORS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_palette_has_all_marker_colors() {
        let palette = Palette::default();
        assert_eq!(palette.colors().len(), 19);
        assert!(palette.contains(DEFAULT_COLOR));
        assert!(palette.contains("lightgray"));
        assert!(!palette.contains("Green"));
    }

    #[test]
    fn every_marker_color_has_a_css_value() {
        for color in MARKER_COLORS {
            let hex = css_color(color).unwrap_or_else(|| panic!("{color} has no css value"));
            assert!(hex.starts_with('#') && hex.len() == 7);
        }
        assert_eq!(css_color("lightred"), Some("#FF8E7F"));
        assert_eq!(css_color("teal"), None);
        let palette = Palette::new(["darkpurple", "teal"]);
        let css = palette.css_colors();
        assert_eq!(css["darkpurple"], "#5B396B");
        assert_eq!(css["teal"], "teal");
    }

    #[test]
    fn duplicates_collapse() {
        let palette = Palette::new(["red", "red", "blue"]);
        assert_eq!(palette.colors(), &["red", "blue"]);
    }
}
