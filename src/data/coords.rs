//! Coordinate coercion for latitude/longitude cells.

use super::value::Scalar;

/// Coerces a cell to a coordinate. Numbers pass through; text is cleaned
/// (surrounding whitespace and quotes, degree signs, a lone decimal comma)
/// and parsed. Anything else, including non-finite results, is `None`.
pub fn coerce_coordinate(value: &Scalar) -> Option<f64> {
    let parsed = match value {
        Scalar::Number(n) => Some(*n),
        Scalar::Text(s) => parse_coordinate_text(s),
        Scalar::Missing => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn parse_coordinate_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| *c != '°' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    // "-6,175" is a decimal comma; "1,234.5" (thousands separator) is rejected.
    let normalized = match (cleaned.matches(',').count(), cleaned.contains('.')) {
        (0, _) => cleaned,
        (1, false) => cleaned.replace(',', "."),
        _ => return None,
    };
    normalized.parse::<f64>().ok()
}

/// Latitude must lie in [-90, 90] and longitude in [-180, 180].
pub fn in_range(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}
