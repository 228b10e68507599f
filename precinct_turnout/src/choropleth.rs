//! The map layer: precincts shaded by turnout.
//!
//! This builds the GeoJSON handed to the map widget, the colour scale and its
//! legend, the region to fit the view to and the details shown on hover.

use log::debug;
use serde_json::{json, Value as JSValue};

use crate::config::*;

pub const STROKE_COLOR: &str = "#3F51B5";

/// Colour for precincts at or below the lowest bracket.
pub const FALLBACK_COLOR: &str = "#FFEB3B";

// (lower bound in percent, exclusive; colour), darkest first.
const COLOR_SCALE: [(u32, &str); 6] = [
    (80, "#3F51B5"),
    (70, "#5C6BC0"),
    (60, "#7986CB"),
    (50, "#9FA8DA"),
    (40, "#C5CAE9"),
    (30, "#E8EAF6"),
];

/// The fill colour of a precinct.
pub fn turnout_color(turnout: f64) -> &'static str {
    let percent = turnout * 100.0;
    COLOR_SCALE
        .iter()
        .find(|(lower, _)| percent > *lower as f64)
        .map(|(_, color)| *color)
        .unwrap_or(FALLBACK_COLOR)
}

/// The legend of the map, darkest bracket first: (label, colour).
pub fn legend() -> Vec<(String, &'static str)> {
    COLOR_SCALE
        .iter()
        .enumerate()
        .map(|(idx, (lower, color))| {
            let label = if idx == 0 {
                format!("> {}", lower)
            } else {
                format!("{}-{}", lower, lower + 10)
            };
            (label, *color)
        })
        .collect()
}

/// Builds the feature collection drawn by the map.
///
/// Each feature is identified by its precinct id, and its properties merge the
/// properties already in the boundary with the fields of the record.
pub fn feature_collection(records: &[&PrecinctRecord]) -> JSValue {
    let features: Vec<JSValue> = records.iter().map(|r| feature(r)).collect();
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn feature(record: &PrecinctRecord) -> JSValue {
    let mut properties = record.boundary.properties().cloned().unwrap_or_default();
    for (k, v) in record.extra.iter() {
        properties.insert(k.clone(), json!(v));
    }
    properties.insert(PRECINCT_ID.to_string(), json!(record.precinct_id));
    properties.insert(
        TOTAL_REGISTERED_VOTERS.to_string(),
        json!(record.total_registered_voters),
    );
    properties.insert(VOTES_CAST.to_string(), json!(record.votes_cast));
    properties.insert("turnout".to_string(), json!(record.turnout));
    properties.insert("fillColor".to_string(), json!(turnout_color(record.turnout)));
    properties.insert("strokeColor".to_string(), json!(STROKE_COLOR));

    json!({
        "type": "Feature",
        "id": record.precinct_id,
        "geometry": record.boundary.geometry().cloned().unwrap_or(JSValue::Null),
        "properties": properties,
    })
}

/// The smallest box containing every renderable precinct, if there is one.
pub fn overall_bounds(records: &[&PrecinctRecord]) -> Option<BoundingBox> {
    let mut res: Option<BoundingBox> = None;
    for r in records.iter() {
        if let Some(b) = boundary_bounds(&r.boundary) {
            merge_bounds(&mut res, &b);
        } else {
            debug!(
                "overall_bounds: {} has no renderable geometry ({:?})",
                r.precinct_id,
                r.boundary.geometry_type()
            );
        }
    }
    res
}

/// The bounds of a Polygon or MultiPolygon geometry.
pub fn boundary_bounds(boundary: &Boundary) -> Option<BoundingBox> {
    let coords = boundary.geometry()?.get("coordinates")?;
    match boundary.geometry_type()? {
        "Polygon" => rings_bounds(coords),
        "MultiPolygon" => {
            let mut res: Option<BoundingBox> = None;
            for poly in coords.as_array()? {
                if let Some(b) = rings_bounds(poly) {
                    merge_bounds(&mut res, &b);
                }
            }
            res
        }
        _ => None,
    }
}

fn rings_bounds(rings: &JSValue) -> Option<BoundingBox> {
    let mut res: Option<BoundingBox> = None;
    for ring in rings.as_array()? {
        if let Some(b) = ring_bounds(ring) {
            merge_bounds(&mut res, &b);
        }
    }
    res
}

fn merge_bounds(acc: &mut Option<BoundingBox>, b: &BoundingBox) {
    if let Some(a) = acc.as_mut() {
        a.union(b);
    } else {
        *acc = Some(*b);
    }
}

// Positions are [lng, lat]; anything shorter is skipped.
fn ring_bounds(ring: &JSValue) -> Option<BoundingBox> {
    let mut res: Option<BoundingBox> = None;
    for pos in ring.as_array()? {
        let (lng, lat) = match pos.as_array().map(|p| p.as_slice()) {
            Some([x, y, ..]) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => (x, y),
                _ => continue,
            },
            _ => continue,
        };
        merge_bounds(&mut res, &BoundingBox::from_point(lng, lat));
    }
    res
}

/// Finds the record of a precinct by its id.
///
/// Duplicate ids are accepted by the ingestion: the first record in file order wins.
pub fn find_precinct<'a>(records: &[&'a PrecinctRecord], precinct_id: &str) -> Option<&'a PrecinctRecord> {
    records
        .iter()
        .find(|r| r.precinct_id == precinct_id)
        .copied()
}

/// What to display when hovering over a precinct.
pub fn hover_details(record: &PrecinctRecord) -> HoverDetails {
    let anchor = match record.boundary.geometry_type() {
        Some("Polygon") => record
            .boundary
            .geometry()
            .and_then(|g| g.get("coordinates"))
            .and_then(|c| c.get(0))
            .and_then(ring_bounds)
            .map(|b| b.center()),
        _ => None,
    };
    HoverDetails {
        precinct_id: record.precinct_id.clone(),
        turnout_text: format!("{:.2}%", record.turnout * 100.0),
        registered_text: thousands(record.total_registered_voters),
        votes_text: thousands(record.votes_cast),
        anchor,
    }
}

/// 1234567 -> "1,234,567"
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut res = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            res.push(',');
        }
        res.push(c);
    }
    res
}
