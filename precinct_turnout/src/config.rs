// ********* Input data structures ***********

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::Display;

use serde_json::Value as JSValue;

pub const PRECINCT_ID: &str = "precinct_id";
pub const TOTAL_REGISTERED_VOTERS: &str = "total_registered_voters";
pub const VOTES_CAST: &str = "votes_cast";
pub const GEOJSON_BOUNDARY: &str = "geojson_boundary";

/// The columns that every uploaded dataset must carry, in the order they are reported.
pub const REQUIRED_COLUMNS: [&str; 4] = [
    PRECINCT_ID,
    TOTAL_REGISTERED_VOTERS,
    VOTES_CAST,
    GEOJSON_BOUNDARY,
];

/// The filter value that stands for "no constraint on this column".
pub const ALL_SENTINEL: &str = "All";

/// A row as it comes out of the CSV reader: column name to raw text.
pub type RawRow = HashMap<String, String>;

/// The geometry attached to a precinct.
///
/// It is kept as parsed JSON. Both bare geometries (`{"type": "Polygon", ...}`)
/// and GeoJSON features wrapping one (`{"type": "Feature", "geometry": {...}}`)
/// are accepted.
#[derive(PartialEq, Debug, Clone)]
pub struct Boundary(pub JSValue);

impl Boundary {
    /// The geometry object itself, unwrapping a feature if needed.
    pub fn geometry(&self) -> Option<&JSValue> {
        match self.0.get("geometry") {
            Some(g) if g.is_object() => Some(g),
            _ if self.0.get("type").and_then(|t| t.as_str()) != Some("Feature") => Some(&self.0),
            _ => None,
        }
    }

    pub fn geometry_type(&self) -> Option<&str> {
        self.geometry()
            .and_then(|g| g.get("type"))
            .and_then(|t| t.as_str())
    }

    /// The properties of the wrapping feature, if any.
    pub fn properties(&self) -> Option<&serde_json::Map<String, JSValue>> {
        self.0.get("properties").and_then(|p| p.as_object())
    }

    /// True if the map layer knows how to draw this geometry.
    pub fn is_renderable(&self) -> bool {
        matches!(self.geometry_type(), Some("Polygon") | Some("MultiPolygon"))
    }
}

/// One normalized row of the dataset.
#[derive(PartialEq, Debug, Clone)]
pub struct PrecinctRecord {
    pub precinct_id: String,
    pub total_registered_voters: u64,
    pub votes_cast: u64,
    /// votes_cast / total_registered_voters, or 0 when nobody is registered.
    /// This is not capped at 1.
    pub turnout: f64,
    pub boundary: Boundary,
    /// All the non-required columns of the source row, untouched.
    pub extra: BTreeMap<String, String>,
}

impl PrecinctRecord {
    /// The value of a column as text, the way the filters compare it.
    ///
    /// Returns None when the record has no such column.
    pub fn field_text(&self, column: &str) -> Option<String> {
        match column {
            PRECINCT_ID => Some(self.precinct_id.clone()),
            TOTAL_REGISTERED_VOTERS => Some(self.total_registered_voters.to_string()),
            VOTES_CAST => Some(self.votes_cast.to_string()),
            "turnout" => Some(self.turnout.to_string()),
            GEOJSON_BOUNDARY => Some(self.boundary.0.to_string()),
            _ => self.extra.get(column).cloned(),
        }
    }
}

/// A column that can be used as a categorical filter, with its options.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FilterColumn {
    pub name: String,
    /// Starts with the "All" sentinel, followed by the sorted distinct values.
    pub options: Vec<String>,
}

/// The filters offered for a dataset, in header order.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FilterCatalog {
    pub columns: Vec<FilterColumn>,
}

impl FilterCatalog {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn options(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.options.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// The selections currently applied to the dataset.
///
/// An absent column, or a column set to the "All" sentinel, does not restrict the view.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ActiveFilterSet {
    selections: BTreeMap<String, String>,
}

impl ActiveFilterSet {
    pub fn new() -> ActiveFilterSet {
        ActiveFilterSet::default()
    }

    pub fn select(&mut self, column: &str, value: &str) {
        self.selections.insert(column.to_string(), value.to_string());
    }

    /// Builder-style variant of `select`.
    pub fn with(mut self, column: &str, value: &str) -> ActiveFilterSet {
        self.select(column, value);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<String> {
        self.selections.remove(column)
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.selections.get(column).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.selections
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ******** Output data structures *********

/// One bracket of the turnout histogram.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct HistogramBin {
    /// For example "20-30%".
    pub label: String,
    pub count: u64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ExtremeEntry {
    pub precinct_id: String,
    pub turnout_percent: f64,
}

/// The precincts with the highest and the lowest turnout.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Extremes {
    /// Highest turnout first.
    pub top: Vec<ExtremeEntry>,
    /// Lowest turnout first.
    pub bottom: Vec<ExtremeEntry>,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn from_point(lng: f64, lat: f64) -> BoundingBox {
        BoundingBox {
            min_lng: lng,
            min_lat: lat,
            max_lng: lng,
            max_lat: lat,
        }
    }

    pub fn extend(&mut self, lng: f64, lat: f64) {
        self.min_lng = self.min_lng.min(lng);
        self.min_lat = self.min_lat.min(lat);
        self.max_lng = self.max_lng.max(lng);
        self.max_lat = self.max_lat.max(lat);
    }

    pub fn union(&mut self, other: &BoundingBox) {
        self.extend(other.min_lng, other.min_lat);
        self.extend(other.max_lng, other.max_lat);
    }

    /// (lat, lng) of the middle of the box.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// What the map shows when the pointer is over a precinct.
#[derive(PartialEq, Debug, Clone)]
pub struct HoverDetails {
    pub precinct_id: String,
    /// For example "80.00%".
    pub turnout_text: String,
    pub registered_text: String,
    pub votes_text: String,
    /// (lat, lng) where the details are pinned. Only known for polygons.
    pub anchor: Option<(f64, f64)>,
}

/// Errors that prevent a dataset from being ingested.
///
/// Ingestion is all or nothing: any of these means no record was produced.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum IngestError {
    /// Some required columns are not in the header.
    MissingColumns { missing: Vec<String> },
    /// A registration or vote count could not be read as a non-negative integer.
    InvalidNumber {
        precinct_id: String,
        column: String,
        value: String,
    },
    /// The boundary of a row is not valid JSON.
    InvalidBoundary {
        precinct_id: String,
        row: usize,
        message: String,
    },
}

impl Error for IngestError {}

impl Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::MissingColumns { missing } => write!(
                f,
                "CSV must contain the following columns: {} (missing: {})",
                REQUIRED_COLUMNS.join(", "),
                missing.join(", ")
            ),
            IngestError::InvalidNumber {
                precinct_id,
                column,
                value,
            } => write!(
                f,
                "Invalid number format in row with precinct_id: {} ({} = {:?})",
                precinct_id, column, value
            ),
            IngestError::InvalidBoundary {
                precinct_id,
                row,
                message,
            } => write!(
                f,
                "Invalid geojson_boundary in row {} with precinct_id: {}: {}",
                row, precinct_id, message
            ),
        }
    }
}

impl IngestError {
    /// True for errors about the shape of the file rather than a specific row.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, IngestError::MissingColumns { .. })
    }
}
