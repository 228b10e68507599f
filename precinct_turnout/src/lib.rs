/*!
Turnout analysis for precinct-level election results.

The pipeline has three stages, each a pure function:

1. [`normalize_records`] turns the rows of an uploaded CSV into typed
   [`PrecinctRecord`]s, computing the turnout of each precinct. It is all or
   nothing: a single bad row rejects the whole dataset.
2. [`infer_filter_options`] looks at the extra columns and keeps the ones that
   make sense as categorical filters.
3. [`apply_filters`] restricts the records to the current filter selection.

The [`views`] and [`choropleth`] modules then derive what a dashboard displays
from the filtered records.

```
use precinct_turnout::*;

let headers: Vec<String> = ["precinct_id", "total_registered_voters", "votes_cast", "geojson_boundary"]
    .iter()
    .map(|s| s.to_string())
    .collect();
let row: RawRow = headers
    .iter()
    .cloned()
    .zip(["P1", "100", "80", r#"{"type":"Polygon","coordinates":[]}"#].iter().map(|s| s.to_string()))
    .collect();

let records = normalize_records(&headers, &[row])?;
assert_eq!(records[0].turnout, 0.8);
# Ok::<(), IngestError>(())
```
*/

mod config;
pub mod choropleth;
pub mod manual;
pub mod views;

use log::{debug, info, warn};

use std::collections::{BTreeMap, BTreeSet, HashSet};

pub use crate::config::*;

/// Validates and converts raw CSV rows into precinct records.
///
/// Arguments:
/// * `headers` the header row of the CSV, in file order
/// * `rows` the data rows, in file order
///
/// The output keeps the order of the rows. Nothing is returned if any row
/// fails to convert.
pub fn normalize_records(
    headers: &[String],
    rows: &[RawRow],
) -> Result<Vec<PrecinctRecord>, IngestError> {
    info!(
        "normalize_records: Processing {:?} rows with {:?} columns",
        rows.len(),
        headers.len()
    );
    check_required_columns(headers)?;

    let mut res: Vec<PrecinctRecord> = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let record = normalize_row(row, idx + 1)?;
        debug!(
            "normalize_records: row {:?}: {} turnout {:?}",
            idx + 1,
            record.precinct_id,
            record.turnout
        );
        res.push(record);
    }

    let dups = duplicate_precinct_ids(&res);
    if !dups.is_empty() {
        warn!(
            "normalize_records: {} precinct ids appear more than once: {:?}",
            dups.len(),
            dups
        );
    }
    Ok(res)
}

fn check_required_columns(headers: &[String]) -> Result<(), IngestError> {
    let present: HashSet<&str> = headers.iter().map(|h| h.as_str()).collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !present.contains(*c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        debug!("check_required_columns: missing {:?}", missing);
        Err(IngestError::MissingColumns { missing })
    }
}

fn normalize_row(row: &RawRow, rowno: usize) -> Result<PrecinctRecord, IngestError> {
    let precinct_id = row.get(PRECINCT_ID).cloned().unwrap_or_default();
    let total_registered_voters = parse_count(row, TOTAL_REGISTERED_VOTERS, &precinct_id)?;
    let votes_cast = parse_count(row, VOTES_CAST, &precinct_id)?;

    let boundary_text = row.get(GEOJSON_BOUNDARY).map(|s| s.as_str()).unwrap_or("");
    let boundary = serde_json::from_str(boundary_text).map_err(|e| {
        IngestError::InvalidBoundary {
            precinct_id: precinct_id.clone(),
            row: rowno,
            message: e.to_string(),
        }
    })?;

    let extra: BTreeMap<String, String> = row
        .iter()
        .filter(|(k, _)| !REQUIRED_COLUMNS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(PrecinctRecord {
        turnout: compute_turnout(votes_cast, total_registered_voters),
        precinct_id,
        total_registered_voters,
        votes_cast,
        boundary: Boundary(boundary),
        extra,
    })
}

fn parse_count(row: &RawRow, column: &str, precinct_id: &str) -> Result<u64, IngestError> {
    let value = row.get(column).map(|s| s.as_str()).unwrap_or("");
    let trimmed = value.trim();
    // Spreadsheet exports write whole counts as "100.0".
    let digits = match trimmed.split_once('.') {
        Some((whole, frac)) if frac.chars().all(|c| c == '0') => whole,
        _ => trimmed,
    };
    digits
        .parse::<u64>()
        .map_err(|_| IngestError::InvalidNumber {
            precinct_id: precinct_id.to_string(),
            column: column.to_string(),
            value: value.to_string(),
        })
}

/// The ratio of votes cast to registered voters, 0 if there are no registered voters.
pub fn compute_turnout(votes_cast: u64, total_registered_voters: u64) -> f64 {
    if total_registered_voters > 0 {
        votes_cast as f64 / total_registered_voters as f64
    } else {
        0.0
    }
}

/// The precinct ids that appear on more than one record, in order of first repetition.
pub fn duplicate_precinct_ids(records: &[PrecinctRecord]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut dups: Vec<String> = Vec::new();
    for r in records.iter() {
        if !seen.insert(r.precinct_id.as_str()) && !dups.contains(&r.precinct_id) {
            dups.push(r.precinct_id.clone());
        }
    }
    dups
}

/// Finds the extra columns that are worth offering as categorical filters.
///
/// A column is kept when it has more than one distinct non-empty value, but
/// fewer distinct values than half the number of records. Constant columns
/// and columns that are almost an identifier are both useless as filters.
pub fn infer_filter_options(records: &[PrecinctRecord], headers: &[String]) -> FilterCatalog {
    let num_records = records.len();
    if num_records < 2 {
        debug!(
            "infer_filter_options: only {:?} records, no filter offered",
            num_records
        );
        return FilterCatalog::default();
    }
    let mut columns: Vec<FilterColumn> = Vec::new();
    for h in headers.iter() {
        if REQUIRED_COLUMNS.contains(&h.as_str()) || h.trim().is_empty() {
            continue;
        }
        let distinct: BTreeSet<&str> = records
            .iter()
            .filter_map(|r| r.extra.get(h))
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        let k = distinct.len();
        debug!("infer_filter_options: column {:?}: {:?} distinct values", h, k);
        // k < 0.5 * n, without going through floating point.
        if k > 1 && 2 * k < num_records {
            let mut options: Vec<String> = vec![ALL_SENTINEL.to_string()];
            options.extend(distinct.iter().map(|s| s.to_string()));
            columns.push(FilterColumn {
                name: h.clone(),
                options,
            });
        }
    }
    info!(
        "infer_filter_options: {:?} filter columns out of {:?} headers",
        columns.len(),
        headers.len()
    );
    FilterCatalog { columns }
}

/// True if the selected value does not restrict anything.
pub fn is_unconstrained(value: &str) -> bool {
    value.is_empty() || value == ALL_SENTINEL
}

/// True if the record satisfies every selection of the filter set.
pub fn matches_filters(record: &PrecinctRecord, filters: &ActiveFilterSet) -> bool {
    filters.iter().all(|(column, value)| {
        is_unconstrained(value) || record.field_text(column).as_deref() == Some(value)
    })
}

/// The records that pass all the active filters, in their original order.
///
/// This does not modify anything and can be called on every refresh.
pub fn apply_filters<'a>(
    records: &'a [PrecinctRecord],
    filters: &ActiveFilterSet,
) -> Vec<&'a PrecinctRecord> {
    if filters.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|r| matches_filters(r, filters))
        .collect()
}
