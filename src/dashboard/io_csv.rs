// Primitives for reading the uploaded CSV files.

use crate::dashboard::*;

/// Splits CSV text into its header and its rows keyed by column name.
///
/// Empty lines are skipped. A row with a different number of fields than the
/// header is an error.
pub fn read_csv_rows(text: &str) -> DashboardResult<(Vec<String>, Vec<RawRow>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .context(CsvParseSnafu { lineno: 1u64 })?
        .iter()
        .map(|h| h.to_string())
        .collect();
    debug!("read_csv_rows: headers: {:?}", headers);

    let mut rows: Vec<RawRow> = Vec::new();
    for line_r in rdr.records() {
        let lineno = match &line_r {
            Ok(r) => r.position().map(|p| p.line()).unwrap_or(0),
            Err(e) => e.position().map(|p| p.line()).unwrap_or(0),
        };
        let line = line_r.context(CsvParseSnafu { lineno })?;
        let row: RawRow = headers
            .iter()
            .cloned()
            .zip(line.iter().map(|s| s.to_string()))
            .collect();
        rows.push(row);
    }
    info!(
        "read_csv_rows: read {:?} rows with {:?} columns",
        rows.len(),
        headers.len()
    );
    Ok((headers, rows))
}

/// True if the path looks like a CSV file.
pub fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_keyed_by_header() {
        let text = "precinct_id,region\nP1,North\n\nP2,South\n";
        let (headers, rows) = read_csv_rows(text).unwrap();
        assert_eq!(headers, vec!["precinct_id", "region"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("region"), Some(&"South".to_string()));
    }

    #[test]
    fn quoted_json_survives() {
        let text = "precinct_id,geojson_boundary\nP1,\"{\"\"type\"\":\"\"Polygon\"\"}\"\n";
        let (_, rows) = read_csv_rows(text).unwrap();
        assert_eq!(
            rows[0].get("geojson_boundary"),
            Some(&"{\"type\":\"Polygon\"}".to_string())
        );
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let text = "a,b\n1,2\n3\n";
        let res = read_csv_rows(text);
        assert!(matches!(res, Err(DashboardError::CsvParse { .. })));
    }

    #[test]
    fn csv_extension() {
        assert!(is_csv_path(Path::new("data/precincts.csv")));
        assert!(is_csv_path(Path::new("PRECINCTS.CSV")));
        assert!(!is_csv_path(Path::new("precincts.xlsx")));
        assert!(!is_csv_path(Path::new("precincts")));
    }
}
