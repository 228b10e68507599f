use log::{debug, info, warn};

use precinct_turnout::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::dashboard::config_reader::*;
use crate::dashboard::insights::{GeminiClient, InsightClient, InsightError};
use crate::dashboard::session::{DashboardView, InsightState, Session};

pub mod config_reader;
pub mod insights;
pub mod io_csv;
pub mod session;
pub mod task;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DashboardError {
    #[snafu(display("Error opening file {path}"))]
    OpeningCsv {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid file type {path}: please upload a valid CSV file"))]
    InvalidFileType { path: String },
    #[snafu(display("Failed to parse CSV at line {lineno}: {source}"))]
    CsvParse { source: csv::Error, lineno: u64 },
    #[snafu(display("Error processing data: {source}"))]
    Ingest { source: IngestError },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("No data: please upload a CSV file first"))]
    NoDataset {},
    #[snafu(display("No input file: use --input or set dataSource.filePath in the configuration"))]
    NoInputFile {},
    #[snafu(display("Invalid filter {filter:?}: expected COLUMN=VALUE"))]
    InvalidFilter { filter: String },
    #[snafu(display("The environment variable {env} with the API key for insights is not set"))]
    MissingApiKey { env: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type DashboardResult<T> = Result<T, DashboardError>;

/// What the command line asks for.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RunOptions {
    pub input: Option<String>,
    pub config: Option<String>,
    pub filters: Vec<String>,
    pub out: Option<String>,
    pub reference: Option<String>,
    pub insights: bool,
}

fn histogram_to_json(bins: &[HistogramBin]) -> Vec<JSValue> {
    bins.iter()
        .map(|b| json!({"name": b.label, "count": b.count}))
        .collect()
}

fn extremes_to_json(entries: &[ExtremeEntry]) -> Vec<JSValue> {
    entries
        .iter()
        .map(|e| {
            json!({
                "precinctId": e.precinct_id,
                "turnoutPercent": e.turnout_percent,
                "label": views::format_percent(e.turnout_percent, 1),
            })
        })
        .collect()
}

fn insight_to_json(state: &InsightState) -> JSValue {
    match state {
        InsightState::NotRequested => json!({"status": "notRequested"}),
        InsightState::InProgress { .. } => json!({"status": "inProgress"}),
        InsightState::Ready(text) => json!({"status": "ready", "text": text}),
        InsightState::Failed(msg) => json!({"status": "failed", "error": msg}),
    }
}

/// Assembles the summary of the current session.
pub fn build_summary_js(session: &Session, view: &DashboardView) -> JSValue {
    let mut filters: JSMap<String, JSValue> = JSMap::new();
    for (k, v) in session.filters().iter() {
        filters.insert(k.to_string(), json!(v));
    }

    let mut filter_options: JSMap<String, JSValue> = JSMap::new();
    if let Some(catalog) = session.catalog() {
        for col in catalog.columns.iter() {
            filter_options.insert(col.name.clone(), json!(col.options));
        }
    }

    let bounds = view.bounds.map(|b| {
        json!({
            "minLng": b.min_lng,
            "minLat": b.min_lat,
            "maxLng": b.max_lng,
            "maxLat": b.max_lat,
        })
    });

    let (fingerprint, num_records, duplicates) = match session.dataset() {
        Some(ds) => (
            ds.fingerprint.clone(),
            ds.records.len(),
            duplicate_precinct_ids(&ds.records),
        ),
        None => (String::new(), 0, Vec::new()),
    };

    json!({
        "fingerprint": fingerprint,
        "records": num_records,
        "filtered": view.filtered.len(),
        "duplicatePrecinctIds": duplicates,
        "filters": filters,
        "filterOptions": filter_options,
        "histogram": histogram_to_json(&view.histogram),
        "extremes": {
            "top": extremes_to_json(&view.extremes.top),
            "bottom": extremes_to_json(&view.extremes.bottom),
        },
        "bounds": bounds,
        "insights": insight_to_json(session.insight_state()),
    })
}

fn log_view(session: &Session, view: &DashboardView) {
    if let Some(catalog) = session.catalog() {
        for col in catalog.columns.iter() {
            info!("Filter {}: {}", col.name, col.options.join(" | "));
        }
    }
    info!("Displaying {} precincts", view.filtered.len());
    for b in view.histogram.iter() {
        info!("{:>8} {:>6} {}", b.label, b.count, "#".repeat(b.count.min(60) as usize));
    }
    for e in view.extremes.top.iter() {
        info!("Top:    {:>12} {}", e.precinct_id, views::format_percent(e.turnout_percent, 1));
    }
    for e in view.extremes.bottom.iter() {
        info!("Bottom: {:>12} {}", e.precinct_id, views::format_percent(e.turnout_percent, 1));
    }
    if view.bounds.is_none() {
        warn!("None of the displayed precincts has a polygon boundary, the map is empty");
    }
}

/// Parses a `COLUMN=VALUE` command line filter.
pub fn parse_filter(filter: &str) -> DashboardResult<(String, String)> {
    match filter.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => InvalidFilterSnafu { filter }.fail(),
    }
}

fn resolve_path(base: Option<&Path>, p: &str) -> PathBuf {
    match base {
        Some(b) if Path::new(p).is_relative() => b.join(p),
        _ => PathBuf::from(p),
    }
}

fn write_output(out: &str, pretty: &str) -> DashboardResult<()> {
    if out == "stdout" {
        println!("{}", pretty);
        Ok(())
    } else {
        info!("Writing summary to {:?}", out);
        fs::write(out, pretty).context(WritingOutputSnafu { path: out })
    }
}

fn check_reference(reference_path: &str, pretty_js: &str) -> DashboardResult<()> {
    let contents = fs::read_to_string(reference_path).context(OpeningJsonSnafu {
        path: reference_path,
    })?;
    let reference: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    let pretty_ref = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
    if pretty_ref != pretty_js {
        warn!("Found differences with the reference summary");
        print_diff(pretty_ref.as_str(), pretty_js, "\n");
        whatever!("Difference detected between calculated summary and reference summary")
    }
    info!("Summary matches the reference {:?}", reference_path);
    Ok(())
}

/// Runs a whole session: load, filter, optionally ask for insights, report.
///
/// `client` is used when insights are requested. It is built from the
/// configuration when not provided.
pub fn run_session(
    opts: &RunOptions,
    client: Option<Arc<dyn InsightClient>>,
) -> DashboardResult<JSValue> {
    let (config, config_dir) = match &opts.config {
        Some(p) => {
            let c = read_config(p)?;
            info!("config: {:?}", c);
            (c, Path::new(p).parent().map(|d| d.to_path_buf()))
        }
        None => (DashboardConfig::default(), None),
    };

    let input: PathBuf = match (&opts.input, config.data_source.as_ref()) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(ds)) => resolve_path(config_dir.as_deref(), &ds.file_path),
        (None, None) => return NoInputFileSnafu {}.fail(),
    };

    let mut session = Session::new();
    session.load_file(&input)?;
    session.wait()?;

    let mut filters: Vec<(String, String)> = config
        .filters
        .clone()
        .unwrap_or_default()
        .into_iter()
        .collect();
    for f in opts.filters.iter() {
        filters.push(parse_filter(f)?);
    }
    for (k, v) in filters.iter() {
        session.select_filter(k, v)?;
    }

    if opts.insights {
        let client: Arc<dyn InsightClient> = match client {
            Some(c) => c,
            None => {
                let settings = config.insights.clone().unwrap_or_default();
                Arc::new(GeminiClient::from_settings(&settings)?)
            }
        };
        session.request_insights(client)?;
        session.wait()?;
        match session.insight_state() {
            InsightState::Ready(text) => info!("Insights:\n{}", text),
            InsightState::Failed(msg) => warn!("Insights could not be generated: {}", msg),
            s => debug!("run_session: insight state {:?}", s),
        }
    }

    let view = session.view().context(NoDatasetSnafu {})?;
    log_view(&session, &view);
    let summary = build_summary_js(&session, &view);
    let pretty_js = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;

    let out = match (&opts.out, config.output_settings.as_ref()) {
        (Some(o), _) => Some(o.clone()),
        (None, Some(os)) => os
            .output_path
            .as_ref()
            .map(|p| resolve_path(config_dir.as_deref(), p).display().to_string()),
        (None, None) => None,
    };
    if let Some(o) = out {
        write_output(&o, &pretty_js)?;
    }

    if let Some(r) = &opts.reference {
        check_reference(r, &pretty_js)?;
    }
    Ok(summary)
}

pub fn run_dashboard(opts: &RunOptions) -> DashboardResult<()> {
    run_session(opts, None).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedClient(&'static str);

    impl InsightClient for CannedClient {
        fn generate(&self, csv_text: &str) -> Result<String, InsightError> {
            assert!(csv_text.starts_with("precinct_id"));
            Ok(self.0.to_string())
        }
    }

    fn sample_path() -> String {
        format!("{}/data/sample_precincts.csv", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn filters_parse() {
        assert_eq!(
            parse_filter("region=North").unwrap(),
            ("region".to_string(), "North".to_string())
        );
        assert_eq!(
            parse_filter("county=").unwrap(),
            ("county".to_string(), "".to_string())
        );
        assert!(parse_filter("region").is_err());
        assert!(parse_filter("=North").is_err());
    }

    #[test]
    fn sample_end_to_end() {
        let _ = env_logger::builder().is_test(true).try_init();
        let opts = RunOptions {
            input: Some(sample_path()),
            ..RunOptions::default()
        };
        let summary = run_session(&opts, None).unwrap();
        assert_eq!(summary["records"], json!(12));
        assert_eq!(summary["filtered"], json!(12));
        assert_eq!(
            summary["filterOptions"]["region"],
            json!(["All", "East", "North", "South"])
        );
        assert!(summary["filterOptions"].get("precinct_name").is_none());
        assert_eq!(summary["extremes"]["top"].as_array().unwrap().len(), 5);
        assert_eq!(summary["extremes"]["top"][0]["precinctId"], json!("P11"));
        assert_eq!(summary["insights"]["status"], json!("notRequested"));
        assert!(summary["bounds"].is_object());
    }

    #[test]
    fn sample_with_filter_and_insights() {
        let opts = RunOptions {
            input: Some(sample_path()),
            filters: vec!["region=North".to_string()],
            insights: true,
            ..RunOptions::default()
        };
        let client: Arc<dyn InsightClient> = Arc::new(CannedClient("P11 looks unusual."));
        let summary = run_session(&opts, Some(client)).unwrap();
        assert_eq!(summary["filtered"], json!(4));
        assert_eq!(summary["filters"]["region"], json!("North"));
        assert_eq!(summary["insights"]["status"], json!("ready"));
        assert_eq!(summary["insights"]["text"], json!("P11 looks unusual."));
    }

    #[test]
    fn summary_is_stable() {
        let opts = RunOptions {
            input: Some(sample_path()),
            filters: vec!["region=South".to_string()],
            ..RunOptions::default()
        };
        let a = run_session(&opts, None).unwrap();
        let b = run_session(&opts, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn config_and_reference() {
        let out = std::env::temp_dir().join(format!("turnoutvis_summary_{}.json", std::process::id()));
        let out_s = out.display().to_string();
        let opts = RunOptions {
            config: Some(format!("{}/data/sample_config.json", env!("CARGO_MANIFEST_DIR"))),
            out: Some(out_s.clone()),
            ..RunOptions::default()
        };
        let summary = run_session(&opts, None).unwrap();
        assert_eq!(summary["filtered"], json!(4));
        assert_eq!(summary["filters"]["region"], json!("East"));

        // The written summary is its own reference.
        let check = RunOptions {
            reference: Some(out_s.clone()),
            ..opts.clone()
        };
        let res = run_session(&check, None);
        let _ = fs::remove_file(&out);
        res.unwrap();

        let other = RunOptions {
            config: opts.config.clone(),
            filters: vec!["region=North".to_string()],
            reference: Some(format!("{}/data/sample_config.json", env!("CARGO_MANIFEST_DIR"))),
            ..RunOptions::default()
        };
        assert!(matches!(
            run_session(&other, None),
            Err(DashboardError::Whatever { .. })
        ));
    }

    #[test]
    fn missing_input() {
        let res = run_session(&RunOptions::default(), None);
        assert!(matches!(res, Err(DashboardError::NoInputFile {})));
    }
}
