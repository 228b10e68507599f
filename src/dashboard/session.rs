// The state of one dashboard: the loaded dataset, the selected filters and
// the insight request, plus the background work feeding them.

use crate::dashboard::*;

use crate::dashboard::io_csv::{is_csv_path, read_csv_rows};
use crate::dashboard::task::{Pending, TaskPoll};

/// A successfully ingested file.
#[derive(PartialEq, Debug, Clone)]
pub struct Dataset {
    /// The text of the file as uploaded. This is what the insight request sees.
    pub csv_text: String,
    /// sha256 of `csv_text`.
    pub fingerprint: String,
    pub headers: Vec<String>,
    pub records: Vec<PrecinctRecord>,
    pub catalog: FilterCatalog,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum InsightState {
    NotRequested,
    InProgress { generation: u64 },
    Ready(String),
    Failed(String),
}

/// Everything displayed for the current filters.
///
/// It borrows the records of the session.
#[derive(PartialEq, Debug, Clone)]
pub struct DashboardView<'a> {
    pub filtered: Vec<&'a PrecinctRecord>,
    pub histogram: Vec<HistogramBin>,
    pub extremes: Extremes,
    /// The GeoJSON layer of the map.
    pub map: JSValue,
    pub bounds: Option<BoundingBox>,
}

impl<'a> DashboardView<'a> {
    /// The details shown when pointing at a precinct of the map.
    pub fn hover(&self, precinct_id: &str) -> Option<HoverDetails> {
        choropleth::find_precinct(&self.filtered, precinct_id).map(choropleth::hover_details)
    }
}

/// The file as text. Bytes that are not UTF-8 become U+FFFD.
fn decode_text(path: &str, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                "Session: {} is not valid UTF-8 (first bad byte at {}), replacing the invalid bytes",
                path,
                e.utf8_error().valid_up_to()
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

struct PendingLoad {
    path: String,
    task: Pending<Result<Vec<u8>, std::io::Error>>,
}

pub struct Session {
    dataset: Option<Dataset>,
    filters: ActiveFilterSet,
    insight: InsightState,
    // Bumped by every ingestion. Background results carry the generation
    // that started them and are dropped if it is not current anymore.
    generation: u64,
    pending_load: Option<PendingLoad>,
    pending_insight: Option<Pending<Result<String, InsightError>>>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    pub fn new() -> Session {
        Session {
            dataset: None,
            filters: ActiveFilterSet::new(),
            insight: InsightState::NotRequested,
            generation: 0,
            pending_load: None,
            pending_insight: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn catalog(&self) -> Option<&FilterCatalog> {
        self.dataset.as_ref().map(|ds| &ds.catalog)
    }

    pub fn filters(&self) -> &ActiveFilterSet {
        &self.filters
    }

    pub fn insight_state(&self) -> &InsightState {
        &self.insight
    }

    /// True while a file read started by the current generation is running.
    pub fn is_loading(&self) -> bool {
        self.pending_load
            .as_ref()
            .map(|l| l.task.generation() == self.generation)
            .unwrap_or(false)
    }

    pub fn has_pending_insight(&self) -> bool {
        self.pending_insight.is_some()
    }

    fn start_generation(&mut self) {
        self.generation += 1;
        self.dataset = None;
        self.filters = ActiveFilterSet::new();
        self.insight = InsightState::NotRequested;
        debug!("Session: starting generation {}", self.generation);
    }

    fn apply_csv(&mut self, csv_text: String) -> DashboardResult<()> {
        let (headers, rows) = read_csv_rows(&csv_text)?;
        let records = normalize_records(&headers, &rows).context(IngestSnafu {})?;
        let catalog = infer_filter_options(&records, &headers);
        let fingerprint = sha256::digest(csv_text.as_str());
        info!(
            "Session: loaded {} precincts, {} filterable columns, fingerprint {}",
            records.len(),
            catalog.len(),
            fingerprint
        );
        self.dataset = Some(Dataset {
            csv_text,
            fingerprint,
            headers,
            records,
            catalog,
        });
        Ok(())
    }

    /// Replaces the dataset with the content of a CSV text.
    ///
    /// On failure, the session is left empty.
    pub fn ingest(&mut self, csv_text: &str) -> DashboardResult<()> {
        self.start_generation();
        self.apply_csv(csv_text.to_string())
    }

    /// Starts reading a CSV file in the background.
    ///
    /// The previous dataset is dropped right away. The file is ingested by
    /// `poll` or `wait` once it has been read.
    pub fn load_file(&mut self, path: &Path) -> DashboardResult<()> {
        let path_s = path.display().to_string();
        if !is_csv_path(path) {
            return InvalidFileTypeSnafu { path: path_s }.fail();
        }
        self.start_generation();
        info!("Session: reading {:?}", path_s);
        let p = path.to_path_buf();
        let task = Pending::spawn(self.generation, "load", move || fs::read(p));
        self.pending_load = Some(PendingLoad { path: path_s, task });
        Ok(())
    }

    /// Clears everything, as if nothing had been uploaded.
    pub fn reset(&mut self) {
        self.start_generation();
        self.pending_load = None;
        self.pending_insight = None;
    }

    pub fn select_filter(&mut self, column: &str, value: &str) -> DashboardResult<()> {
        let ds = self.dataset.as_ref().context(NoDatasetSnafu {})?;
        match ds.catalog.options(column) {
            None => warn!(
                "select_filter: {:?} is not a filterable column, it will still be applied",
                column
            ),
            Some(opts) if !value.is_empty() && !opts.iter().any(|o| o == value) => warn!(
                "select_filter: {:?} is not one of the values of {:?}",
                value, column
            ),
            _ => {}
        }
        self.filters.select(column, value);
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.filters = ActiveFilterSet::new();
    }

    /// Computes what is displayed for the current dataset and filters.
    pub fn view(&self) -> Option<DashboardView<'_>> {
        let ds = self.dataset.as_ref()?;
        let filtered = apply_filters(&ds.records, &self.filters);
        debug!(
            "Session::view: {} of {} precincts pass the filters",
            filtered.len(),
            ds.records.len()
        );
        Some(DashboardView {
            histogram: views::turnout_histogram(&filtered),
            extremes: views::turnout_extremes(&filtered),
            map: choropleth::feature_collection(&filtered),
            bounds: choropleth::overall_bounds(&filtered),
            filtered,
        })
    }

    /// Sends the uploaded text to the insight client in the background.
    ///
    /// Returns the generation the answer is tied to.
    pub fn request_insights(&mut self, client: Arc<dyn InsightClient>) -> DashboardResult<u64> {
        let ds = self.dataset.as_ref().context(NoDatasetSnafu {})?;
        let csv_text = ds.csv_text.clone();
        let generation = self.generation;
        info!("Session: requesting insights for generation {}", generation);
        self.pending_insight = Some(Pending::spawn(generation, "insights", move || {
            client.generate(&csv_text)
        }));
        self.insight = InsightState::InProgress { generation };
        Ok(generation)
    }

    fn finish_load(
        &mut self,
        path: &str,
        res: Option<Result<Vec<u8>, std::io::Error>>,
    ) -> DashboardResult<()> {
        match res {
            Some(Ok(bytes)) => self.apply_csv(decode_text(path, bytes)),
            Some(Err(e)) => Err(e).context(OpeningCsvSnafu { path }),
            None => whatever!("Reading {} stopped unexpectedly", path),
        }
    }

    fn finish_insight(&mut self, res: Option<Result<String, InsightError>>) {
        self.insight = match res {
            Some(Ok(text)) => InsightState::Ready(text),
            Some(Err(e)) => {
                warn!("Session: insight request failed: {}", e);
                InsightState::Failed(e.to_string())
            }
            None => InsightState::Failed("The insight request stopped unexpectedly".to_string()),
        };
    }

    /// Applies the background results that are available, without blocking.
    ///
    /// Both slots are looked at even when loading the file failed.
    pub fn poll(&mut self) -> DashboardResult<()> {
        let mut load_res: DashboardResult<()> = Ok(());
        if let Some(load) = self.pending_load.take() {
            match load.task.poll() {
                TaskPoll::Waiting => self.pending_load = Some(load),
                _ if load.task.generation() != self.generation => {
                    debug!("Session::poll: dropping stale read of {}", load.path);
                }
                TaskPoll::Ready(res) => load_res = self.finish_load(&load.path, Some(res)),
                TaskPoll::Lost => load_res = self.finish_load(&load.path, None),
            }
        }
        if let Some(task) = self.pending_insight.take() {
            match task.poll() {
                TaskPoll::Waiting => self.pending_insight = Some(task),
                _ if task.generation() != self.generation => {
                    debug!(
                        "Session::poll: dropping insights of generation {}",
                        task.generation()
                    );
                }
                TaskPoll::Ready(res) => self.finish_insight(Some(res)),
                TaskPoll::Lost => self.finish_insight(None),
            }
        }
        load_res
    }

    /// Blocks until the background work of the current generation is done.
    ///
    /// Work started by older generations is dropped without waiting.
    pub fn wait(&mut self) -> DashboardResult<()> {
        let mut load_res: DashboardResult<()> = Ok(());
        if let Some(load) = self.pending_load.take() {
            if load.task.generation() == self.generation {
                let res = load.task.wait();
                load_res = self.finish_load(&load.path, res);
            } else {
                debug!("Session::wait: dropping stale read of {}", load.path);
            }
        }
        if let Some(task) = self.pending_insight.take() {
            if task.generation() == self.generation {
                let res = task.wait();
                self.finish_insight(res);
            } else {
                debug!(
                    "Session::wait: dropping insights of generation {}",
                    task.generation()
                );
            }
        }
        load_res
    }
}
