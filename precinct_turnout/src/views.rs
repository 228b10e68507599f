//! Chart data derived from a filtered set of records.

use log::debug;

use crate::config::*;

/// Number of equal-width brackets in the turnout histogram.
pub const HISTOGRAM_BINS: usize = 10;

/// Number of precincts on each side of the extremes chart.
pub const EXTREMES_COUNT: usize = 5;

/// Counts the precincts in each 10% turnout bracket.
///
/// Precincts above 100% turnout fall outside of every bracket and are not
/// counted. An empty input gives an empty histogram rather than ten empty bins.
pub fn turnout_histogram(records: &[&PrecinctRecord]) -> Vec<HistogramBin> {
    if records.is_empty() {
        return Vec::new();
    }
    let width = 100 / HISTOGRAM_BINS;
    let mut bins: Vec<HistogramBin> = (0..HISTOGRAM_BINS)
        .map(|i| HistogramBin {
            label: format!("{}-{}%", i * width, (i + 1) * width),
            count: 0,
        })
        .collect();

    for r in records.iter() {
        let percent = r.turnout * 100.0;
        let idx = (percent / width as f64).floor();
        if idx >= 0.0 && idx < HISTOGRAM_BINS as f64 {
            bins[idx as usize].count += 1;
        } else if percent == 100.0 {
            bins[HISTOGRAM_BINS - 1].count += 1;
        } else {
            debug!(
                "turnout_histogram: {} with turnout {:?} is outside of the histogram",
                r.precinct_id, r.turnout
            );
        }
    }
    bins
}

/// The precincts with the highest and lowest turnout.
///
/// Ties keep the order of the input. With fewer than `EXTREMES_COUNT` records,
/// both sides contain all of them.
pub fn turnout_extremes(records: &[&PrecinctRecord]) -> Extremes {
    let mut sorted: Vec<&PrecinctRecord> = records.to_vec();
    sorted.sort_by(|a, b| a.turnout.total_cmp(&b.turnout));

    let entry = |r: &&PrecinctRecord| ExtremeEntry {
        precinct_id: r.precinct_id.clone(),
        turnout_percent: r.turnout * 100.0,
    };
    let bottom: Vec<ExtremeEntry> = sorted.iter().take(EXTREMES_COUNT).map(entry).collect();
    let top: Vec<ExtremeEntry> = sorted
        .iter()
        .rev()
        .take(EXTREMES_COUNT)
        .map(entry)
        .collect();
    Extremes { top, bottom }
}

/// The turnout as the percentage shown next to the bars, for example "80.0%".
pub fn format_percent(turnout_percent: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, turnout_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record(id: &str, registered: u64, votes: u64) -> PrecinctRecord {
        PrecinctRecord {
            precinct_id: id.to_string(),
            total_registered_voters: registered,
            votes_cast: votes,
            turnout: crate::compute_turnout(votes, registered),
            boundary: Boundary(json!({"type": "Polygon", "coordinates": []})),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn histogram_brackets() {
        let rs = vec![record("P1", 100, 80), record("P2", 50, 10)];
        let refs: Vec<&PrecinctRecord> = rs.iter().collect();
        let bins = turnout_histogram(&refs);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0].label, "0-10%");
        assert_eq!(bins[9].label, "90-100%");
        assert_eq!(bins[8].label, "80-90%");
        assert_eq!(bins[8].count, 1);
        assert_eq!(bins[2].label, "20-30%");
        assert_eq!(bins[2].count, 1);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u64>(), 2);
    }

    #[test]
    fn histogram_edges() {
        let rs = vec![
            record("full", 10, 10),
            record("over", 10, 12),
            record("none", 0, 0),
        ];
        let refs: Vec<&PrecinctRecord> = rs.iter().collect();
        let bins = turnout_histogram(&refs);
        assert_eq!(bins[9].count, 1);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u64>(), 2);
    }

    #[test]
    fn histogram_empty() {
        assert!(turnout_histogram(&[]).is_empty());
    }

    #[test]
    fn extremes_with_few_records() {
        let rs = vec![record("P1", 100, 80), record("P2", 50, 10)];
        let refs: Vec<&PrecinctRecord> = rs.iter().collect();
        let ex = turnout_extremes(&refs);
        let top: Vec<&str> = ex.top.iter().map(|e| e.precinct_id.as_str()).collect();
        let bottom: Vec<&str> = ex.bottom.iter().map(|e| e.precinct_id.as_str()).collect();
        assert_eq!(top, vec!["P1", "P2"]);
        assert_eq!(bottom, vec!["P2", "P1"]);
        assert_eq!(ex.top[0].turnout_percent, 80.0);
    }

    #[test]
    fn extremes_keep_five_each() {
        let rs: Vec<PrecinctRecord> = (0..12)
            .map(|i| record(&format!("P{:02}", i), 100, (i * 7) % 100))
            .collect();
        let refs: Vec<&PrecinctRecord> = rs.iter().collect();
        let ex = turnout_extremes(&refs);
        assert_eq!(ex.top.len(), 5);
        assert_eq!(ex.bottom.len(), 5);
        assert!(ex.top.windows(2).all(|w| w[0].turnout_percent >= w[1].turnout_percent));
        assert!(ex.bottom.windows(2).all(|w| w[0].turnout_percent <= w[1].turnout_percent));
        assert_eq!(ex.bottom[0].precinct_id, "P00");
    }

    #[test]
    fn extremes_empty() {
        assert_eq!(turnout_extremes(&[]), Extremes::default());
    }

    #[test]
    fn percent_text() {
        assert_eq!(format_percent(80.0, 1), "80.0%");
        assert_eq!(format_percent(33.3333, 2), "33.33%");
    }
}
