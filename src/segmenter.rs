//! Lap boundary detection from the lap distance signal.
//!
//! A crossing is declared at row `i` when the car was near the end of the
//! lap at row `i - 1` and is near the start at row `i`. "Near" is
//! `lap_distance` metres from the line, measured against the longest distance
//! seen in the session. The crossing row opens the new lap.

use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::Degradation;
use crate::model::{has_channel, Channel, TelemetryRow, ERRONEOUS_LAP_NUMBER};

/// `true` at every row that starts a new lap.
pub fn detect_crossings(distance: &[Option<f64>], threshold: f64) -> Vec<bool> {
    let max_distance = match distance.iter().flatten().copied().reduce(f64::max) {
        Some(m) => m,
        None => return vec![false; distance.len()],
    };
    let near_end = max_distance - threshold;

    let mut crossings = vec![false; distance.len()];
    for i in 1..distance.len() {
        if let (Some(prev), Some(cur)) = (distance[i - 1], distance[i]) {
            crossings[i] = cur < threshold && prev > near_end;
        }
    }
    crossings
}

/// Lap id for every row: 1 plus the crossings seen up to and including it.
pub fn lap_ids(distance: &[Option<f64>], threshold: f64) -> Vec<i64> {
    let mut lap = 1;
    detect_crossings(distance, threshold)
        .into_iter()
        .map(|crossed| {
            if crossed {
                lap += 1;
            }
            lap
        })
        .collect()
}

/// Gives every row without a clean lap an id taken from the trusted rows
/// around it: the previous trusted lap plus any crossings since, capped at
/// the next trusted lap so ids never step backwards. Rows ahead of the first
/// trusted lap count back from it. With no trusted lap at all, the detected
/// id (or 1) is used. Returns rows filled.
fn fill_from_trusted(rows: &mut [TelemetryRow], detected: Option<&[i64]>) -> usize {
    let trusted: Vec<Option<i64>> = rows.iter().map(|r| r.clean_lap()).collect();
    let crossings = |from: usize, to: usize| detected.map_or(0, |d| d[to] - d[from]);

    let mut next_trusted = vec![None; rows.len()];
    let mut upcoming = None;
    for i in (0..rows.len()).rev() {
        if let Some(lap) = trusted[i] {
            upcoming = Some((i, lap));
        }
        next_trusted[i] = upcoming;
    }

    let mut prev: Option<(usize, i64)> = None;
    let mut filled = 0;
    for (i, row) in rows.iter_mut().enumerate() {
        if let Some(lap) = trusted[i] {
            prev = Some((i, lap));
            continue;
        }
        let lap = match (prev, next_trusted[i]) {
            (Some((p, pl)), Some((_, nl))) => (pl + crossings(p, i)).min(nl),
            (Some((p, pl)), None) => pl + crossings(p, i),
            (None, Some((n, nl))) => (nl - crossings(i, n)).max(1),
            (None, None) => detected.map_or(1, |d| d[i]),
        };
        row.lap = Some(lap);
        filled += 1;
    }
    filled
}

pub struct LapSegmenter<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> LapSegmenter<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Lap ids detected from the distance channel, or `None` without one.
    pub fn detect(&self, rows: &[TelemetryRow]) -> Option<Vec<i64>> {
        if !has_channel(rows, Channel::LapDistance) {
            return None;
        }
        let distance: Vec<Option<f64>> = rows.iter().map(|r| r.lap_distance).collect();
        Some(lap_ids(&distance, self.config.thresholds.lap_distance))
    }

    /// Assigns a clean lap id to every row. Rows are expected in time order.
    pub fn segment(&self, rows: &mut [TelemetryRow], notes: &mut Vec<Degradation>) {
        let has_lap_column = rows.iter().any(|r| r.lap.is_some());

        let detected = match self.detect(rows) {
            Some(ids) => ids,
            None => {
                notes.push(Degradation::MissingChannel { channel: Channel::LapDistance });
                let filled = fill_from_trusted(rows, None);
                warn!(
                    "no {} channel; trusting source laps, {} rows filled from neighbours",
                    Channel::LapDistance,
                    filled
                );
                return;
            }
        };

        let has_sentinel = rows.iter().any(|r| r.lap == Some(ERRONEOUS_LAP_NUMBER));
        if !has_lap_column || has_sentinel {
            for (row, id) in rows.iter_mut().zip(&detected) {
                row.lap = Some(*id);
            }
            info!(
                "lap column {}; using {} detected laps",
                if has_lap_column { "carries erroneous laps" } else { "absent" },
                detected.last().copied().unwrap_or(1)
            );
            return;
        }

        let filled = fill_from_trusted(rows, Some(detected.as_slice()));
        debug!("trusted source lap ids; filled {} rows from neighbours", filled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distances(laps: usize, per_lap: usize, length: f64) -> Vec<Option<f64>> {
        let step = length / per_lap as f64;
        (0..laps * per_lap)
            .map(|i| Some((i % per_lap) as f64 * step + 1.0))
            .collect()
    }

    fn rows_from(distance: &[Option<f64>], lap: Option<i64>) -> Vec<TelemetryRow> {
        distance
            .iter()
            .map(|d| TelemetryRow { lap_distance: *d, lap, ..Default::default() })
            .collect()
    }

    #[test]
    fn test_three_laps_detected() {
        let d = distances(3, 24, 2400.0);
        let ids = lap_ids(&d, 100.0);
        assert_eq!(ids[0], 1);
        assert_eq!(ids[23], 1);
        assert_eq!(ids[24], 2);
        assert_eq!(ids[71], 3);
        assert!(ids.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_first_row_never_crosses() {
        let d = vec![Some(5.0), Some(10.0)];
        assert_eq!(detect_crossings(&d, 100.0), vec![false, false]);
    }

    #[test]
    fn test_missing_distance_does_not_cross() {
        let d = vec![Some(2350.0), None, Some(10.0), Some(2390.0), Some(4.0)];
        assert_eq!(lap_ids(&d, 100.0), vec![1, 1, 1, 1, 2]);
    }

    #[test]
    fn test_sentinel_replaces_whole_column() {
        let cfg = AnalysisConfig::default();
        let d = distances(2, 24, 2400.0);
        let mut rows = rows_from(&d, Some(7));
        rows[30].lap = Some(ERRONEOUS_LAP_NUMBER);
        let mut notes = Vec::new();
        LapSegmenter::new(&cfg).segment(&mut rows, &mut notes);
        assert_eq!(rows[0].lap, Some(1));
        assert_eq!(rows[30].lap, Some(2));
        assert!(notes.is_empty());
    }

    #[test]
    fn test_clean_source_laps_are_trusted() {
        let cfg = AnalysisConfig::default();
        let d = distances(2, 24, 2400.0);
        let mut rows = rows_from(&d, Some(7));
        rows[3].lap = None;
        let mut notes = Vec::new();
        LapSegmenter::new(&cfg).segment(&mut rows, &mut notes);
        assert_eq!(rows[0].lap, Some(7));
        assert_eq!(rows[40].lap, Some(7));
        assert_eq!(rows[3].lap, Some(7));
    }

    #[test]
    fn test_gap_inside_numbered_laps_keeps_its_lap() {
        let cfg = AnalysisConfig::default();
        let d = distances(3, 24, 2400.0);
        let mut rows = rows_from(&d, None);
        for (i, row) in rows.iter_mut().enumerate() {
            row.lap = Some(5 + (i / 24) as i64);
        }
        rows[30].lap = None;
        rows[48].lap = Some(0);
        rows[0].lap = None;
        let mut notes = Vec::new();
        LapSegmenter::new(&cfg).segment(&mut rows, &mut notes);
        assert_eq!(rows[30].lap, Some(6));
        // a dropout on the crossing row still opens the new lap
        assert_eq!(rows[48].lap, Some(7));
        assert_eq!(rows[0].lap, Some(5));
        assert!(rows.windows(2).all(|w| w[0].lap <= w[1].lap));
    }

    #[test]
    fn test_no_distance_fills_from_source_laps() {
        let cfg = AnalysisConfig::default();
        let mut rows = vec![
            TelemetryRow { lap: Some(3), ..Default::default() },
            TelemetryRow { lap: Some(ERRONEOUS_LAP_NUMBER), ..Default::default() },
            TelemetryRow::default(),
        ];
        let mut notes = Vec::new();
        LapSegmenter::new(&cfg).segment(&mut rows, &mut notes);
        let laps: Vec<_> = rows.iter().map(|r| r.lap).collect();
        assert_eq!(laps, vec![Some(3), Some(3), Some(3)]);
        assert_eq!(
            notes,
            vec![Degradation::MissingChannel { channel: Channel::LapDistance }]
        );

        let mut unlabelled = vec![TelemetryRow::default(); 4];
        LapSegmenter::new(&cfg).segment(&mut unlabelled, &mut notes);
        assert!(unlabelled.iter().all(|r| r.lap == Some(1)));
    }
}
