use chrono::{DateTime, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::Degradation;
use crate::model::{channel_values, has_channel, Channel, TelemetryRow, ERRONEOUS_LAP_NUMBER};
use crate::segmenter::LapSegmenter;
use crate::stats;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

/// Which field the normalized time was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeSource {
    MetaTime,
    Timestamp,
    RowIndex,
}

/// Seconds for a logger time string: RFC 3339, naive date-time (UTC) or a
/// bare number of seconds.
pub fn parse_time(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_micros() as f64 / 1e6);
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp_micros() as f64 / 1e6);
        }
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub struct SignalNormalizer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> SignalNormalizer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Fills `time` on every row and stable-sorts rows by it, unparseable
    /// times last.
    pub fn normalize_timestamps(
        &self,
        rows: &mut Vec<TelemetryRow>,
        notes: &mut Vec<Degradation>,
    ) -> TimeSource {
        let source = if rows.iter().any(|r| r.meta_time.is_some()) {
            TimeSource::MetaTime
        } else if rows.iter().any(|r| r.timestamp.is_some()) {
            TimeSource::Timestamp
        } else {
            TimeSource::RowIndex
        };

        let mut unparseable = 0usize;
        for (i, row) in rows.iter_mut().enumerate() {
            let raw = match source {
                TimeSource::MetaTime => row.meta_time.as_deref(),
                TimeSource::Timestamp => row.timestamp.as_deref(),
                TimeSource::RowIndex => {
                    row.time = Some(i as f64);
                    continue;
                }
            };
            row.time = raw.and_then(parse_time);
            if row.time.is_none() {
                unparseable += 1;
                notes.push(Degradation::UnparseableTimestamp {
                    row: i,
                    value: raw.unwrap_or_default().to_string(),
                });
            }
        }
        if unparseable > 0 {
            warn!("{} rows with unparseable timestamps sorted last", unparseable);
        }

        rows.sort_by(|a, b| match (a.time, b.time) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        debug!("normalized {} timestamps from {:?}", rows.len(), source);
        source
    }

    /// Overwrites only the rows flagged with the erroneous lap number, using
    /// the crossing rule over the distance channel. Returns rows fixed.
    pub fn clean_lap_numbers(&self, rows: &mut [TelemetryRow]) -> usize {
        if !rows.iter().any(|r| r.lap == Some(ERRONEOUS_LAP_NUMBER)) {
            return 0;
        }
        let detected = match LapSegmenter::new(self.config).detect(rows) {
            Some(ids) => ids,
            None => {
                warn!("erroneous lap numbers present but no distance channel to rebuild them");
                return 0;
            }
        };
        let mut fixed = 0;
        for (row, id) in rows.iter_mut().zip(detected) {
            if row.lap == Some(ERRONEOUS_LAP_NUMBER) {
                row.lap = Some(id);
                fixed += 1;
            }
        }
        info!("rebuilt {} erroneous lap numbers from lap distance", fixed);
        fixed
    }

    /// Blanks values more than `outlier_std` sample deviations from the
    /// channel mean. Row count is unchanged. Returns values blanked.
    pub fn filter_outliers(&self, rows: &mut [TelemetryRow], channels: &[Channel]) -> usize {
        let limit = self.config.thresholds.outlier_std;
        let mut blanked = 0;
        for &channel in channels {
            let values = channel_values(rows, channel);
            let (Some(m), Some(sd)) = (stats::mean(&values), stats::std_sample(&values)) else {
                continue;
            };
            if sd == 0.0 {
                continue;
            }
            for row in rows.iter_mut() {
                let slot = row.channel_mut(channel);
                if let Some(v) = *slot {
                    if ((v - m) / sd).abs() > limit {
                        *slot = None;
                        blanked += 1;
                    }
                }
            }
        }
        if blanked > 0 {
            debug!("blanked {} outlier values in {:?}", blanked, channels);
        }
        blanked
    }

    /// Time normalization, lap cleaning, then GPS outlier removal.
    pub fn preprocess(&self, rows: &mut Vec<TelemetryRow>, notes: &mut Vec<Degradation>) {
        self.normalize_timestamps(rows, notes);
        self.clean_lap_numbers(rows);
        if has_channel(rows, Channel::GpsLatitude) && has_channel(rows, Channel::GpsLongitude) {
            self.filter_outliers(rows, &[Channel::GpsLongitude, Channel::GpsLatitude]);
        }
    }
}
