//! Row-level derived channels and the lap / sector timing tables.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::{AnalysisConfig, WindowScope};
use crate::error::Degradation;
use crate::model::{
    has_channel, BrakingZone, Channel, Derived, LapRecord, SectorRecord, TelemetryRow,
    ThrottleZone,
};
use crate::stats;

/// Elapsed seconds between the first and last timed row of a group.
fn span(rows: &[&TelemetryRow]) -> Option<f64> {
    let mut times = rows.iter().filter_map(|r| r.time);
    let first = times.next()?;
    Some(times.last().unwrap_or(first) - first)
}

fn speeds(rows: &[&TelemetryRow]) -> Vec<f64> {
    rows.iter().filter_map(|r| r.speed).collect()
}

fn group_by_lap(rows: &[TelemetryRow]) -> BTreeMap<i64, Vec<&TelemetryRow>> {
    let mut groups: BTreeMap<i64, Vec<&TelemetryRow>> = BTreeMap::new();
    for row in rows {
        if let Some(lap) = row.clean_lap() {
            groups.entry(lap).or_default().push(row);
        }
    }
    groups
}

pub fn braking_zone(intensity: f64, cfg: &AnalysisConfig) -> BrakingZone {
    if intensity > cfg.thresholds.brake_heavy {
        BrakingZone::Heavy
    } else if intensity > cfg.thresholds.brake_light {
        BrakingZone::Light
    } else {
        BrakingZone::None
    }
}

pub fn throttle_zone(throttle: f64, cfg: &AnalysisConfig) -> ThrottleZone {
    if throttle > cfg.thresholds.throttle_full {
        ThrottleZone::Full
    } else if throttle > cfg.thresholds.throttle_partial {
        ThrottleZone::Partial
    } else {
        ThrottleZone::Off
    }
}

pub struct Aggregator<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Brake intensity per row: mean of front and rear pressure when both
    /// are present, else whichever is, else 0.
    pub fn braking_intensity(&self, rows: &[TelemetryRow]) -> Derived<Vec<f64>> {
        let required: &[Channel] = match (
            has_channel(rows, Channel::BrakeFront),
            has_channel(rows, Channel::BrakeRear),
        ) {
            (true, false) => &[Channel::BrakeFront],
            (false, true) => &[Channel::BrakeRear],
            _ => &[Channel::BrakeFront, Channel::BrakeRear],
        };
        Derived::require(rows, required, || {
            rows.iter()
                .map(|r| match (r.brake_front, r.brake_rear) {
                    (Some(f), Some(b)) => (f + b) / 2.0,
                    (Some(p), None) | (None, Some(p)) => p,
                    (None, None) => 0.0,
                })
                .collect()
        })
    }

    pub fn throttle_zones(&self, rows: &[TelemetryRow]) -> Derived<Vec<Option<ThrottleZone>>> {
        Derived::require(rows, &[Channel::Throttle], || {
            rows.iter()
                .map(|r| r.throttle.map(|t| throttle_zone(t, self.config)))
                .collect()
        })
    }

    pub fn g_force_combined(&self, rows: &[TelemetryRow]) -> Derived<Vec<Option<f64>>> {
        Derived::require(rows, &[Channel::AccelLongitudinal, Channel::AccelLateral], || {
            rows.iter()
                .map(|r| match (r.accel_longitudinal, r.accel_lateral) {
                    (Some(x), Some(y)) => Some((x * x + y * y).sqrt()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Rolling standard deviation of steering angle. With
    /// `WindowScope::PerLap` the window restarts at every lap id change.
    pub fn steering_smoothness(&self, rows: &[TelemetryRow]) -> Derived<Vec<Option<f64>>> {
        let window = self.config.thresholds.steering_window;
        Derived::require(rows, &[Channel::SteeringAngle], || {
            let angles: Vec<Option<f64>> = rows.iter().map(|r| r.steering_angle).collect();
            match self.config.thresholds.steering_scope {
                WindowScope::Session => stats::rolling_std(&angles, window),
                WindowScope::PerLap => {
                    let mut out = Vec::with_capacity(angles.len());
                    let mut start = 0;
                    while start < rows.len() {
                        let lap = rows[start].lap;
                        let end = rows[start..]
                            .iter()
                            .position(|r| r.lap != lap)
                            .map_or(rows.len(), |p| start + p);
                        out.extend(stats::rolling_std(&angles[start..end], window));
                        start = end;
                    }
                    out
                }
            }
        })
    }

    /// Writes all derived channels onto the rows; returns the channels that
    /// were missing.
    pub fn enrich(&self, rows: &mut [TelemetryRow]) -> Vec<Degradation> {
        let brake = self.braking_intensity(rows);
        let throttle = self.throttle_zones(rows);
        let g = self.g_force_combined(rows);
        let steering = self.steering_smoothness(rows);
        let mut missing: Vec<Channel> =
            [brake.missing(), throttle.missing(), g.missing(), steering.missing()].concat();

        let brake = brake.into_value();
        let throttle = throttle.into_value();
        let g = g.into_value();
        let steering = steering.into_value();
        for (i, row) in rows.iter_mut().enumerate() {
            let intensity = brake.as_ref().map_or(0.0, |b| b[i]);
            row.derived.brake_intensity = intensity;
            row.derived.braking_zone = Some(braking_zone(intensity, self.config));
            row.derived.throttle_zone = throttle.as_ref().and_then(|t| t[i]);
            row.derived.g_force_combined = g.as_ref().and_then(|v| v[i]);
            row.derived.steering_smoothness = steering.as_ref().and_then(|v| v[i]);
        }

        missing.sort();
        missing.dedup();
        missing
            .into_iter()
            .map(|channel| Degradation::MissingChannel { channel })
            .collect()
    }

    /// One record per lap in ascending order, with deltas filled.
    pub fn lap_times(&self, rows: &[TelemetryRow]) -> Vec<LapRecord> {
        let mut laps: Vec<LapRecord> = group_by_lap(rows)
            .into_iter()
            .map(|(lap, group)| {
                let speed = speeds(&group);
                LapRecord {
                    lap,
                    lap_time: span(&group),
                    records: group.len(),
                    avg_speed: stats::mean(&speed),
                    max_speed: stats::max(&speed),
                    delta_to_best: None,
                }
            })
            .collect();
        apply_lap_deltas(&mut laps);
        info!("aggregated {} laps", laps.len());
        laps
    }

    /// One record per (lap, sector) present in the data, restricted to the
    /// names in `sector_names`, with per-sector deltas filled.
    pub fn sector_times(&self, rows: &[TelemetryRow], sector_names: &[&str]) -> Vec<SectorRecord> {
        let mut records = Vec::new();
        for (lap, group) in group_by_lap(rows) {
            for &name in sector_names {
                let in_sector: Vec<&TelemetryRow> = group
                    .iter()
                    .copied()
                    .filter(|r| r.derived.sector.as_deref() == Some(name))
                    .collect();
                if in_sector.is_empty() {
                    continue;
                }
                records.push(SectorRecord {
                    lap,
                    sector: name.to_string(),
                    sector_time: span(&in_sector),
                    avg_speed: stats::mean(&speeds(&in_sector)),
                    delta_to_best: None,
                });
            }
        }
        apply_sector_deltas(&mut records);
        debug!("aggregated {} sector records", records.len());
        records
    }
}

/// `delta_to_best = lap_time - min(lap_time)`; untimed laps keep `None`.
pub fn apply_lap_deltas(laps: &mut [LapRecord]) {
    let times: Vec<f64> = laps.iter().filter_map(|l| l.lap_time).collect();
    let Some(best) = stats::min(&times) else { return };
    for lap in laps.iter_mut() {
        lap.delta_to_best = lap.lap_time.map(|t| t - best);
    }
}

/// Deltas against the best time of the same sector name.
pub fn apply_sector_deltas(records: &mut [SectorRecord]) {
    let mut best: BTreeMap<String, f64> = BTreeMap::new();
    for r in records.iter() {
        if let Some(t) = r.sector_time {
            best.entry(r.sector.clone())
                .and_modify(|b| *b = b.min(t))
                .or_insert(t);
        }
    }
    for r in records.iter_mut() {
        r.delta_to_best = match (r.sector_time, best.get(&r.sector)) {
            (Some(t), Some(b)) => Some(t - b),
            _ => None,
        };
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LapSummary {
    pub lap: i64,
    pub records: usize,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub lap_time: Option<f64>,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub min_speed: Option<f64>,
    pub avg_throttle: Option<f64>,
    pub full_throttle_pct: Option<f64>,
    pub avg_brake: Option<f64>,
    pub max_brake: Option<f64>,
    pub max_accel_g: Option<f64>,
    pub max_decel_g: Option<f64>,
    pub max_lateral_g: Option<f64>,
}

/// Detail for one lap; `None` when the lap has no rows.
pub fn lap_summary(
    rows: &[TelemetryRow],
    lap: i64,
    cfg: &AnalysisConfig,
) -> Option<LapSummary> {
    let group: Vec<&TelemetryRow> = rows.iter().filter(|r| r.clean_lap() == Some(lap)).collect();
    if group.is_empty() {
        return None;
    }
    let times: Vec<f64> = group.iter().filter_map(|r| r.time).collect();
    let speed = speeds(&group);
    let throttle: Vec<f64> = group.iter().filter_map(|r| r.throttle).collect();
    let brake: Vec<f64> = group.iter().map(|r| r.derived.brake_intensity).collect();
    let accel_x: Vec<f64> = group.iter().filter_map(|r| r.accel_longitudinal).collect();
    let accel_y: Vec<f64> = group.iter().filter_map(|r| r.accel_lateral.map(f64::abs)).collect();
    let brake_present = has_channel(rows, Channel::BrakeFront) || has_channel(rows, Channel::BrakeRear);

    let full_throttle_pct = (!throttle.is_empty()).then(|| {
        let full = throttle.iter().filter(|t| **t > cfg.thresholds.throttle_full).count();
        full as f64 / group.len() as f64 * 100.0
    });

    Some(LapSummary {
        lap,
        records: group.len(),
        start_time: times.first().copied(),
        end_time: times.last().copied(),
        lap_time: span(&group),
        avg_speed: stats::mean(&speed),
        max_speed: stats::max(&speed),
        min_speed: stats::min(&speed),
        avg_throttle: stats::mean(&throttle),
        full_throttle_pct,
        avg_brake: brake_present.then(|| stats::mean(&brake)).flatten(),
        max_brake: brake_present.then(|| stats::max(&brake)).flatten(),
        max_accel_g: stats::max(&accel_x),
        max_decel_g: stats::min(&accel_x),
        max_lateral_g: stats::max(&accel_y),
    })
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total_records: usize,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub total_laps: Option<i64>,
    pub unique_laps: usize,
}

pub fn session_summary(rows: &[TelemetryRow]) -> SessionSummary {
    let times: Vec<f64> = rows.iter().filter_map(|r| r.time).collect();
    let start_time = stats::min(&times);
    let end_time = stats::max(&times);
    let groups = group_by_lap(rows);
    SessionSummary {
        total_records: rows.len(),
        start_time,
        end_time,
        duration_seconds: start_time.zip(end_time).map(|(s, e)| e - s),
        total_laps: groups.keys().next_back().copied(),
        unique_laps: groups.len(),
    }
}
