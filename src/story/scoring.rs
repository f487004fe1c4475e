//! Heuristic scores computed from the lap and sector tables.

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::model::{has_channel, Channel, Derived, LapRecord, SectorRecord, TelemetryRow};
use crate::stats::{self, round_to};

/// Slope magnitude (s/lap) separating a trend from noise.
const TREND_SLOPE: f64 = 0.1;
/// Single-lap gain (s) that counts as a breakthrough.
const BREAKTHROUGH_GAIN: f64 = 0.3;
const STINT_LAPS: usize = 3;
/// Sector gaps below this (s) are left out of the optimal-lap breakdown.
const MEANINGFUL_GAP: f64 = 0.05;
const STRENGTH_RANGE: f64 = 0.1;
const NEUTRAL_RANGE: f64 = 0.3;
/// Peak brake pressure (bar) worth calling out in a breakthrough.
const AGGRESSIVE_BRAKE_BAR: f64 = 70.0;

/// Timed laps as (lap, lap_time) in lap order.
pub(crate) fn timed_laps(laps: &[LapRecord]) -> Vec<(i64, f64)> {
    let mut timed: Vec<(i64, f64)> = laps
        .iter()
        .filter_map(|l| l.lap_time.map(|t| (l.lap, t)))
        .collect();
    timed.sort_by_key(|(lap, _)| *lap);
    timed
}

/// First lap holding the minimum time.
fn best_lap(timed: &[(i64, f64)]) -> Option<(i64, f64)> {
    timed.iter().copied().fold(None, |best, cur| match best {
        Some((_, t)) if t <= cur.1 => best,
        _ => Some(cur),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Consistent,
    InsufficientData,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FastestStint {
    pub start_lap: i64,
    pub end_lap: i64,
    pub avg_time: f64,
    pub laps: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerformanceTrajectory {
    pub trend: Trend,
    pub narrative: String,
    pub slope: f64,
    pub improvement_rate: f64,
    pub fastest_stint: Option<FastestStint>,
}

/// Lowest-mean run of three consecutive laps; earliest wins ties.
pub fn fastest_stint(laps: &[LapRecord]) -> Option<FastestStint> {
    let timed = timed_laps(laps);
    let mut best: Option<FastestStint> = None;
    for window in timed.windows(STINT_LAPS) {
        let avg = window.iter().map(|(_, t)| t).sum::<f64>() / STINT_LAPS as f64;
        if best.as_ref().map_or(true, |b| avg < b.avg_time) {
            best = Some(FastestStint {
                start_lap: window[0].0,
                end_lap: window[STINT_LAPS - 1].0,
                avg_time: avg,
                laps: STINT_LAPS,
            });
        }
    }
    best
}

pub fn performance_trajectory(laps: &[LapRecord]) -> PerformanceTrajectory {
    let timed = timed_laps(laps);
    if timed.len() < 3 {
        return PerformanceTrajectory {
            trend: Trend::InsufficientData,
            narrative: "Not enough laps for trend analysis.".to_string(),
            slope: 0.0,
            improvement_rate: 0.0,
            fastest_stint: None,
        };
    }

    let xs: Vec<f64> = timed.iter().map(|(lap, _)| *lap as f64).collect();
    let ys: Vec<f64> = timed.iter().map(|(_, t)| *t).collect();
    let slope = stats::linear_slope(&xs, &ys).unwrap_or(0.0);

    let (trend, description) = if slope < -TREND_SLOPE {
        (Trend::Improving, "consistent improvement")
    } else if slope > TREND_SLOPE {
        (Trend::Declining, "gradual decline")
    } else {
        (Trend::Consistent, "steady consistency")
    };
    let improvement_rate = slope.abs();
    let stint = fastest_stint(laps);

    let mut narrative = format!("Across {} laps, the session showed {}", timed.len(), description);
    if improvement_rate > TREND_SLOPE {
        narrative.push_str(&format!(" at {:.3}s per lap", improvement_rate));
    }
    if let Some(s) = &stint {
        narrative.push_str(&format!(
            ". Peak performance occurred during laps {}-{}",
            s.start_lap, s.end_lap
        ));
    }
    narrative.push('.');

    PerformanceTrajectory {
        trend,
        narrative,
        slope,
        improvement_rate,
        fastest_stint: stint,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentKind {
    Breakthrough,
    BestLap,
}

/// What the driver did differently on a given lap.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LapChanges {
    pub max_brake_pressure: Option<f64>,
    pub avg_brake_pressure: Option<f64>,
    pub full_throttle_pct: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BreakthroughMoment {
    pub lap: i64,
    #[serde(rename = "type")]
    pub kind: MomentKind,
    pub improvement: f64,
    pub narrative: String,
    pub changes: Option<LapChanges>,
    pub impact: String,
}

pub fn lap_changes(telemetry: &[TelemetryRow], lap: i64, cfg: &AnalysisConfig) -> LapChanges {
    let rows: Vec<&TelemetryRow> = telemetry.iter().filter(|r| r.clean_lap() == Some(lap)).collect();
    if rows.is_empty() {
        return LapChanges::default();
    }
    let mut changes = LapChanges::default();
    if has_channel(telemetry, Channel::BrakeFront) || has_channel(telemetry, Channel::BrakeRear) {
        let brake: Vec<f64> = rows.iter().map(|r| r.derived.brake_intensity).collect();
        changes.max_brake_pressure = stats::max(&brake);
        changes.avg_brake_pressure = stats::mean(&brake);
    }
    if has_channel(telemetry, Channel::Throttle) {
        let full = rows
            .iter()
            .filter(|r| r.throttle.is_some_and(|t| t > cfg.thresholds.throttle_full))
            .count();
        changes.full_throttle_pct = Some(full as f64 / rows.len() as f64 * 100.0);
    }
    changes
}

/// First lap gaining more than 0.3 s on its predecessor; otherwise the
/// session's best lap. `None` with fewer than two timed laps.
pub fn breakthrough_moment(
    laps: &[LapRecord],
    telemetry: &[TelemetryRow],
    cfg: &AnalysisConfig,
) -> Option<BreakthroughMoment> {
    let timed = timed_laps(laps);
    if timed.len() < 2 {
        return None;
    }

    let first = timed.windows(2).find_map(|pair| {
        let improvement = pair[0].1 - pair[1].1;
        (improvement > BREAKTHROUGH_GAIN).then_some((pair[1].0, improvement))
    });

    match first {
        Some((lap, improvement)) => {
            let changes = lap_changes(telemetry, lap, cfg);
            let mut narrative =
                format!("Breakthrough at Lap {} with {:.3}s improvement", lap, improvement);
            if let Some(peak) = changes.max_brake_pressure.filter(|p| *p > AGGRESSIVE_BRAKE_BAR) {
                narrative.push_str(&format!(". Aggressive braking ({:.0} bar peak)", peak));
            }
            narrative.push_str(" unlocked new pace level.");
            Some(BreakthroughMoment {
                lap,
                kind: MomentKind::Breakthrough,
                improvement,
                narrative,
                changes: Some(changes),
                impact: format!("Gained {:.3}s in single lap.", improvement),
            })
        }
        None => {
            let (lap, time) = best_lap(&timed)?;
            Some(BreakthroughMoment {
                lap,
                kind: MomentKind::BestLap,
                improvement: 0.0,
                narrative: format!("Best lap achieved on Lap {} with a time of {:.3}s.", lap, time),
                changes: None,
                impact: "Set session benchmark.".to_string(),
            })
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConsistencyScore {
    pub score: f64,
    pub rating: &'static str,
    pub std_dev: f64,
    pub range: f64,
    pub coefficient_of_variation: f64,
}

/// Piecewise map from coefficient of variation (%) to a 0-10 score.
pub fn score_from_cv(cv: f64) -> f64 {
    if cv < 0.5 {
        10.0
    } else if cv < 2.0 {
        10.0 - (cv - 0.5) * (2.5 / 1.5)
    } else if cv < 10.0 {
        7.5 - (cv - 2.0) * (5.0 / 8.0)
    } else {
        (2.5 - (cv - 10.0) * (2.5 / 5.0)).max(0.0)
    }
}

pub fn consistency_rating(score: f64) -> &'static str {
    if score >= 8.5 {
        "Excellent"
    } else if score >= 7.0 {
        "Very Good"
    } else if score >= 5.5 {
        "Good"
    } else if score >= 4.0 {
        "Fair"
    } else {
        "Needs Improvement"
    }
}

pub fn consistency_score(laps: &[LapRecord]) -> ConsistencyScore {
    let times: Vec<f64> = timed_laps(laps).into_iter().map(|(_, t)| t).collect();
    let summary = (
        stats::mean(&times),
        stats::std_population(&times),
        stats::min(&times),
        stats::max(&times),
    );
    match summary {
        (Some(mean), Some(std_dev), Some(lo), Some(hi)) if times.len() >= 3 && mean > 0.0 => {
            let cv = std_dev / mean * 100.0;
            let score = score_from_cv(cv);
            ConsistencyScore {
                score: round_to(score, 1),
                rating: consistency_rating(score),
                std_dev: round_to(std_dev, 3),
                range: round_to(hi - lo, 3),
                coefficient_of_variation: round_to(cv, 2),
            }
        }
        _ => ConsistencyScore {
            score: 0.0,
            rating: "N/A",
            std_dev: 0.0,
            range: 0.0,
            coefficient_of_variation: 0.0,
        },
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RiskComponents {
    pub braking_aggression: Derived<f64>,
    pub throttle_aggression: Derived<f64>,
    pub corner_variance: Derived<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RiskIndex {
    pub score: f64,
    pub rating: &'static str,
    pub components: RiskComponents,
}

/// Component value used when its source channel is missing.
const NEUTRAL_COMPONENT: f64 = 5.0;

pub fn risk_rating(score: f64) -> &'static str {
    if score >= 8.0 {
        "Very Aggressive"
    } else if score >= 6.5 {
        "Aggressive"
    } else if score >= 5.0 {
        "Balanced"
    } else if score >= 3.5 {
        "Conservative"
    } else {
        "Very Conservative"
    }
}

fn pct_of_rows(rows: &[TelemetryRow], pred: impl Fn(&TelemetryRow) -> bool) -> f64 {
    rows.iter().filter(|r| pred(r)).count() as f64 / rows.len() as f64 * 100.0
}

/// Weighted blend of braking (40%), throttle (30%) and speed variance (30%).
pub fn risk_index(telemetry: &[TelemetryRow], cfg: &AnalysisConfig) -> RiskIndex {
    let braking_aggression =
        if has_channel(telemetry, Channel::BrakeFront) || has_channel(telemetry, Channel::BrakeRear) {
            let heavy = pct_of_rows(telemetry, |r| r.derived.brake_intensity > cfg.thresholds.brake_heavy);
            Derived::Computed { value: (heavy * 2.0).min(10.0) }
        } else {
            Derived::Unavailable { missing: vec![Channel::BrakeFront, Channel::BrakeRear] }
        };
    let throttle_aggression = Derived::require(telemetry, &[Channel::Throttle], || {
        let full = pct_of_rows(telemetry, |r| {
            r.throttle.is_some_and(|t| t > cfg.thresholds.throttle_full)
        });
        (full / 5.0).min(10.0)
    });
    let corner_variance = Derived::require(telemetry, &[Channel::Speed], || {
        let speed: Vec<f64> = telemetry.iter().filter_map(|r| r.speed).collect();
        match (stats::std_sample(&speed), stats::mean(&speed)) {
            (Some(sd), Some(m)) if m != 0.0 => (sd / m * 100.0 / 2.0).min(10.0),
            _ => 0.0,
        }
    });

    let components = RiskComponents {
        braking_aggression,
        throttle_aggression,
        corner_variance,
    };
    if telemetry.is_empty() {
        return RiskIndex { score: 0.0, rating: "N/A", components };
    }

    let part = |d: &Derived<f64>| d.value().copied().unwrap_or(NEUTRAL_COMPONENT);
    let score = part(&components.braking_aggression) * 0.4
        + part(&components.throttle_aggression) * 0.3
        + part(&components.corner_variance) * 0.3;
    RiskIndex {
        score: round_to(score, 1),
        rating: risk_rating(score),
        components,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorPerformance {
    Strength,
    Neutral,
    Weakness,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectorInsight {
    pub sector: String,
    pub performance: SectorPerformance,
    pub consistency: &'static str,
    pub best_time: f64,
    pub worst_time: f64,
    pub avg_time: f64,
    pub range: f64,
    pub narrative: String,
}

/// Timed sector records grouped by name, in order of first appearance.
pub(crate) fn sector_groups(sectors: &[SectorRecord]) -> Vec<(&str, Vec<&SectorRecord>)> {
    let mut groups: Vec<(&str, Vec<&SectorRecord>)> = Vec::new();
    for record in sectors.iter().filter(|s| s.sector_time.is_some()) {
        match groups.iter_mut().find(|(name, _)| *name == record.sector) {
            Some((_, members)) => members.push(record),
            None => groups.push((record.sector.as_str(), vec![record])),
        }
    }
    groups
}

/// One insight per sector, largest time range first. The first entry is the
/// sector most worth working on.
pub fn sector_insights(sectors: &[SectorRecord]) -> Vec<SectorInsight> {
    let mut insights: Vec<SectorInsight> = sector_groups(sectors)
        .into_iter()
        .filter_map(|(name, members)| {
            let times: Vec<f64> = members.iter().filter_map(|r| r.sector_time).collect();
            let best = stats::min(&times)?;
            let worst = stats::max(&times)?;
            let avg = stats::mean(&times)?;
            let range = worst - best;

            let (performance, consistency, narrative) = if range < STRENGTH_RANGE {
                (
                    SectorPerformance::Strength,
                    "excellent",
                    format!("{} is a strength with excellent consistency (range: {:.3}s).", name, range),
                )
            } else if range < NEUTRAL_RANGE {
                (
                    SectorPerformance::Neutral,
                    "good",
                    format!("{} shows good performance with moderate consistency.", name),
                )
            } else {
                (
                    SectorPerformance::Weakness,
                    "inconsistent",
                    format!(
                        "{} shows inconsistency with a {:.3}s range, suggesting improvement potential.",
                        name, range
                    ),
                )
            };

            Some(SectorInsight {
                sector: name.to_string(),
                performance,
                consistency,
                best_time: best,
                worst_time: worst,
                avg_time: avg,
                range,
                narrative,
            })
        })
        .collect();
    insights.sort_by(|a, b| b.range.total_cmp(&a.range));
    insights
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectorGap {
    pub sector: String,
    pub gap: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimalLap {
    pub optimal_time: Option<f64>,
    pub actual_best: Option<f64>,
    /// `actual_best - optimal_time`; may be negative when the best sectors
    /// come from laps run in different conditions.
    pub potential_gain: f64,
    pub gap_breakdown: Vec<SectorGap>,
    pub narrative: String,
}

/// Theoretical lap built from the best time in every sector.
pub fn optimal_lap(laps: &[LapRecord], sectors: &[SectorRecord]) -> OptimalLap {
    let groups = sector_groups(sectors);
    let best = best_lap(&timed_laps(laps));
    let (Some((best_lap_no, actual_best)), false) = (best, groups.is_empty()) else {
        return OptimalLap {
            optimal_time: None,
            actual_best: None,
            potential_gain: 0.0,
            gap_breakdown: Vec::new(),
            narrative: "Insufficient data for optimal lap calculation.".to_string(),
        };
    };

    let mut optimal_time = 0.0;
    let mut gap_breakdown = Vec::new();
    for (name, members) in &groups {
        let times: Vec<f64> = members.iter().filter_map(|r| r.sector_time).collect();
        let Some(sector_best) = stats::min(&times) else { continue };
        optimal_time += sector_best;

        let on_best_lap = members
            .iter()
            .find(|r| r.lap == best_lap_no)
            .and_then(|r| r.sector_time);
        if let Some(t) = on_best_lap {
            let gap = t - sector_best;
            if gap > MEANINGFUL_GAP {
                gap_breakdown.push(SectorGap { sector: name.to_string(), gap });
            }
        }
    }
    gap_breakdown.sort_by(|a, b| b.gap.total_cmp(&a.gap));

    let potential_gain = actual_best - optimal_time;
    let narrative = if potential_gain > 0.1 {
        format!(
            "Optimal lap: {:.3}s vs. actual best {:.3}s. Potential gain: {:.3}s.",
            optimal_time, actual_best, potential_gain
        )
    } else {
        format!(
            "Excellent lap construction. Optimal lap ({:.3}s) nearly achieved.",
            optimal_time
        )
    };

    OptimalLap {
        optimal_time: Some(round_to(optimal_time, 3)),
        actual_best: Some(round_to(actual_best, 3)),
        potential_gain: round_to(potential_gain, 3),
        gap_breakdown,
        narrative,
    }
}

/// Up to three coaching notes, in rule order.
pub fn recommendations(
    insights: &[SectorInsight],
    consistency: &ConsistencyScore,
    risk: &RiskIndex,
    trajectory: &PerformanceTrajectory,
) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(worst) = insights.first().filter(|w| w.range > NEUTRAL_RANGE) {
        out.push(format!(
            "Focus on {} consistency - current range of {:.3}s suggests improvement potential of ~{:.3}s.",
            worst.sector,
            worst.range,
            worst.range * 0.6
        ));
    }

    if consistency.score < 7.0 {
        out.push(format!(
            "Work on consistency - current score {:.1}/10. Reducing lap time variation from {:.3}s to < 0.3s would improve racecraft significantly.",
            consistency.score, consistency.range
        ));
    }

    if risk.score >= 8.0 && consistency.score < 6.0 {
        out.push(
            "Aggressive driving style detected with lower consistency. Consider slightly reducing risk for better overall pace."
                .to_string(),
        );
    } else if risk.score < 4.0 {
        out.push(
            "Conservative approach noted. Exploring limits in practice could unlock additional pace."
                .to_string(),
        );
    }

    if trajectory.trend == Trend::Declining {
        out.push(
            "Pace declining over session - review tire management or consider earlier sessions for peak performance data."
                .to_string(),
        );
    }

    if out.is_empty() {
        out.push(
            "Strong overall performance. Focus on maintaining consistency while pushing limits in key sectors."
                .to_string(),
        );
    }
    out.truncate(3);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laps(times: &[f64]) -> Vec<LapRecord> {
        times
            .iter()
            .enumerate()
            .map(|(i, t)| LapRecord {
                lap: i as i64 + 1,
                lap_time: Some(*t),
                records: 10,
                avg_speed: None,
                max_speed: None,
                delta_to_best: None,
            })
            .collect()
    }

    fn sector(lap: i64, name: &str, time: f64) -> SectorRecord {
        SectorRecord {
            lap,
            sector: name.to_string(),
            sector_time: Some(time),
            avg_speed: None,
            delta_to_best: None,
        }
    }

    #[test]
    fn test_cv_mapping_breakpoints() {
        assert_eq!(score_from_cv(0.0), 10.0);
        assert_eq!(score_from_cv(0.5), 10.0);
        assert!((score_from_cv(2.0) - 7.5).abs() < 1e-12);
        assert!((score_from_cv(10.0) - 2.5).abs() < 1e-12);
        assert_eq!(score_from_cv(15.0), 0.0);
        assert_eq!(score_from_cv(40.0), 0.0);
        let mut prev = f64::INFINITY;
        for i in 0..400 {
            let s = score_from_cv(i as f64 * 0.05);
            assert!(s <= prev);
            prev = s;
        }
    }

    #[test]
    fn test_flat_session() {
        let l = laps(&[90.0; 5]);
        let c = consistency_score(&l);
        assert_eq!(c.score, 10.0);
        assert_eq!(c.rating, "Excellent");
        let t = performance_trajectory(&l);
        assert_eq!(t.trend, Trend::Consistent);
        assert_eq!(t.fastest_stint.as_ref().map(|s| s.start_lap), Some(1));
        let cfg = AnalysisConfig::default();
        let b = breakthrough_moment(&l, &[], &cfg).unwrap();
        assert_eq!(b.kind, MomentKind::BestLap);
        assert_eq!(b.lap, 1);
        assert_eq!(b.improvement, 0.0);
    }

    #[test]
    fn test_insufficient_laps() {
        let l = laps(&[90.0, 91.0]);
        assert_eq!(performance_trajectory(&l).trend, Trend::InsufficientData);
        let c = consistency_score(&l);
        assert_eq!((c.score, c.rating), (0.0, "N/A"));
        let cfg = AnalysisConfig::default();
        assert!(breakthrough_moment(&laps(&[90.0]), &[], &cfg).is_none());
    }

    #[test]
    fn test_trend_and_first_breakthrough() {
        let l = laps(&[95.0, 94.0, 93.9, 92.5, 92.4]);
        let t = performance_trajectory(&l);
        assert_eq!(t.trend, Trend::Improving);
        assert!((t.improvement_rate + t.slope).abs() < 1e-12);
        let stint = t.fastest_stint.unwrap();
        assert_eq!((stint.start_lap, stint.end_lap), (3, 5));

        let cfg = AnalysisConfig::default();
        let b = breakthrough_moment(&l, &[], &cfg).unwrap();
        assert_eq!(b.kind, MomentKind::Breakthrough);
        assert_eq!(b.lap, 2);
        assert!((b.improvement - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_declining_trend() {
        let t = performance_trajectory(&laps(&[90.0, 90.5, 91.0, 91.5]));
        assert_eq!(t.trend, Trend::Declining);
        assert!((t.slope - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_stint_uses_actual_lap_numbers() {
        let mut l = laps(&[91.0, 90.0, 90.0, 90.0]);
        l[3].lap = 9;
        let stint = fastest_stint(&l).unwrap();
        assert_eq!((stint.start_lap, stint.end_lap), (2, 9));
    }

    #[test]
    fn test_risk_all_heavy_braking() {
        let cfg = AnalysisConfig::default();
        let rows: Vec<TelemetryRow> = (0..10)
            .map(|_| {
                let mut r = TelemetryRow { brake_front: Some(80.0), ..Default::default() };
                r.derived.brake_intensity = 80.0;
                r
            })
            .collect();
        let risk = risk_index(&rows, &cfg);
        assert_eq!(risk.components.braking_aggression.value(), Some(&10.0));
        assert!(!risk.components.throttle_aggression.is_computed());
        // 0.4 * 10 + 0.3 * 5 + 0.3 * 5
        assert_eq!(risk.score, 7.0);
        assert_eq!(risk.rating, "Aggressive");
    }

    #[test]
    fn test_risk_empty_telemetry() {
        let risk = risk_index(&[], &AnalysisConfig::default());
        assert_eq!((risk.score, risk.rating), (0.0, "N/A"));
    }

    #[test]
    fn test_sector_insights_sorted_by_range() {
        let s = vec![
            sector(1, "A", 30.0),
            sector(1, "B", 40.0),
            sector(1, "C", 20.0),
            sector(2, "A", 30.05),
            sector(2, "B", 40.5),
            sector(2, "C", 20.2),
        ];
        let insights = sector_insights(&s);
        let names: Vec<_> = insights.iter().map(|i| i.sector.as_str()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
        assert_eq!(insights[0].performance, SectorPerformance::Weakness);
        assert_eq!(insights[1].performance, SectorPerformance::Neutral);
        assert_eq!(insights[2].performance, SectorPerformance::Strength);
    }

    #[test]
    fn test_optimal_lap_from_best_sectors() {
        let l = laps(&[90.0, 90.0]);
        let s = vec![
            sector(1, "sector1", 40.0),
            sector(1, "sector2", 50.0),
            sector(2, "sector1", 41.0),
            sector(2, "sector2", 49.0),
        ];
        let o = optimal_lap(&l, &s);
        assert_eq!(o.optimal_time, Some(89.0));
        assert_eq!(o.actual_best, Some(90.0));
        assert_eq!(o.potential_gain, 1.0);
        // lap 1 is the first best lap; only its sector2 is off the best
        assert_eq!(o.gap_breakdown, vec![SectorGap { sector: "sector2".into(), gap: 1.0 }]);
    }

    #[test]
    fn test_optimal_gain_not_clamped() {
        let l = laps(&[88.0]);
        let s = vec![sector(1, "A", 45.0), sector(1, "B", 45.0)];
        let o = optimal_lap(&l, &s);
        assert_eq!(o.potential_gain, -2.0);
        assert!(optimal_lap(&l, &[]).optimal_time.is_none());
    }

    #[test]
    fn test_recommendation_rules() {
        let insights = sector_insights(&[sector(1, "S2.a", 30.0), sector(2, "S2.a", 31.0)]);
        let consistency = ConsistencyScore {
            score: 5.0,
            rating: "Fair",
            std_dev: 1.0,
            range: 2.0,
            coefficient_of_variation: 4.4,
        };
        let risk = RiskIndex {
            score: 8.2,
            rating: "Very Aggressive",
            components: RiskComponents {
                braking_aggression: Derived::Computed { value: 10.0 },
                throttle_aggression: Derived::Computed { value: 7.0 },
                corner_variance: Derived::Computed { value: 7.0 },
            },
        };
        let trajectory = performance_trajectory(&laps(&[90.0, 91.0, 92.0]));
        let recs = recommendations(&insights, &consistency, &risk, &trajectory);
        assert_eq!(recs.len(), 3);
        assert!(recs[0].starts_with("Focus on S2.a"));
        assert!(recs[1].starts_with("Work on consistency"));
        assert!(recs[2].starts_with("Aggressive driving style"));

        let calm = ConsistencyScore { score: 9.0, rating: "Excellent", ..consistency };
        let balanced = RiskIndex { score: 5.0, rating: "Balanced", ..risk };
        let flat = performance_trajectory(&laps(&[90.0, 90.0, 90.0]));
        let recs = recommendations(&[], &calm, &balanced, &flat);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].starts_with("Strong overall performance"));
    }
}
