//! Session narrative: scores from `scoring` stitched into a readable report.

pub mod scoring;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::error::Degradation;
use crate::model::{channel_values, has_channel, Channel, LapRecord, SectorRecord, TelemetryRow};
use crate::stats;

pub use scoring::{
    breakthrough_moment, consistency_score, optimal_lap, performance_trajectory, recommendations,
    risk_index, sector_insights, BreakthroughMoment, ConsistencyScore, FastestStint, LapChanges,
    MomentKind, OptimalLap, PerformanceTrajectory, RiskComponents, RiskIndex, SectorGap,
    SectorInsight, SectorPerformance, Trend,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Story {
    pub title: String,
    pub executive_summary: String,
    pub detailed_narrative: String,
    pub performance_trajectory: PerformanceTrajectory,
    pub breakthrough_moment: Option<BreakthroughMoment>,
    pub consistency_score: ConsistencyScore,
    pub risk_index: RiskIndex,
    pub sector_insights: Vec<SectorInsight>,
    pub optimal_lap: OptimalLap,
    pub recommendations: Vec<String>,
    pub technical_insights: Vec<String>,
    /// Parts of the story that fell back to a default for lack of laps.
    pub degradations: Vec<Degradation>,
}

pub struct StoryGenerator<'a> {
    config: &'a AnalysisConfig,
    track_name: String,
}

impl<'a> StoryGenerator<'a> {
    pub fn new(config: &'a AnalysisConfig, track_name: &str) -> Self {
        Self {
            config,
            track_name: track_name.to_string(),
        }
    }

    /// Builds the full story. Every component is recomputed from the inputs.
    pub fn generate(
        &self,
        telemetry: &[TelemetryRow],
        laps: &[LapRecord],
        sectors: &[SectorRecord],
        vehicle_id: &str,
    ) -> Story {
        let trajectory = performance_trajectory(laps);
        let breakthrough = breakthrough_moment(laps, telemetry, self.config);
        let consistency = consistency_score(laps);
        let risk = risk_index(telemetry, self.config);
        let insights = sector_insights(sectors);
        let optimal = optimal_lap(laps, sectors);
        let recs = recommendations(&insights, &consistency, &risk, &trajectory);

        let timed = scoring::timed_laps(laps).len();
        let mut degradations = Vec::new();
        for (what, needed) in [("trend analysis", 3), ("breakthrough detection", 2), ("consistency score", 3)] {
            if timed < needed {
                degradations.push(Degradation::InsufficientData { what, needed, found: timed });
            }
        }
        if !degradations.is_empty() {
            debug!("story for {} built with {} fallbacks", vehicle_id, degradations.len());
        }

        let story = Story {
            title: format!("Race Story: {} - {}", self.track_name, vehicle_id),
            executive_summary: self.executive_summary(vehicle_id, laps, breakthrough.as_ref(), &consistency),
            detailed_narrative: self.detailed_narrative(
                vehicle_id,
                &trajectory,
                breakthrough.as_ref(),
                &consistency,
                &risk,
            ),
            performance_trajectory: trajectory,
            breakthrough_moment: breakthrough,
            consistency_score: consistency,
            risk_index: risk,
            sector_insights: insights,
            optimal_lap: optimal,
            recommendations: recs,
            technical_insights: self.technical_insights(telemetry),
            degradations,
        };
        info!(
            "story: trend={:?} consistency={:.1} risk={:.1}",
            story.performance_trajectory.trend, story.consistency_score.score, story.risk_index.score
        );
        story
    }

    fn executive_summary(
        &self,
        vehicle_id: &str,
        laps: &[LapRecord],
        breakthrough: Option<&BreakthroughMoment>,
        consistency: &ConsistencyScore,
    ) -> String {
        let times: Vec<f64> = laps.iter().filter_map(|l| l.lap_time).collect();
        let mut summary = format!("{} completed {} laps at {} ", vehicle_id, laps.len(), self.track_name);
        match (stats::min(&times), stats::mean(&times)) {
            (Some(best), Some(avg)) => summary.push_str(&format!(
                "with a best time of {:.3}s (average: {:.3}s). ",
                best, avg
            )),
            _ => summary.push_str("without a timed lap. "),
        }
        if let Some(b) = breakthrough.filter(|b| b.kind == MomentKind::Breakthrough) {
            summary.push_str(&format!(
                "A breakthrough at Lap {} unlocked {:.3}s. ",
                b.lap, b.improvement
            ));
        }
        summary.push_str(&format!(
            "Consistency rated {} ({:.1}/10).",
            consistency.rating, consistency.score
        ));
        summary
    }

    fn detailed_narrative(
        &self,
        vehicle_id: &str,
        trajectory: &PerformanceTrajectory,
        breakthrough: Option<&BreakthroughMoment>,
        consistency: &ConsistencyScore,
        risk: &RiskIndex,
    ) -> String {
        let mut narrative = format!("At {}, {} {} ", self.track_name, vehicle_id, trajectory.narrative);
        if let Some(b) = breakthrough {
            narrative.push_str(&b.narrative);
            narrative.push(' ');
        }
        narrative.push_str(&format!(
            "\n\nConsistency was {} with a lap time range of {:.3}s. ",
            consistency.rating.to_lowercase(),
            consistency.range
        ));
        narrative.push_str(&format!(
            "The driving style was {} (risk index: {:.1}/10).",
            risk.rating.to_lowercase(),
            risk.score
        ));
        narrative
    }

    fn technical_insights(&self, telemetry: &[TelemetryRow]) -> Vec<String> {
        let mut insights = Vec::new();

        let speed = channel_values(telemetry, Channel::Speed);
        if let (Some(avg), Some(peak)) = (stats::mean(&speed), stats::max(&speed)) {
            insights.push(format!("Average speed: {:.1} km/h (peak: {:.1} km/h)", avg, peak));
        }

        if has_channel(telemetry, Channel::BrakeFront) || has_channel(telemetry, Channel::BrakeRear) {
            let brake: Vec<f64> = telemetry.iter().map(|r| r.derived.brake_intensity).collect();
            let heavy = brake.iter().filter(|b| **b > self.config.thresholds.brake_heavy).count();
            if let Some(peak) = stats::max(&brake) {
                insights.push(format!(
                    "Peak braking: {:.0} bar ({:.1}% heavy braking zones)",
                    peak,
                    heavy as f64 / brake.len() as f64 * 100.0
                ));
            }
        }

        let accel_x = channel_values(telemetry, Channel::AccelLongitudinal);
        let accel_y: Vec<f64> = channel_values(telemetry, Channel::AccelLateral)
            .into_iter()
            .map(f64::abs)
            .collect();
        if let (Some(decel), Some(lateral)) = (stats::min(&accel_x), stats::max(&accel_y)) {
            insights.push(format!(
                "Max braking G-force: {:.2}g, Max lateral G: {:.2}g",
                decel.abs(),
                lateral
            ));
        }
        insights
    }
}
