use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::aggregator::{lap_summary, session_summary, Aggregator, LapSummary, SessionSummary};
use crate::config::AnalysisConfig;
use crate::error::{Degradation, LapLensError};
use crate::model::{LapRecord, SectorRecord, TelemetryRow};
use crate::normalizer::SignalNormalizer;
use crate::sectors::SectorClassifier;
use crate::segmenter::LapSegmenter;
use crate::story::{Story, StoryGenerator};

/// Output tables of one processed session.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProcessedSession {
    pub telemetry: Vec<TelemetryRow>,
    pub lap_times: Vec<LapRecord>,
    pub sector_times: Vec<SectorRecord>,
    pub degradations: Vec<Degradation>,
}

impl ProcessedSession {
    pub fn summary(&self) -> SessionSummary {
        session_summary(&self.telemetry)
    }

    pub fn lap_summary(&self, lap: i64, config: &AnalysisConfig) -> Option<LapSummary> {
        lap_summary(&self.telemetry, lap, config)
    }
}

/// Runs normalizer, segmenter, classifier and aggregator over one session.
pub struct SessionProcessor<'a> {
    config: &'a AnalysisConfig,
    track_name: String,
}

impl<'a> SessionProcessor<'a> {
    pub fn new(config: &'a AnalysisConfig, track_name: &str) -> Self {
        Self {
            config,
            track_name: track_name.to_string(),
        }
    }

    pub fn process(&self, mut rows: Vec<TelemetryRow>) -> ProcessedSession {
        let mut notes = Vec::new();

        SignalNormalizer::new(self.config).preprocess(&mut rows, &mut notes);
        LapSegmenter::new(self.config).segment(&mut rows, &mut notes);

        let classifier = SectorClassifier::new(self.config, &self.track_name);
        classifier.classify(&mut rows);

        let aggregator = Aggregator::new(self.config);
        for note in aggregator.enrich(&mut rows) {
            if !notes.contains(&note) {
                notes.push(note);
            }
        }
        let lap_times = aggregator.lap_times(&rows);
        let sector_times = aggregator.sector_times(&rows, &classifier.sector_names());

        if !notes.is_empty() {
            warn!("{} degradations while processing {}", notes.len(), self.track_name);
        }
        info!(
            "processed {} rows at {}: {} laps, {} sector records",
            rows.len(),
            self.track_name,
            lap_times.len(),
            sector_times.len()
        );
        ProcessedSession {
            telemetry: rows,
            lap_times,
            sector_times,
            degradations: notes,
        }
    }

    /// Story for an already processed session.
    pub fn story(&self, session: &ProcessedSession, vehicle_id: &str) -> Story {
        StoryGenerator::new(self.config, &self.track_name).generate(
            &session.telemetry,
            &session.lap_times,
            &session.sector_times,
            vehicle_id,
        )
    }
}

/// Reads a JSON array of wide telemetry rows.
pub fn load_rows(path: impl AsRef<Path>) -> Result<Vec<TelemetryRow>, LapLensError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|source| LapLensError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| LapLensError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
