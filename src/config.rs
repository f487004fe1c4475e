use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::LapLensError;

/// Label given to every row when a track has no sector table.
pub const DEFAULT_SECTOR: &str = "S1.a";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectorRange {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

impl SectorRange {
    pub fn new(name: &str, start: f64, end: f64) -> Self {
        Self { name: name.to_string(), start, end }
    }

    pub fn contains(&self, distance: f64) -> bool {
        self.start <= distance && distance < self.end
    }
}

/// How the steering smoothness window treats lap boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowScope {
    /// One window over the whole session; the head of a lap blends with the
    /// tail of the previous one.
    #[default]
    Session,
    /// The window restarts at every lap.
    PerLap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Bar; at or below counts as no braking.
    pub brake_light: f64,
    /// Bar; above counts as heavy braking.
    pub brake_heavy: f64,
    /// Percent; above counts as partial throttle.
    pub throttle_partial: f64,
    /// Percent; above counts as full throttle.
    pub throttle_full: f64,
    /// Metres from the line that count as "near start" / "near end".
    pub lap_distance: f64,
    pub outlier_std: f64,
    pub steering_window: usize,
    pub steering_scope: WindowScope,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            brake_light: 20.0,
            brake_heavy: 50.0,
            throttle_partial: 50.0,
            throttle_full: 90.0,
            lap_distance: 100.0,
            outlier_std: 3.0,
            steering_window: 5,
            steering_scope: WindowScope::Session,
        }
    }
}

/// Process-wide, read-only analysis settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub thresholds: Thresholds,
    /// Track name -> ordered sector ranges. `None` means undivided.
    pub tracks: BTreeMap<String, Option<Vec<SectorRange>>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let barber = vec![
            SectorRange::new("S1.a", 0.0, 400.0),
            SectorRange::new("S1.b", 400.0, 800.0),
            SectorRange::new("S2.a", 800.0, 1200.0),
            SectorRange::new("S2.b", 1200.0, 1600.0),
            SectorRange::new("S3.a", 1600.0, 2000.0),
            SectorRange::new("S3.b", 2000.0, 2400.0),
        ];
        let cota = vec![
            SectorRange::new("S1.a", 0.0, 900.0),
            SectorRange::new("S1.b", 900.0, 1800.0),
            SectorRange::new("S2.a", 1800.0, 2700.0),
            SectorRange::new("S2.b", 2700.0, 3600.0),
            SectorRange::new("S3.a", 3600.0, 4500.0),
            SectorRange::new("S3.b", 4500.0, 5513.0),
        ];
        let mut tracks = BTreeMap::new();
        tracks.insert("Barber".to_string(), Some(barber));
        tracks.insert("COTA".to_string(), Some(cota));
        tracks.insert("default".to_string(), None);
        Self { thresholds: Thresholds::default(), tracks }
    }
}

impl AnalysisConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LapLensError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| LapLensError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data).map_err(|source| LapLensError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Sector table for a track. Tries the exact key, then any key contained
    /// in the display name ("Barber Motorsports Park" -> "Barber"), then
    /// `default`.
    pub fn sector_table(&self, track_name: &str) -> Option<&[SectorRange]> {
        if let Some(entry) = self.tracks.get(track_name) {
            return entry.as_deref();
        }
        let lowered = track_name.to_lowercase();
        let matched = self
            .tracks
            .iter()
            .filter(|(key, _)| key.as_str() != "default")
            .find(|(key, _)| lowered.contains(&key.to_lowercase()));
        match matched {
            Some((_, entry)) => entry.as_deref(),
            None => self.tracks.get("default").and_then(|e| e.as_deref()),
        }
    }
}
