use tracing::debug;

use crate::config::{AnalysisConfig, SectorRange, DEFAULT_SECTOR};
use crate::model::{has_channel, Channel, TelemetryRow};

/// First range containing `distance`; past the end of the table the last
/// sector absorbs the overrun at the line.
pub fn assign_sector(distance: f64, table: &[SectorRange]) -> Option<&str> {
    table
        .iter()
        .find(|s| s.contains(distance))
        .or_else(|| table.last())
        .map(|s| s.name.as_str())
}

pub struct SectorClassifier<'a> {
    table: Option<&'a [SectorRange]>,
}

impl<'a> SectorClassifier<'a> {
    pub fn new(config: &'a AnalysisConfig, track_name: &str) -> Self {
        let table = config.sector_table(track_name).filter(|t| !t.is_empty());
        debug!(
            "track {:?}: {} sectors",
            track_name,
            table.map(|t| t.len()).unwrap_or(1)
        );
        Self { table }
    }

    /// Sector names in lap order.
    pub fn sector_names(&self) -> Vec<&str> {
        match self.table {
            Some(table) => table.iter().map(|s| s.name.as_str()).collect(),
            None => vec![DEFAULT_SECTOR],
        }
    }

    /// Sector for one row. `None` when the track has a table but this row
    /// carries no distance value.
    pub fn classify_row(&self, row: &TelemetryRow) -> Option<&str> {
        match self.table {
            Some(table) => row.lap_distance.and_then(|d| assign_sector(d, table)),
            None => Some(DEFAULT_SECTOR),
        }
    }

    /// Labels every row. Without a table, or without any distance in the
    /// session, every row gets the default sector. Rows that only drop their
    /// own distance value stay unlabelled and are left out of sector timing.
    pub fn classify(&self, rows: &mut [TelemetryRow]) {
        if self.table.is_none() || !has_channel(rows, Channel::LapDistance) {
            for row in rows.iter_mut() {
                row.derived.sector = Some(DEFAULT_SECTOR.to_string());
            }
            return;
        }
        let mut unlabelled = 0usize;
        for row in rows.iter_mut() {
            row.derived.sector = self.classify_row(row).map(str::to_string);
            if row.derived.sector.is_none() {
                unlabelled += 1;
            }
        }
        if unlabelled > 0 {
            debug!("{} rows without lap distance left out of sectors", unlabelled);
        }
    }
}
