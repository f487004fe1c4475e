use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Lap number the logger writes when it loses track of the lap count.
pub const ERRONEOUS_LAP_NUMBER: i64 = 32768;

/// Raw measurement channels a telemetry row may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    LapDistance,
    Speed,
    BrakeFront,
    BrakeRear,
    Throttle,
    SteeringAngle,
    AccelLongitudinal,
    AccelLateral,
    GpsLatitude,
    GpsLongitude,
}

impl Channel {
    /// Column name used by the GR Cup logger exports.
    pub fn column(self) -> &'static str {
        match self {
            Channel::LapDistance => "Laptrigger_lapdist_dls",
            Channel::Speed => "Speed",
            Channel::BrakeFront => "pbrake_f",
            Channel::BrakeRear => "pbrake_r",
            Channel::Throttle => "ath",
            Channel::SteeringAngle => "Steering_Angle",
            Channel::AccelLongitudinal => "accx_can",
            Channel::AccelLateral => "accy_can",
            Channel::GpsLatitude => "VBOX_Lat_Min",
            Channel::GpsLongitude => "VBOX_Long_Minutes",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrakingZone {
    None,
    Light,
    Heavy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottleZone {
    Off,
    Partial,
    Full,
}

/// Columns the pipeline adds to each row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivedChannels {
    pub sector: Option<String>,
    pub brake_intensity: f64,
    pub braking_zone: Option<BrakingZone>,
    pub throttle_zone: Option<ThrottleZone>,
    pub g_force_combined: Option<f64>,
    pub steering_smoothness: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Text(String),
    Seconds(f64),
}

/// Loggers write time columns either as text or as plain seconds.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawTime>::deserialize(deserializer)?.map(|raw| match raw {
        RawTime::Text(s) => s,
        RawTime::Seconds(v) => v.to_string(),
    }))
}

/// One sample of the wide telemetry table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRow {
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub meta_time: Option<String>,
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub lap: Option<i64>,
    #[serde(default, rename = "Laptrigger_lapdist_dls")]
    pub lap_distance: Option<f64>,
    #[serde(default, rename = "Speed")]
    pub speed: Option<f64>,
    #[serde(default, rename = "pbrake_f")]
    pub brake_front: Option<f64>,
    #[serde(default, rename = "pbrake_r")]
    pub brake_rear: Option<f64>,
    #[serde(default, rename = "ath")]
    pub throttle: Option<f64>,
    #[serde(default, rename = "Steering_Angle")]
    pub steering_angle: Option<f64>,
    #[serde(default, rename = "accx_can")]
    pub accel_longitudinal: Option<f64>,
    #[serde(default, rename = "accy_can")]
    pub accel_lateral: Option<f64>,
    #[serde(default, rename = "VBOX_Lat_Min")]
    pub gps_latitude: Option<f64>,
    #[serde(default, rename = "VBOX_Long_Minutes")]
    pub gps_longitude: Option<f64>,

    /// Normalized time in seconds; `None` when the source value could not be parsed.
    #[serde(default, rename = "time_normalized")]
    pub time: Option<f64>,
    #[serde(flatten)]
    pub derived: DerivedChannels,
}

impl TelemetryRow {
    pub fn channel(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::LapDistance => self.lap_distance,
            Channel::Speed => self.speed,
            Channel::BrakeFront => self.brake_front,
            Channel::BrakeRear => self.brake_rear,
            Channel::Throttle => self.throttle,
            Channel::SteeringAngle => self.steering_angle,
            Channel::AccelLongitudinal => self.accel_longitudinal,
            Channel::AccelLateral => self.accel_lateral,
            Channel::GpsLatitude => self.gps_latitude,
            Channel::GpsLongitude => self.gps_longitude,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut Option<f64> {
        match channel {
            Channel::LapDistance => &mut self.lap_distance,
            Channel::Speed => &mut self.speed,
            Channel::BrakeFront => &mut self.brake_front,
            Channel::BrakeRear => &mut self.brake_rear,
            Channel::Throttle => &mut self.throttle,
            Channel::SteeringAngle => &mut self.steering_angle,
            Channel::AccelLongitudinal => &mut self.accel_longitudinal,
            Channel::AccelLateral => &mut self.accel_lateral,
            Channel::GpsLatitude => &mut self.gps_latitude,
            Channel::GpsLongitude => &mut self.gps_longitude,
        }
    }

    /// Lap id as seen by the aggregator; sentinel and unset laps map to `None`.
    pub fn clean_lap(&self) -> Option<i64> {
        self.lap.filter(|&l| l >= 1 && l != ERRONEOUS_LAP_NUMBER)
    }
}

/// A channel counts as present when any row carries a value for it.
pub fn has_channel(rows: &[TelemetryRow], channel: Channel) -> bool {
    rows.iter().any(|r| r.channel(channel).is_some())
}

/// Non-missing values of one channel, in row order.
pub fn channel_values(rows: &[TelemetryRow], channel: Channel) -> Vec<f64> {
    rows.iter().filter_map(|r| r.channel(channel)).collect()
}

/// Result of a computation that depends on optional channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Derived<T> {
    Computed { value: T },
    Unavailable { missing: Vec<Channel> },
}

impl<T> Derived<T> {
    /// Runs `f` only when every channel in `required` is present in `rows`.
    pub fn require(
        rows: &[TelemetryRow],
        required: &[Channel],
        f: impl FnOnce() -> T,
    ) -> Self {
        let missing: Vec<Channel> = required
            .iter()
            .copied()
            .filter(|c| !has_channel(rows, *c))
            .collect();
        if missing.is_empty() {
            Derived::Computed { value: f() }
        } else {
            Derived::Unavailable { missing }
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Derived::Computed { value } => Some(value),
            Derived::Unavailable { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Derived::Computed { value } => Some(value),
            Derived::Unavailable { .. } => None,
        }
    }

    /// Channels that kept this value from being computed.
    pub fn missing(&self) -> &[Channel] {
        match self {
            Derived::Computed { .. } => &[],
            Derived::Unavailable { missing } => missing,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Derived::Computed { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    pub lap: i64,
    pub lap_time: Option<f64>,
    pub records: usize,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub delta_to_best: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectorRecord {
    pub lap: i64,
    pub sector: String,
    pub sector_time: Option<f64>,
    pub avg_speed: Option<f64>,
    pub delta_to_best: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_deserializes_logger_columns() {
        let json = r#"{"meta_time":"2025-04-04T18:10:23.456Z","lap":3,
            "Laptrigger_lapdist_dls":812.5,"Speed":141.2,"ath":99.0}"#;
        let row: TelemetryRow = serde_json::from_str(json).expect("row should parse");
        assert_eq!(row.lap, Some(3));
        assert_eq!(row.channel(Channel::LapDistance), Some(812.5));
        assert_eq!(row.channel(Channel::Throttle), Some(99.0));
        assert_eq!(row.brake_front, None);
        assert_eq!(row.time, None);
    }

    #[test]
    fn test_numeric_time_columns_deserialize() {
        let row: TelemetryRow =
            serde_json::from_str(r#"{"timestamp":12.5,"meta_time":null,"lap":1}"#).expect("row should parse");
        assert_eq!(row.timestamp.as_deref(), Some("12.5"));
        assert_eq!(row.meta_time, None);

        let rows: Vec<TelemetryRow> =
            serde_json::from_str(r#"[{"meta_time":3},{"timestamp":"2025-04-04T18:10:23Z"}]"#).expect("rows should parse");
        assert_eq!(rows[0].meta_time.as_deref(), Some("3"));
        assert_eq!(rows[1].timestamp.as_deref(), Some("2025-04-04T18:10:23Z"));
    }

    #[test]
    fn test_clean_lap_rejects_sentinel() {
        let mut row = TelemetryRow { lap: Some(ERRONEOUS_LAP_NUMBER), ..Default::default() };
        assert_eq!(row.clean_lap(), None);
        row.lap = Some(4);
        assert_eq!(row.clean_lap(), Some(4));
    }

    #[test]
    fn test_derived_reports_missing_channels() {
        let rows = vec![TelemetryRow { speed: Some(100.0), ..Default::default() }];
        let ok = Derived::require(&rows, &[Channel::Speed], || 1.0);
        assert_eq!(ok.value(), Some(&1.0));

        let missing = Derived::require(&rows, &[Channel::Speed, Channel::Throttle], || 1.0);
        assert_eq!(
            missing,
            Derived::Unavailable { missing: vec![Channel::Throttle] }
        );
    }
}
