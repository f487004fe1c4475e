use serde::Serialize;

use crate::error::Degradation;

/// Car number the series uses before a car is assigned one.
pub const UNASSIGNED_CAR_NUMBER: &str = "000";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VehicleId {
    pub chassis: String,
    pub car_number: String,
}

impl VehicleId {
    pub fn is_unassigned(&self) -> bool {
        self.car_number == UNASSIGNED_CAR_NUMBER
    }

    pub fn display_name(&self) -> String {
        if self.is_unassigned() {
            format!("Chassis {} (Unassigned)", self.chassis)
        } else {
            format!("Car #{} (Chassis {})", self.car_number, self.chassis)
        }
    }
}

fn digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Strict `GR86-<chassis>-<car>` parse.
pub fn try_parse_vehicle_id(raw: &str) -> Result<VehicleId, Degradation> {
    let malformed = || Degradation::MalformedIdentifier { raw: raw.to_string() };
    let rest = raw.strip_prefix("GR86-").ok_or_else(malformed)?;
    let (chassis, car) = rest.split_once('-').ok_or_else(malformed)?;
    // the logger sometimes appends suffixes after the car number
    let car = car.split(|c: char| !c.is_ascii_digit()).next().unwrap_or_default();
    if !digits(chassis) || !digits(car) {
        return Err(malformed());
    }
    Ok(VehicleId {
        chassis: chassis.to_string(),
        car_number: car.to_string(),
    })
}

/// Lenient parse: anything malformed becomes chassis "Unknown", car "000".
pub fn parse_vehicle_id(raw: &str) -> VehicleId {
    try_parse_vehicle_id(raw).unwrap_or_else(|_| VehicleId {
        chassis: "Unknown".to_string(),
        car_number: UNASSIGNED_CAR_NUMBER.to_string(),
    })
}
