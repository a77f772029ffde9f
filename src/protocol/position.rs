// src/protocol/position.rs
//! Decoded position record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal device identifier handed out by the device registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fix reported by a tracker.
///
/// Only ever built from a sentence that matched the whole grammar, so every
/// field is populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub device_id: DeviceId,
    pub time: DateTime<Utc>,
    pub valid: bool,
    pub latitude: f64,   // degrees, south negative
    pub longitude: f64,  // degrees, west negative
    pub altitude: f64,   // not carried by the protocol, always 0
    pub speed: f64,      // as transmitted
    pub course: f64,     // degrees, 0 when omitted
    pub power: f64,      // battery volts
}

impl Position {
    /// Format coordinates for log output
    pub fn format_coordinates(&self) -> String {
        format!("{:.6},{:.6}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Position {
        Position {
            device_id: DeviceId(7),
            time: Utc.with_ymd_and_hms(2024, 1, 15, 12, 34, 56).unwrap(),
            valid: true,
            latitude: 12.5,
            longitude: -98.25,
            altitude: 0.0,
            speed: 10.5,
            course: 90.0,
            power: 4.1,
        }
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["device_id"], 7);
        assert_eq!(value["time"], "2024-01-15T12:34:56Z");
        assert_eq!(value["valid"], true);
        assert_eq!(value["longitude"], -98.25);
    }

    #[test]
    fn test_format_coordinates() {
        assert_eq!(sample().format_coordinates(), "12.500000,-98.250000");
    }
}
