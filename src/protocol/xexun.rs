// src/protocol/xexun.rs
//! Xexun `GPRMC ... imei:` sentence decoding
//!
//! A sentence looks like
//!
//! ```text
//! 001,+123456789,GPRMC,123456.789,A,1234.5678,N,09876.5432,W,10.5,90.0,150124,... imei:123456789012345,1,0.0,F:4.1V,...
//! ```
//!
//! and is matched as a whole against one compiled pattern. Anything that
//! deviates from it is rejected; the course field is the only optional part.

use super::position::{DeviceId, Position};
use crate::registry::DeviceRegistry;
use chrono::{DateTime, NaiveDate, Utc};
use regex::{Captures, Regex};
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed sentence")]
    MalformedSentence,
    #[error("unknown device imei {imei}")]
    UnknownDevice { imei: String },
}

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // ASCII digits only; free text never crosses a line terminator
        Regex::new(concat!(
            r"^[0-9]+,",
            r"\+[0-9]+,",
            r"GPRMC,",
            r"(?P<hour>[0-9]{2})(?P<minute>[0-9]{2})(?P<second>[0-9]{2})\.(?P<milli>[0-9]{3}),",
            r"(?P<validity>[AV]),",
            r"(?P<lat_deg>[0-9]{2})(?P<lat_min>[0-9]{2}\.[0-9]{4}),",
            r"(?P<lat_hem>[NS]),",
            r"(?P<lon_deg>[0-9]{3})(?P<lon_min>[0-9]{2}\.[0-9]{4}),",
            r"(?P<lon_hem>[EW]),",
            r"(?P<speed>[0-9]+\.[0-9]+),",
            r"(?P<course>[0-9]+\.[0-9]+)?,",
            r"(?P<day>[0-9]{2})(?P<month>[0-9]{2})(?P<year>[0-9]{2}),",
            r"[^\r\n]*imei:(?P<imei>[0-9]+),",
            r"[0-9]+,",
            r"[0-9]+\.[0-9]+,",
            r"F:(?P<power>[0-9]+\.[0-9]+)V,",
            r"[^\r\n]*$",
        ))
        .expect("sentence pattern is valid")
    })
}

/// Fields of a matched sentence, before the device is resolved
#[derive(Debug, Clone, PartialEq)]
struct Sentence {
    time: DateTime<Utc>,
    valid: bool,
    latitude: f64,
    longitude: f64,
    speed: f64,
    course: f64,
    imei: String,
    power: f64,
}

impl Sentence {
    fn into_position(self, device_id: DeviceId) -> Position {
        Position {
            device_id,
            time: self.time,
            valid: self.valid,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: 0.0,
            speed: self.speed,
            course: self.course,
            power: self.power,
        }
    }
}

/// Decode one sentence and resolve its device
pub fn decode(line: &str, registry: &dyn DeviceRegistry) -> Result<Position, DecodeError> {
    let sentence = parse_sentence(line)?;

    let device_id = registry
        .find_by_imei(&sentence.imei)
        .ok_or_else(|| DecodeError::UnknownDevice {
            imei: sentence.imei.clone(),
        })?;

    Ok(sentence.into_position(device_id))
}

fn parse_sentence(line: &str) -> Result<Sentence, DecodeError> {
    let caps = pattern()
        .captures(line)
        .ok_or(DecodeError::MalformedSentence)?;

    let course = match caps.name("course") {
        Some(course) => parse_number(course.as_str())?,
        None => 0.0,
    };

    Ok(Sentence {
        time: parse_time(&caps)?,
        valid: &caps["validity"] == "A",
        latitude: parse_coordinate(&caps["lat_deg"], &caps["lat_min"], &caps["lat_hem"] == "S")?,
        longitude: parse_coordinate(&caps["lon_deg"], &caps["lon_min"], &caps["lon_hem"] == "W")?,
        speed: field(&caps, "speed")?,
        course,
        imei: caps["imei"].to_string(),
        power: field(&caps, "power")?,
    })
}

/// Time of day and date sit in different parts of the sentence but name one
/// UTC instant.
fn parse_time(caps: &Captures<'_>) -> Result<DateTime<Utc>, DecodeError> {
    let year: i32 = field(caps, "year")?;

    NaiveDate::from_ymd_opt(2000 + year, field(caps, "month")?, field(caps, "day")?)
        .and_then(|date| {
            date.and_hms_milli_opt(
                field(caps, "hour").ok()?,
                field(caps, "minute").ok()?,
                field(caps, "second").ok()?,
                field(caps, "milli").ok()?,
            )
        })
        .map(|time| time.and_utc())
        .ok_or(DecodeError::MalformedSentence)
}

/// `DD(D)` degrees plus `MM.MMMM` minutes
fn parse_coordinate(degrees: &str, minutes: &str, negative: bool) -> Result<f64, DecodeError> {
    let degrees: f64 = parse_number(degrees)?;
    let minutes: f64 = parse_number(minutes)?;
    let value = degrees + minutes / 60.0;
    Ok(if negative { -value } else { value })
}

fn field<T: FromStr>(caps: &Captures<'_>, name: &str) -> Result<T, DecodeError> {
    let text = caps.name(name).ok_or(DecodeError::MalformedSentence)?;
    parse_number(text.as_str())
}

fn parse_number<T: FromStr>(text: &str) -> Result<T, DecodeError> {
    text.parse().map_err(|_| DecodeError::MalformedSentence)
}
