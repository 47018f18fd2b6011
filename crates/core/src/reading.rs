//! Sensor reading value shared by the ingest and fan-out paths.
//!
//! A [`Reading`] is the unit that flows through the whole system: decoded
//! from one producer record, serialized once per broadcast, then dropped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Record boundary on the ingest wire.
pub const RECORD_DELIMITER: u8 = b'\n';

/// Reading validation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReadingError {
    /// Sensor identifier is empty or whitespace
    #[error("sensor_id must not be empty")]
    EmptySensorId,

    /// A measurement is NaN or infinite
    #[error("{field} is not a finite number: {value}")]
    NonFinite {
        /// Offending field name
        field: &'static str,
        /// Offending value
        value: f64,
    },
}

/// One sensor measurement tuple.
///
/// Unknown fields are ignored on deserialization so producers may attach
/// extra metadata without breaking ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Stable sensor identifier (e.g. `sensor-0`)
    pub sensor_id: String,
    /// Temperature in degrees Celsius
    pub temperature_c: f64,
    /// Pressure in kilopascals
    pub pressure_kpa: f64,
    /// Relative humidity in percent
    pub humidity_pct: f64,
}

impl Reading {
    /// Create a new reading
    pub fn new(
        sensor_id: impl Into<String>,
        temperature_c: f64,
        pressure_kpa: f64,
        humidity_pct: f64,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            temperature_c,
            pressure_kpa,
            humidity_pct,
        }
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ReadingError> {
        if self.sensor_id.trim().is_empty() {
            return Err(ReadingError::EmptySensorId);
        }

        for (field, value) in [
            ("temperature_c", self.temperature_c),
            ("pressure_kpa", self.pressure_kpa),
            ("humidity_pct", self.humidity_pct),
        ] {
            if !value.is_finite() {
                return Err(ReadingError::NonFinite { field, value });
            }
        }

        Ok(())
    }

    /// Serialize as the JSON object delivered to subscribers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Encode as one ingest wire record, delimiter included.
    pub fn to_wire_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(RECORD_DELIMITER);
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_finite_reading() {
        let reading = Reading::new("sensor-0", 20.1, 101.0, 42.5);
        assert!(reading.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_sensor_id() {
        let reading = Reading::new("  ", 20.1, 101.0, 42.5);
        assert_eq!(reading.validate(), Err(ReadingError::EmptySensorId));
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let reading = Reading::new("sensor-1", 20.1, f64::INFINITY, 42.5);
        assert!(matches!(
            reading.validate(),
            Err(ReadingError::NonFinite {
                field: "pressure_kpa",
                ..
            })
        ));

        let reading = Reading::new("sensor-1", f64::NAN, 101.0, 42.5);
        assert!(matches!(
            reading.validate(),
            Err(ReadingError::NonFinite {
                field: "temperature_c",
                ..
            })
        ));
    }

    #[test]
    fn test_subscriber_json_shape() {
        let reading = Reading::new("sensor-0", 20.1, 101.0, 42.5);
        let json = reading.to_json().unwrap();

        assert_eq!(
            json,
            r#"{"sensor_id":"sensor-0","temperature_c":20.1,"pressure_kpa":101.0,"humidity_pct":42.5}"#
        );
    }

    #[test]
    fn test_wire_line_is_newline_terminated() {
        let reading = Reading::new("sensor-3", 19.5, 100.9, 40.0);
        let line = reading.to_wire_line().unwrap();

        assert_eq!(line.last(), Some(&RECORD_DELIMITER));
        assert_eq!(line.iter().filter(|b| **b == RECORD_DELIMITER).count(), 1);
    }
}
