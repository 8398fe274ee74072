//! Boolean health indicators derived from a published reading.

use crate::model::{self, key, MetricValue, Reading};
use serde::Serialize;

pub const TEMPERATURE_ALERT_CELSIUS: f64 = 60.0;
pub const GRID_FREQUENCY_MIN_HZ: f64 = 49.0;
pub const GRID_FREQUENCY_MAX_HZ: f64 = 51.0;

/// Vendor status code of a running inverter.
pub const RUNNING_STATUS: u64 = 0;

/// Whether `code` (a numeric string, possibly padded) reports a running inverter.
pub fn is_running(code: &str) -> bool {
    code.trim().parse::<u64>() == Ok(RUNNING_STATUS)
}

/// `None` means the reading lacks the value the flag is computed from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StationFlags {
    pub inverter_status: Option<bool>,
    pub grid_connected: Option<bool>,
    pub production_active: Option<bool>,
    pub temperature_alert: Option<bool>,
    pub grid_frequency_ok: Option<bool>,
}

impl StationFlags {
    pub fn from_reading(reading: &Reading) -> Self {
        let number = |k| model::number(reading, k);

        StationFlags {
            inverter_status: reading
                .get(key::STATUS)
                .and_then(MetricValue::as_str)
                .map(is_running),
            grid_connected: number(key::GRID_VOLTAGE).map(|v| v > 0.0),
            production_active: number(key::POWER_TOTAL).map(|p| p > 0.0),
            temperature_alert: number(key::TEMPERATURE).map(|t| t > TEMPERATURE_ALERT_CELSIUS),
            grid_frequency_ok: number(key::GRID_FREQUENCY)
                .map(|hz| (GRID_FREQUENCY_MIN_HZ..=GRID_FREQUENCY_MAX_HZ).contains(&hz)),
        }
    }

    /// Flag name and value pairs, skipping unknown ones.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        vec![
            ("inverter_status", self.inverter_status),
            ("grid_connected", self.grid_connected),
            ("production_active", self.production_active),
            ("temperature_alert", self.temperature_alert),
            ("grid_frequency_ok", self.grid_frequency_ok),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reading(values: Vec<(&str, MetricValue)>) -> Reading {
        values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn healthy_station() {
        let flags = StationFlags::from_reading(&reading(vec![
            (key::STATUS, MetricValue::Text("0".to_string())),
            (key::GRID_VOLTAGE, MetricValue::Number(230.4)),
            (key::POWER_TOTAL, MetricValue::Number(600.0)),
            (key::TEMPERATURE, MetricValue::Number(42.0)),
            (key::GRID_FREQUENCY, MetricValue::Number(50.03)),
        ]));
        assert_eq!(
            StationFlags {
                inverter_status: Some(true),
                grid_connected: Some(true),
                production_active: Some(true),
                temperature_alert: Some(false),
                grid_frequency_ok: Some(true),
            },
            flags
        );
        assert_eq!(5, flags.iter().count());
    }

    #[test]
    fn faulty_station() {
        let flags = StationFlags::from_reading(&reading(vec![
            (key::STATUS, MetricValue::Text("3".to_string())),
            (key::GRID_VOLTAGE, MetricValue::Number(0.0)),
            (key::POWER_TOTAL, MetricValue::Number(0.0)),
            (key::TEMPERATURE, MetricValue::Number(61.5)),
            (key::GRID_FREQUENCY, MetricValue::Number(51.2)),
        ]));
        assert_eq!(Some(false), flags.inverter_status);
        assert_eq!(Some(false), flags.grid_connected);
        assert_eq!(Some(false), flags.production_active);
        assert_eq!(Some(true), flags.temperature_alert);
        assert_eq!(Some(false), flags.grid_frequency_ok);
    }

    #[test]
    fn missing_values() {
        let flags = StationFlags::from_reading(&Reading::new());
        assert_eq!(StationFlags::default(), flags);
        assert_eq!(0, flags.iter().count());
    }

    #[test]
    fn status_codes() {
        assert!(is_running("0"));
        assert!(is_running(" 0 "));
        assert!(!is_running("7"));
        assert!(!is_running("fault"));
        assert!(!is_running(""));
    }
}
