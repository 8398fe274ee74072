use crate::sensor;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

pub const DEFAULT_UPDATE_INTERVAL: u64 = 30;
pub const DEFAULT_COST_PER_KWH: f64 = 0.2;
pub const MAX_ENERGY_JUMP_KWH: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptionsError {
    #[error("update_interval must be at least 1 second")]
    UpdateInterval,
    #[error("cost_per_kwh must be a finite, non-negative number (got {0})")]
    CostPerKwh(f64),
    #[error("max_energy_jump_kwh must be a finite, non-negative number (got {0})")]
    MaxEnergyJump(f64),
    #[error("unknown sensor key: {0}")]
    UnknownSensor(String),
}

/// Coordinator options, changeable at runtime.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Seconds between poll cycles.
    pub update_interval: u64,
    pub cost_per_kwh: f64,
    /// Enabled metric keys.
    pub sensors: BTreeSet<String>,
    /// Largest plausible energy counter increase between two polls.
    pub max_energy_jump_kwh: f64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            cost_per_kwh: DEFAULT_COST_PER_KWH,
            sensors: sensor::sensor_keys().into_iter().collect(),
            max_energy_jump_kwh: MAX_ENERGY_JUMP_KWH,
        }
    }
}

impl Options {
    pub fn validate(self) -> Result<Self, OptionsError> {
        if self.update_interval < 1 {
            return Err(OptionsError::UpdateInterval);
        }
        if !self.cost_per_kwh.is_finite() || self.cost_per_kwh < 0.0 {
            return Err(OptionsError::CostPerKwh(self.cost_per_kwh));
        }
        if !self.max_energy_jump_kwh.is_finite() || self.max_energy_jump_kwh < 0.0 {
            return Err(OptionsError::MaxEnergyJump(self.max_energy_jump_kwh));
        }
        if let Some(unknown) = self.sensors.iter().find(|k| !sensor::is_known(k)) {
            return Err(OptionsError::UnknownSensor(unknown.to_owned()));
        }
        Ok(self)
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.sensors.contains(key)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let options = Options::default().validate().unwrap();
        assert_eq!(Duration::from_secs(30), options.interval());
        assert_eq!(0.2, options.cost_per_kwh);
        assert!(options.is_enabled("inverter_efficiency"));
        assert!(options.is_enabled("last_update_time"));
    }

    #[test]
    fn rejects_invalid() {
        let zero_interval = Options {
            update_interval: 0,
            ..Options::default()
        };
        assert_eq!(Err(OptionsError::UpdateInterval), zero_interval.validate());

        let unknown = Options {
            sensors: ["power1".to_string(), "bogus".to_string()]
                .iter()
                .cloned()
                .collect(),
            ..Options::default()
        };
        assert_eq!(
            Err(OptionsError::UnknownSensor("bogus".to_string())),
            unknown.validate()
        );

        let negative_cost = Options {
            cost_per_kwh: -1.0,
            ..Options::default()
        };
        assert!(negative_cost.validate().is_err());
    }

    #[test]
    fn partial_deserialize_uses_defaults() {
        let options: Options =
            serde_json::from_str(r#"{"cost_per_kwh": 0.31, "sensors": ["power1"]}"#).unwrap();
        assert_eq!(30, options.update_interval);
        assert_eq!(0.31, options.cost_per_kwh);
        assert!(options.is_enabled("power1"));
        assert!(!options.is_enabled("power2"));
    }
}
