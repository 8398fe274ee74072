use crate::model::key;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Power,
    Voltage,
    Current,
    Frequency,
    Temperature,
    Energy,
    Monetary,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

/// Describes one selectable metric for consumers of the snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SensorDescription {
    pub key: &'static str,
    pub unit: &'static str,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
}

const fn describe(
    key: &'static str,
    unit: &'static str,
    device_class: Option<DeviceClass>,
    state_class: Option<StateClass>,
) -> SensorDescription {
    SensorDescription {
        key,
        unit,
        device_class,
        state_class,
    }
}

use DeviceClass::*;
use StateClass::*;

pub static SENSOR_DESCRIPTIONS: [SensorDescription; 19] = [
    describe(key::POWER_TOTAL, "W", Some(Power), Some(Measurement)),
    describe(key::POWER1, "W", Some(Power), Some(Measurement)),
    describe(key::POWER2, "W", Some(Power), Some(Measurement)),
    describe(key::VOL1, "V", Some(Voltage), Some(Measurement)),
    describe(key::VOL2, "V", Some(Voltage), Some(Measurement)),
    describe(key::CURRENT1, "A", Some(Current), Some(Measurement)),
    describe(key::CURRENT2, "A", Some(Current), Some(Measurement)),
    describe(key::GRID_FREQUENCY, "Hz", Some(Frequency), Some(Measurement)),
    describe(key::GRID_VOLTAGE, "V", Some(Voltage), Some(Measurement)),
    describe(key::TEMPERATURE, "°C", Some(Temperature), Some(Measurement)),
    describe(key::TOTAL_ENERGY, "kWh", Some(Energy), Some(TotalIncreasing)),
    describe(key::TODAY_ENERGY, "kWh", Some(Energy), Some(TotalIncreasing)),
    describe(key::FORECAST_ENERGY, "kWh", Some(Energy), Some(Total)),
    describe(key::ESTIMATED_SAVINGS, "€", Some(Monetary), Some(Total)),
    describe(key::STATION_CAPACITY, "kW", Some(Power), Some(Measurement)),
    describe(key::COMPONENT_COUNT, "", None, Some(Measurement)),
    describe(key::INVERTER_EFFICIENCY, "%", None, Some(Measurement)),
    describe(key::POWER_IMBALANCE, "W", Some(Power), Some(Measurement)),
    describe(key::LAST_UPDATE_TIME, "", Some(Timestamp), None),
];

pub fn description(key: &str) -> Option<&'static SensorDescription> {
    SENSOR_DESCRIPTIONS.iter().find(|d| d.key == key)
}

pub fn is_known(key: &str) -> bool {
    description(key).is_some()
}

/// Every selectable key. Default value of the `sensors` option.
pub fn sensor_keys() -> Vec<String> {
    SENSOR_DESCRIPTIONS
        .iter()
        .map(|d| d.key.to_string())
        .collect()
}
