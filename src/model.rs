use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type KWh = f64;

/// Metric keys carried in a [`Reading`].
pub mod key {
    pub const POWER1: &str = "power1";
    pub const POWER2: &str = "power2";
    pub const VOL1: &str = "vol1";
    pub const VOL2: &str = "vol2";
    pub const CURRENT1: &str = "current1";
    pub const CURRENT2: &str = "current2";
    pub const GRID_FREQUENCY: &str = "gridseq";
    pub const GRID_VOLTAGE: &str = "gridvolc";
    pub const TEMPERATURE: &str = "temp";

    pub const STATUS: &str = "status";
    pub const CONNECTION_STATUS: &str = "cstatus";
    pub const TIME: &str = "time";
    pub const SMU_ID: &str = "smuId";
    pub const INVERTER_MODEL_ID: &str = "invModelId";
    pub const SMU_MODEL_ID: &str = "smuModelId";
    pub const COMPONENT_COUNT_RAW: &str = "cmpCount";

    pub const POWER_TOTAL: &str = "power_total";
    pub const TOTAL_ENERGY: &str = "total_energy";
    pub const TODAY_ENERGY: &str = "today_energy";
    pub const FORECAST_ENERGY: &str = "forecast_energy";
    pub const ESTIMATED_SAVINGS: &str = "estimated_savings";
    pub const STATION_CAPACITY: &str = "station_capacity";
    pub const COMPONENT_COUNT: &str = "component_count";
    pub const INVERTER_EFFICIENCY: &str = "inverter_efficiency";
    pub const POWER_IMBALANCE: &str = "power_imbalance";
    pub const LAST_UPDATE_TIME: &str = "last_update_time";

    /// Numeric inverter telemetry, parsed at the API boundary.
    pub const MEASURED: [&str; 9] = [
        POWER1,
        POWER2,
        VOL1,
        VOL2,
        CURRENT1,
        CURRENT2,
        GRID_FREQUENCY,
        GRID_VOLTAGE,
        TEMPERATURE,
    ];

    /// Descriptive inverter fields, kept as text.
    pub const TEXT_ATTRIBUTES: [&str; 6] = [
        STATUS,
        CONNECTION_STATUS,
        TIME,
        SMU_ID,
        INVERTER_MODEL_ID,
        SMU_MODEL_ID,
    ];
}

#[derive(Debug, Clone)]
pub struct Api {
    pub api_url: String,
    pub username: String,
    pub password: String,
}

/// One authenticated session. Lives for a single poll cycle.
#[derive(Debug)]
pub struct LoggedInApi {
    pub api_url: String,
    pub token: String,
    pub client: reqwest::Client,
}

/// Vendor station identifier. Sent back with the JSON type it was received with.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StationId {
    Number(i64),
    Text(String),
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationId::Number(id) => write!(f, "{}", id),
            StationId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: StationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationInfo {
    pub total_energy: KWh,
    pub today_energy: KWh,
    /// Raw vendor capacity (kW), parsed by the derived metrics step.
    pub capacity: Option<serde_json::Value>,
    pub station_count: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Number(_) => None,
            MetricValue::Text(s) => Some(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<String> for MetricValue {
    fn from(s: String) -> Self {
        MetricValue::Text(s)
    }
}

/// Metric values of one station.
pub type Reading = BTreeMap<String, MetricValue>;

/// Readings of every station, as published by the coordinator.
pub type Snapshot = BTreeMap<StationId, Reading>;

pub fn number(reading: &Reading, key: &str) -> Option<f64> {
    reading.get(key).and_then(MetricValue::as_f64)
}
