use serde::Deserialize;
use serde_json::Value;

/* Values arrive as numbers or unit-suffixed strings depending on firmware */
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    pub total_energy: Option<Value>,
    pub today_energy: Option<Value>,
    pub capacity: Option<Value>,
    pub station_count: Option<Value>,
}

#[derive(Deserialize)]
pub struct StationInfo {
    pub data: Option<Data>,
}
