use crate::model::StationId;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    pub station_id: Option<StationId>,
    pub station_name: Option<String>,
}

#[derive(Deserialize)]
pub struct StationList {
    pub data: Option<Vec<Data>>,
}
