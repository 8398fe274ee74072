pub type Endpoint = str;

pub const API_URL: &str = "http://gf.rockcore-energy.com:9721/rcmi-manager";

pub const LOGIN: &Endpoint = "/client/login";
pub const STATIONS: &Endpoint = "/station/queryStationInfoList";
pub const REALTIME_POWER: &Endpoint = "/inverter/queryInverterRealInfoList";
pub const STATION_INFO: &Endpoint = "/station/queryStationInfo";
