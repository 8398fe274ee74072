pub mod endpoint;
pub mod error;
pub mod response;

use crate::model::{self, key, MetricValue, Reading, StationId};
use crate::options::Options;
use crate::parse::{parse_frequency, parse_value};
pub use error::Error;
use response::login::Login;
use response::realtime_power::{Inverter, RealtimePower};
use response::station_info::StationInfo;
use response::station_list::StationList;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn api(api_url: String, username: String, password: String) -> model::Api {
    model::Api {
        api_url,
        username,
        password,
    }
}

/// Map transport-level failure to Error. 401/403 are authentication failures, anything
/// else (refused connection, timeout, 5xx) is a connectivity problem.
fn map_api_err(error: reqwest::Error) -> Error {
    match error.status() {
        Some(http::StatusCode::UNAUTHORIZED) | Some(http::StatusCode::FORBIDDEN) => {
            Error::Auth(error.to_string())
        }
        _ => Error::Connectivity(error.to_string()),
    }
}

/// Send `request`, check HTTP status and decode the body as JSON.
async fn send(
    request: reqwest::RequestBuilder,
    endpoint: &endpoint::Endpoint,
) -> Result<Value, Error> {
    let response_text = request
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(map_api_err)?
        .text()
        .await
        .map_err(map_api_err)?;

    log::trace!("endpoint: {}, response_text: {}", endpoint, response_text);

    serde_json::from_str(&response_text).map_err(|e| {
        Error::Connectivity(format!("malformed JSON from {}: {}", endpoint, e))
    })
}

fn decode<T: DeserializeOwned>(value: Value, endpoint: &endpoint::Endpoint) -> Result<T, Error> {
    serde_json::from_value(value)
        .map_err(|e| Error::DataShape(format!("{} response: {}", endpoint, e)))
}

pub async fn login(api: &model::Api) -> Result<model::LoggedInApi, Error> {
    let client = reqwest::ClientBuilder::new()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::Connectivity(format!("unable to build HTTP client: {}", e)))?;
    let url = format!("{}{}", api.api_url, endpoint::LOGIN);

    let request_body = json!({
        "loginType": "1",
        "loginName": api.username,
        "password": api.password,
    });

    let value = send(client.post(url).json(&request_body), endpoint::LOGIN).await?;

    serde_json::from_value::<Login>(value)
        .ok()
        .and_then(|response| response.data)
        .and_then(|data| data.token)
        .ok_or_else(|| {
            log::error!("Login response missing required fields");
            Error::Auth(String::from("Missing token in login response"))
        })
        .map(|token| model::LoggedInApi {
            api_url: api.api_url.to_owned(),
            token,
            client,
        })
}

async fn post(
    api: &model::LoggedInApi,
    endpoint: &endpoint::Endpoint,
    data: &Value,
) -> Result<Value, Error> {
    let url = format!("{}{}", api.api_url, endpoint);

    log::trace!("endpoint: {}, data: {}", endpoint, data);

    /* Raw token, the vendor rejects a `Bearer ` prefix */
    let request = api
        .client
        .post(url)
        .header(http::header::AUTHORIZATION, api.token.as_str())
        .json(data);

    send(request, endpoint).await
}

pub async fn stations(api: &model::LoggedInApi) -> Result<Vec<model::Station>, Error> {
    let value = post(api, endpoint::STATIONS, &json!({})).await?;
    let entries = match decode::<StationList>(value, endpoint::STATIONS)?.data {
        Some(entries) if !entries.is_empty() => entries,
        _ => {
            log::error!("Station list response missing 'data'");
            return Err(Error::DataShape(String::from(
                "Missing data in station list response",
            )));
        }
    };

    let stations: Vec<model::Station> = entries
        .into_iter()
        .filter_map(|entry| {
            let id = entry.station_id?;
            let name = entry
                .station_name
                .unwrap_or_else(|| format!("Station {}", id));
            Some(model::Station { id, name })
        })
        .collect();

    if stations.is_empty() {
        log::error!("Station list response missing 'stationId'");
        return Err(Error::DataShape(String::from(
            "Missing stationId in station list response",
        )));
    }
    Ok(stations)
}

/// Read realtime telemetry of the first inverter of `station_id`.
///
/// A station that reports no inverters yields an empty reading.
pub async fn realtime_power(
    api: &model::LoggedInApi,
    station_id: &StationId,
    options: &Options,
) -> Result<Reading, Error> {
    let request_body = json!({ "stationId": station_id });

    let value = post(api, endpoint::REALTIME_POWER, &request_body).await?;
    let inverters = decode::<RealtimePower>(value, endpoint::REALTIME_POWER)?
        .data
        .ok_or_else(|| {
            log::error!("Power data response missing 'data' for station {}", station_id);
            Error::DataShape(String::from("Missing data in power response"))
        })?;

    Ok(inverters
        .first()
        .map(|inverter| normalize_inverter(inverter, options))
        .unwrap_or_default())
}

/// Turn a vendor inverter entry into a typed reading.
///
/// Enabled telemetry keys are parsed into canonical units; descriptive attributes and
/// the component count are kept regardless of the enabled set. `power_total` is
/// computed here, before disabled legs are dropped.
pub fn normalize_inverter(inverter: &Inverter, options: &Options) -> Reading {
    let mut reading = Reading::new();

    for metric in key::MEASURED.iter() {
        let raw = match inverter.get(*metric) {
            Some(raw) if options.is_enabled(metric) => raw,
            _ => continue,
        };
        let parsed = if *metric == key::GRID_FREQUENCY {
            parse_frequency(raw)
        } else {
            parse_value(raw)
        };
        match parsed {
            Some(value) => {
                reading.insert(metric.to_string(), MetricValue::Number(value));
            }
            None => log::debug!("Unparseable {} value: {}", metric, raw),
        }
    }

    /* Summed from the raw legs, whichever of them are enabled */
    if options.is_enabled(key::POWER_TOTAL) {
        let legs: Vec<f64> = [key::POWER1, key::POWER2]
            .iter()
            .filter_map(|leg| inverter.get(*leg))
            .filter_map(parse_value)
            .collect();
        if !legs.is_empty() {
            reading.insert(
                key::POWER_TOTAL.to_string(),
                MetricValue::Number(legs.iter().sum()),
            );
        }
    }

    for attribute in key::TEXT_ATTRIBUTES.iter() {
        let text = match inverter.get(*attribute) {
            Some(Value::String(s)) => s.to_owned(),
            Some(Value::Null) | None => continue,
            Some(other) => other.to_string(),
        };
        reading.insert(attribute.to_string(), MetricValue::Text(text));
    }

    if let Some(raw) = inverter.get(key::COMPONENT_COUNT_RAW) {
        let count = parse_value(raw).unwrap_or(0.0);
        reading.insert(
            key::COMPONENT_COUNT_RAW.to_string(),
            MetricValue::Number(count),
        );
    }

    reading
}

/// Read energy totals and capacity of `station_id`.
pub async fn station_info(
    api: &model::LoggedInApi,
    station_id: &StationId,
) -> Result<model::StationInfo, Error> {
    let request_body = json!({ "stationId": station_id });

    let value = post(api, endpoint::STATION_INFO, &request_body).await?;
    let info = decode::<StationInfo>(value, endpoint::STATION_INFO)?
        .data
        .ok_or_else(|| {
            log::error!("Energy data response missing 'data' for station {}", station_id);
            Error::DataShape(String::from("Missing data in energy response"))
        })?;

    let energy = |raw: &Option<Value>| raw.as_ref().and_then(parse_value).unwrap_or(0.0);

    Ok(model::StationInfo {
        total_energy: energy(&info.total_energy),
        today_energy: energy(&info.today_energy),
        capacity: info.capacity,
        station_count: info.station_count,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use mockito::Matcher;

    const TOKEN: &str = "3f2a9c1e-token";

    fn read_resource(filename: &str) -> String {
        let path = format!("{}/resources/test/{}", env!("CARGO_MANIFEST_DIR"), filename);
        std::fs::read_to_string(path).unwrap()
    }

    fn session(server: &mockito::Server) -> model::LoggedInApi {
        model::LoggedInApi {
            api_url: server.url(),
            token: TOKEN.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn credentials(server: &mockito::Server) -> model::Api {
        api(server.url(), "demo".to_string(), "secret".to_string())
    }

    #[tokio::test]
    async fn login_returns_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", endpoint::LOGIN)
            .match_body(Matcher::Json(json!({
                "loginType": "1",
                "loginName": "demo",
                "password": "secret",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(read_resource("login.json"))
            .create_async()
            .await;

        let logged_in = login(&credentials(&server)).await.unwrap();
        assert_eq!(TOKEN, logged_in.token);
        assert_eq!(server.url(), logged_in.api_url);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn login_failures() {
        let mut server = mockito::Server::new_async().await;
        let _missing_token = server
            .mock("POST", endpoint::LOGIN)
            .match_body(Matcher::PartialJson(json!({"loginName": "demo"})))
            .with_status(200)
            .with_body(r#"{"code": 500, "msg": "wrong password", "data": null}"#)
            .create_async()
            .await;
        let _forbidden = server
            .mock("POST", endpoint::LOGIN)
            .match_body(Matcher::PartialJson(json!({"loginName": "locked"})))
            .with_status(403)
            .create_async()
            .await;

        let err = login(&credentials(&server)).await.unwrap_err();
        assert_eq!(
            Error::Auth("Missing token in login response".to_string()),
            err
        );

        let locked = api(server.url(), "locked".to_string(), "secret".to_string());
        assert!(login(&locked).await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn connectivity_failures() {
        let mut server = mockito::Server::new_async().await;
        let _unavailable = server
            .mock("POST", endpoint::LOGIN)
            .with_status(503)
            .create_async()
            .await;
        let _garbage = server
            .mock("POST", endpoint::STATIONS)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        assert!(matches!(
            login(&credentials(&server)).await,
            Err(Error::Connectivity(_))
        ));
        assert!(matches!(
            stations(&session(&server)).await,
            Err(Error::Connectivity(_))
        ));

        let refused = api(
            "http://127.0.0.1:1".to_string(),
            "demo".to_string(),
            "secret".to_string(),
        );
        assert!(matches!(login(&refused).await, Err(Error::Connectivity(_))));
    }

    #[tokio::test]
    async fn stations_are_listed_with_default_names() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", endpoint::STATIONS)
            .match_header("authorization", TOKEN)
            .match_body(Matcher::Json(json!({})))
            .with_status(200)
            .with_body(read_resource("queryStationInfoList.json"))
            .create_async()
            .await;

        let stations = stations(&session(&server)).await.unwrap();
        assert_eq!(
            vec![
                model::Station {
                    id: StationId::Number(1001),
                    name: "Roof East".to_string(),
                },
                model::Station {
                    id: StationId::Text("A-77".to_string()),
                    name: "Station A-77".to_string(),
                },
            ],
            stations
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stations_without_ids_are_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _empty = server
            .mock("POST", endpoint::STATIONS)
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;
        assert!(matches!(
            stations(&session(&server)).await,
            Err(Error::DataShape(_))
        ));

        let mut server = mockito::Server::new_async().await;
        let _no_ids = server
            .mock("POST", endpoint::STATIONS)
            .with_status(200)
            .with_body(r#"{"data": [{"stationName": "orphan"}]}"#)
            .create_async()
            .await;
        assert_eq!(
            Err(Error::DataShape(
                "Missing stationId in station list response".to_string()
            )),
            stations(&session(&server)).await
        );
    }

    #[tokio::test]
    async fn realtime_power_is_normalized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", endpoint::REALTIME_POWER)
            .match_header("authorization", TOKEN)
            .match_body(Matcher::Json(json!({"stationId": 1001})))
            .with_status(200)
            .with_body(read_resource("queryInverterRealInfoList.json"))
            .create_async()
            .await;

        let reading = realtime_power(
            &session(&server),
            &StationId::Number(1001),
            &Options::default(),
        )
        .await
        .unwrap();

        assert_eq!(Some(300.0), model::number(&reading, key::POWER1));
        assert_eq!(Some(300.0), model::number(&reading, key::POWER2));
        assert_eq!(Some(50.03), model::number(&reading, key::GRID_FREQUENCY));
        assert_eq!(Some(42.0), model::number(&reading, key::TEMPERATURE));
        assert_eq!(Some(2.0), model::number(&reading, key::COMPONENT_COUNT_RAW));
        assert_eq!(
            Some("2025-09-13 22:34:10"),
            reading.get(key::TIME).and_then(MetricValue::as_str)
        );
        assert!(!reading.contains_key("serialNo"));
    }

    #[tokio::test]
    async fn realtime_power_edge_cases() {
        let mut server = mockito::Server::new_async().await;
        let _no_inverters = server
            .mock("POST", endpoint::REALTIME_POWER)
            .match_body(Matcher::Json(json!({"stationId": "A-77"})))
            .with_status(200)
            .with_body(r#"{"code": 200, "data": []}"#)
            .create_async()
            .await;
        let _no_data = server
            .mock("POST", endpoint::REALTIME_POWER)
            .match_body(Matcher::Json(json!({"stationId": 9})))
            .with_status(200)
            .with_body(r#"{"code": 200}"#)
            .create_async()
            .await;

        let api = session(&server);
        let options = Options::default();
        let empty = realtime_power(&api, &StationId::Text("A-77".to_string()), &options)
            .await
            .unwrap();
        assert!(empty.is_empty());

        assert!(matches!(
            realtime_power(&api, &StationId::Number(9), &options).await,
            Err(Error::DataShape(_))
        ));
    }

    #[tokio::test]
    async fn station_info_parses_energy() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", endpoint::STATION_INFO)
            .match_header("authorization", TOKEN)
            .match_body(Matcher::Json(json!({"stationId": 1001})))
            .with_status(200)
            .with_body(read_resource("queryStationInfo.json"))
            .create_async()
            .await;

        let info = station_info(&session(&server), &StationId::Number(1001))
            .await
            .unwrap();
        assert_eq!(1234.5, info.total_energy);
        assert_eq!(3.2, info.today_energy);
        assert_eq!(Some(json!("1")), info.capacity);
        assert_eq!(Some(json!(1)), info.station_count);
    }

    #[test]
    fn disabled_metrics_are_dropped() {
        let inverter: Inverter = serde_json::from_value(json!({
            "power1": "0.3kW",
            "power2": "300W",
            "vol1": "N/A",
            "status": 0,
            "cstatus": null,
        }))
        .unwrap();
        let options = Options {
            sensors: ["power1".to_string(), "vol1".to_string()]
                .iter()
                .cloned()
                .collect(),
            ..Options::default()
        };

        let reading = normalize_inverter(&inverter, &options);
        assert_eq!(Some(300.0), model::number(&reading, key::POWER1));
        assert!(!reading.contains_key(key::POWER2));
        assert!(!reading.contains_key(key::VOL1));
        assert_eq!(
            Some(&MetricValue::Text("0".to_string())),
            reading.get(key::STATUS)
        );
        assert!(!reading.contains_key(key::CONNECTION_STATUS));
        assert!(!reading.contains_key(key::POWER_TOTAL));
    }

    #[test]
    fn power_total_uses_disabled_legs() {
        let inverter: Inverter = serde_json::from_value(json!({
            "power1": "0.3kW",
            "power2": "300W",
        }))
        .unwrap();
        fn enabled(keys: &[&str]) -> Options {
            Options {
                sensors: keys.iter().map(|k| k.to_string()).collect(),
                ..Options::default()
            }
        }

        let reading = normalize_inverter(&inverter, &enabled(&[key::POWER_TOTAL]));
        assert_eq!(Some(600.0), model::number(&reading, key::POWER_TOTAL));
        assert!(!reading.contains_key(key::POWER1));
        assert!(!reading.contains_key(key::POWER2));

        let reading = normalize_inverter(&inverter, &enabled(&[key::POWER1, key::POWER_TOTAL]));
        assert_eq!(Some(600.0), model::number(&reading, key::POWER_TOTAL));
        assert_eq!(Some(300.0), model::number(&reading, key::POWER1));

        let no_legs: Inverter = serde_json::from_value(json!({"power1": "N/A"})).unwrap();
        let reading = normalize_inverter(&no_legs, &enabled(&[key::POWER_TOTAL]));
        assert!(!reading.contains_key(key::POWER_TOTAL));
    }
}
