#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use config::{Config, ConfigError, Environment};
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use serde::Serialize;
use solarcore_rs::api::{self, endpoint};
use solarcore_rs::coordinator::Diagnostics;
use solarcore_rs::model::Reading;
use solarcore_rs::options::{DEFAULT_COST_PER_KWH, DEFAULT_UPDATE_INTERVAL, MAX_ENERGY_JUMP_KWH};
use solarcore_rs::status::StationFlags;
use solarcore_rs::{Coordinator, Options, Poller, RefreshOutcome, UpdateFailed};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

mod metrics;

#[derive(Clone, serde::Deserialize)]
pub struct SolarcoreConfig {
    api_url: String,
    username: String,
    password: String,
    update_interval: u64,
    cost_per_kwh: f64,
    /// All sensors when unset.
    sensors: Option<Vec<String>>,
    max_energy_jump_kwh: f64,
}

impl SolarcoreConfig {
    fn options(&self) -> Options {
        let defaults = Options::default();
        Options {
            update_interval: self.update_interval,
            cost_per_kwh: self.cost_per_kwh,
            sensors: self
                .sensors
                .as_ref()
                .map(|keys| keys.iter().map(|k| k.trim().to_string()).collect())
                .unwrap_or(defaults.sensors),
            max_energy_jump_kwh: self.max_energy_jump_kwh,
        }
    }
}

/// Read settings from `SOLARCORE_*` environment variables.
pub fn read_settings() -> Result<SolarcoreConfig, ConfigError> {
    Config::builder()
        .set_default("api_url", endpoint::API_URL)?
        .set_default("update_interval", DEFAULT_UPDATE_INTERVAL as i64)?
        .set_default("cost_per_kwh", DEFAULT_COST_PER_KWH)?
        .set_default("max_energy_jump_kwh", MAX_ENERGY_JUMP_KWH)?
        .add_source(
            Environment::with_prefix("SOLARCORE")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("sensors"),
        )
        .build()?
        .try_deserialize()
}

#[derive(Serialize)]
struct StationView {
    name: String,
    readings: Reading,
    flags: StationFlags,
}

enum RefreshError {
    Busy,
    Failed(UpdateFailed),
}

impl<'r> Responder<'r, 'static> for RefreshError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error) = match self {
            RefreshError::Busy => (
                Status::Conflict,
                String::from("<html><body><h3>409 Conflict</h3>A poll cycle is already running</body></html>"),
            ),
            RefreshError::Failed(e) if e.cause.is_auth() => (
                Status::Forbidden,
                format!("<html><body><h3>403 Forbidden</h3>Error while authenticating to downstream API: <code>{}</code></body></html>", e),
            ),
            RefreshError::Failed(e) => (
                Status::BadGateway,
                format!("<html><body><h3>502 Bad Gateway</h3><code>{}</code></body></html>", e),
            ),
        };
        Response::build()
            .status(status)
            .sized_body(error.len(), Cursor::new(error))
            .header(ContentType::HTML)
            .ok()
    }
}

#[get("/metrics")]
fn metrics_route(coordinator: &State<Arc<Coordinator>>) -> Result<String, Status> {
    metrics::update(coordinator);
    metrics::read().map_err(|e| {
        log::error!("Unable to encode metrics: {}", e);
        Status::InternalServerError
    })
}

#[get("/snapshot")]
fn snapshot_route(coordinator: &State<Arc<Coordinator>>) -> Json<BTreeMap<String, StationView>> {
    let data = coordinator.data();
    let view = data
        .iter()
        .map(|(station_id, reading)| {
            let station = StationView {
                name: coordinator.station_name(station_id),
                readings: reading.clone(),
                flags: StationFlags::from_reading(reading),
            };
            (station_id.to_string(), station)
        })
        .collect();
    Json(view)
}

#[get("/diagnostics")]
fn diagnostics_route(coordinator: &State<Arc<Coordinator>>) -> Json<Diagnostics> {
    Json(coordinator.diagnostics())
}

#[post("/refresh")]
async fn refresh_route(coordinator: &State<Arc<Coordinator>>) -> Result<String, RefreshError> {
    match coordinator.refresh().await {
        Ok(RefreshOutcome::Updated(data)) => Ok(format!("updated {} stations", data.len())),
        Ok(RefreshOutcome::Skipped) => Err(RefreshError::Busy),
        Err(e) => Err(RefreshError::Failed(e)),
    }
}

fn rocket(coordinator: Arc<Coordinator>) -> Rocket<Build> {
    rocket::build().manage(coordinator).mount(
        "/",
        routes![metrics_route, snapshot_route, diagnostics_route, refresh_route],
    )
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let settings = read_settings()?;
    let api = api::api(
        settings.api_url.to_owned(),
        settings.username.to_owned(),
        settings.password.to_owned(),
    );
    let coordinator = Arc::new(Coordinator::new(api, settings.options())?);

    let poller = Poller::spawn(Arc::clone(&coordinator));
    let launched = rocket(coordinator).launch().await;
    poller.shutdown().await;

    launched?;
    Ok(())
}
