//! Poll cycle orchestration.
//!
//! A cycle logs in, discovers stations, fetches and sanitizes every station's readings
//! and publishes a fresh [`Snapshot`]. A failed cycle publishes nothing; the previous
//! snapshot stays authoritative until the next successful cycle.

use crate::anomaly::{self, AnomalyIgnored};
use crate::api;
use crate::derived;
use crate::model::{self, key, MetricValue, Reading, Snapshot, StationId};
use crate::options::{Options, OptionsError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Consecutive failed cycles after which the connectivity problem is raised.
pub const FAILURE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CyclePhase {
    Idle,
    Authenticating,
    Discovering,
    FetchingStation(usize),
    Publishing,
    Error,
}

/// Cycle-level failure. Carries the API error that aborted the cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Error updating data: {cause}")]
pub struct UpdateFailed {
    #[source]
    pub cause: api::Error,
    /// Consecutive failures including this one.
    pub failed_updates: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Updated(Arc<Snapshot>),
    /// Another cycle was still running.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub stations: Vec<StationId>,
    pub last_update: Option<String>,
    pub errors: Option<String>,
    pub failed_updates: u32,
    pub connection_problem: bool,
    pub anomalies_ignored: u64,
}

#[derive(Debug)]
struct State {
    data: Arc<Snapshot>,
    station_ids: Vec<StationId>,
    station_names: BTreeMap<StationId, String>,
    failed_updates: u32,
    connection_problem: bool,
    phase: CyclePhase,
    last_update_success: bool,
    last_update_success_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
    anomalies_ignored: u64,
}

impl Default for State {
    fn default() -> Self {
        State {
            data: Arc::new(Snapshot::new()),
            station_ids: Vec::new(),
            station_names: BTreeMap::new(),
            failed_updates: 0,
            connection_problem: false,
            phase: CyclePhase::Idle,
            last_update_success: true,
            last_update_success_time: None,
            last_error: None,
            anomalies_ignored: 0,
        }
    }
}

/// Owns credentials, options and the published snapshot of one vendor account.
#[derive(Debug)]
pub struct Coordinator {
    api: model::Api,
    options: RwLock<Options>,
    state: Mutex<State>,
    /// Held for the duration of a cycle.
    cycle: tokio::sync::Mutex<()>,
}

/// Resets the phase when a cycle ends, including when its future is dropped.
struct PhaseReset<'a>(&'a Coordinator);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        self.0.set_phase(CyclePhase::Idle);
    }
}

impl Coordinator {
    pub fn new(api: model::Api, options: Options) -> Result<Self, OptionsError> {
        Ok(Coordinator {
            api,
            options: RwLock::new(options.validate()?),
            state: Mutex::new(State::default()),
            cycle: tokio::sync::Mutex::new(()),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: CyclePhase) {
        log::debug!("Poll cycle phase: {:?}", phase);
        self.lock_state().phase = phase;
    }

    pub fn options(&self) -> Options {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace options; takes effect from the next cycle.
    pub fn update_options(&self, options: Options) -> Result<(), OptionsError> {
        let options = options.validate()?;
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
        Ok(())
    }

    /// Latest published snapshot.
    pub fn data(&self) -> Arc<Snapshot> {
        Arc::clone(&self.lock_state().data)
    }

    pub fn station_ids(&self) -> Vec<StationId> {
        self.lock_state().station_ids.clone()
    }

    pub fn station_names(&self) -> BTreeMap<StationId, String> {
        self.lock_state().station_names.clone()
    }

    /// Display name of `station_id`, `Station {id}` if the vendor never named it.
    pub fn station_name(&self, station_id: &StationId) -> String {
        self.lock_state()
            .station_names
            .get(station_id)
            .cloned()
            .unwrap_or_else(|| format!("Station {}", station_id))
    }

    pub fn failed_updates(&self) -> u32 {
        self.lock_state().failed_updates
    }

    /// Sticky indicator, raised after [`FAILURE_THRESHOLD`] consecutive failures and
    /// cleared by the next successful cycle.
    pub fn connection_problem(&self) -> bool {
        self.lock_state().connection_problem
    }

    pub fn phase(&self) -> CyclePhase {
        self.lock_state().phase
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let state = self.lock_state();
        Diagnostics {
            stations: state.station_ids.clone(),
            last_update: state
                .last_update_success_time
                .map(|t| t.to_rfc3339()),
            errors: if state.last_update_success {
                None
            } else {
                Some(
                    state
                        .last_error
                        .clone()
                        .unwrap_or_else(|| String::from("Unknown error")),
                )
            },
            failed_updates: state.failed_updates,
            connection_problem: state.connection_problem,
            anomalies_ignored: state.anomalies_ignored,
        }
    }

    /// Run one poll cycle unless one is already running.
    pub async fn refresh(&self) -> Result<RefreshOutcome, UpdateFailed> {
        let _cycle = match self.cycle.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::info!("Poll cycle still running; skipping this invocation");
                return Ok(RefreshOutcome::Skipped);
            }
        };
        let _reset = PhaseReset(self);

        let options = self.options();
        let previous = self.data();

        match self.run_cycle(&options, &previous).await {
            Ok((snapshot, ignored)) => Ok(RefreshOutcome::Updated(self.publish(snapshot, ignored))),
            Err(cause) => Err(self.record_failure(cause)),
        }
    }

    async fn run_cycle(
        &self,
        options: &Options,
        previous: &Snapshot,
    ) -> Result<(Snapshot, Vec<AnomalyIgnored>), api::Error> {
        self.set_phase(CyclePhase::Authenticating);
        let session = api::login(&self.api).await?;

        self.set_phase(CyclePhase::Discovering);
        let stations = api::stations(&session).await?;
        self.replace_stations(&stations);

        let mut snapshot = Snapshot::new();
        let mut ignored = Vec::new();
        for (index, station) in stations.iter().enumerate() {
            self.set_phase(CyclePhase::FetchingStation(index));
            let (reading, mut station_ignored) =
                update_station(&session, &station.id, previous.get(&station.id), options).await?;
            snapshot.insert(station.id.clone(), reading);
            ignored.append(&mut station_ignored);
        }

        Ok((snapshot, ignored))
    }

    /// Discovered ids replace the known set; names are merged so stale stations keep theirs.
    fn replace_stations(&self, stations: &[model::Station]) {
        let mut state = self.lock_state();
        state.station_ids = stations.iter().map(|s| s.id.clone()).collect();
        for station in stations {
            state
                .station_names
                .insert(station.id.clone(), station.name.clone());
        }
    }

    fn publish(&self, snapshot: Snapshot, ignored: Vec<AnomalyIgnored>) -> Arc<Snapshot> {
        let mut state = self.lock_state();
        state.phase = CyclePhase::Publishing;

        if state.connection_problem {
            log::info!("Connection to vendor API restored");
        }
        state.failed_updates = 0;
        state.connection_problem = false;
        state.last_update_success = true;
        state.last_update_success_time = Some(Utc::now());
        state.last_error = None;
        state.anomalies_ignored += ignored.len() as u64;
        state.data = Arc::new(snapshot);

        log::debug!("Published readings of {} stations", state.data.len());
        Arc::clone(&state.data)
    }

    fn record_failure(&self, cause: api::Error) -> UpdateFailed {
        let mut state = self.lock_state();
        state.phase = CyclePhase::Error;
        state.failed_updates += 1;
        state.last_update_success = false;
        state.last_error = Some(cause.to_string());

        log::warn!(
            "Error updating data ({} consecutive): {}",
            state.failed_updates,
            cause
        );
        if state.failed_updates >= FAILURE_THRESHOLD && !state.connection_problem {
            state.connection_problem = true;
            log::error!(
                "Vendor API unreachable for {} consecutive cycles",
                state.failed_updates
            );
        }

        UpdateFailed {
            cause,
            failed_updates: state.failed_updates,
        }
    }
}

/// Fetch, sanitize and enrich the reading of one station.
pub async fn update_station(
    session: &model::LoggedInApi,
    station_id: &StationId,
    previous: Option<&Reading>,
    options: &Options,
) -> Result<(Reading, Vec<AnomalyIgnored>), api::Error> {
    let (mut reading, info) = tokio::try_join!(
        api::realtime_power(session, station_id, options),
        api::station_info(session, station_id),
    )?;

    let energy: Reading = [
        (key::TOTAL_ENERGY, info.total_energy),
        (key::TODAY_ENERGY, info.today_energy),
    ]
    .iter()
    .filter(|(k, _)| options.is_enabled(k))
    .map(|(k, v)| (k.to_string(), MetricValue::Number(*v)))
    .collect();

    let filtered =
        anomaly::filter_energy(station_id, previous, energy, options.max_energy_jump_kwh);
    reading.extend(filtered.energy);

    let calculated = derived::derive(&reading, &info, options);
    reading.extend(calculated);

    Ok((reading, filtered.ignored))
}

/// Periodic driver of a [`Coordinator`].
///
/// Dropping or shutting down the poller cancels the timer and any in-flight cycle.
#[derive(Debug)]
pub struct Poller {
    handle: Option<JoinHandle<()>>,
}

fn ticker(start: Instant, period: time::Duration) -> Interval {
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

impl Poller {
    /// Start polling now, then every `update_interval` seconds.
    pub fn spawn(coordinator: Arc<Coordinator>) -> Self {
        let handle = tokio::spawn(async move {
            let mut period = coordinator.options().interval();
            let mut interval = ticker(Instant::now(), period);

            loop {
                interval.tick().await;
                if let Ok(RefreshOutcome::Updated(snapshot)) = coordinator.refresh().await {
                    log::info!("Updated {} stations", snapshot.len());
                }

                let wanted = coordinator.options().interval();
                if wanted != period {
                    log::info!("Update interval changed to {}s", wanted.as_secs());
                    period = wanted;
                    interval = ticker(Instant::now() + period, period);
                }
            }
        });

        Poller {
            handle: Some(handle),
        }
    }

    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            match handle.await {
                Err(e) if e.is_cancelled() => log::debug!("Poller stopped"),
                Err(e) => log::error!("Poller task failed: {}", e),
                Ok(()) => {}
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
