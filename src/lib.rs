//! Client and poll coordinator for the Rockcore / Solarcore inverter cloud.
//!
//! [`coordinator::Coordinator`] logs in, discovers stations and turns the vendor's
//! loosely formatted telemetry into a per-station [`model::Snapshot`] of normalized and
//! derived metrics, once per poll cycle.

pub mod anomaly;
pub mod api;
pub mod coordinator;
pub mod derived;
pub mod model;
pub mod options;
pub mod parse;
pub mod sensor;
pub mod status;

pub use api::Error;
pub use coordinator::{Coordinator, Poller, RefreshOutcome, UpdateFailed};
pub use options::Options;
