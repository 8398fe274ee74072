use serde::Deserialize;
use serde_json::{Map, Value};

/// One inverter entry. Keys vary by inverter model, so the entry is kept untyped
/// until it is normalized into a `Reading`.
pub type Inverter = Map<String, Value>;

#[derive(Deserialize)]
pub struct RealtimePower {
    pub data: Option<Vec<Inverter>>,
}
