//! Suppression of implausible energy counter changes between two polls.

use crate::model::{key, KWh, MetricValue, Reading, StationId};
use std::fmt;

/// Energy counters checked against the previous reading.
pub const ENERGY_KEYS: [&str; 2] = [key::TOTAL_ENERGY, key::TODAY_ENERGY];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    /// Lifetime counter went backwards.
    Rollback,
    /// Counter grew by more than the per-poll ceiling.
    Spike,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyKind::Rollback => f.write_str("decrease"),
            AnomalyKind::Spike => f.write_str("unrealistic jump"),
        }
    }
}

/// A vendor value that was replaced by the previous one. Not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyIgnored {
    pub station_id: StationId,
    pub key: &'static str,
    pub kind: AnomalyKind,
    pub previous: KWh,
    pub rejected: KWh,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Filtered {
    pub energy: Reading,
    pub ignored: Vec<AnomalyIgnored>,
}

/// Compare freshly fetched energy counters with the station's previous reading.
///
/// Keys absent from `energy` are left alone, keys absent from `previous` pass
/// through unchecked. A `total_energy` decrease or an increase of either counter above
/// `ceiling` keeps the previous value.
pub fn filter_energy(
    station_id: &StationId,
    previous: Option<&Reading>,
    mut energy: Reading,
    ceiling: KWh,
) -> Filtered {
    let mut ignored = Vec::new();

    for energy_key in ENERGY_KEYS.iter() {
        let new_value = match energy.get(*energy_key).and_then(MetricValue::as_f64) {
            Some(v) => v,
            None => continue,
        };
        let previous_value = match previous
            .and_then(|p| p.get(*energy_key))
            .and_then(MetricValue::as_f64)
        {
            Some(v) => v,
            None => continue,
        };

        let diff = new_value - previous_value;
        let kind = if *energy_key == key::TOTAL_ENERGY && diff < 0.0 {
            AnomalyKind::Rollback
        } else if diff > ceiling {
            AnomalyKind::Spike
        } else {
            continue;
        };

        log::warn!(
            "Ignoring {} in {} for station {}: {} -> {}",
            kind,
            energy_key,
            station_id,
            previous_value,
            new_value
        );
        energy.insert(
            energy_key.to_string(),
            MetricValue::Number(previous_value),
        );
        ignored.push(AnomalyIgnored {
            station_id: station_id.clone(),
            key: *energy_key,
            kind,
            previous: previous_value,
            rejected: new_value,
        });
    }

    Filtered { energy, ignored }
}
