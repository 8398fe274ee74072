use crate::model::{self, key, MetricValue, Reading, StationInfo};
use crate::options::Options;
use crate::parse::parse_value;
use chrono::NaiveDateTime;

const VENDOR_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ISO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Naive forecast: the next period produces what was produced today.
pub fn forecast(reading: &Reading, cost_per_kwh: f64) -> Reading {
    let mut forecast = Reading::new();
    if let Some(today_energy) = model::number(reading, key::TODAY_ENERGY) {
        forecast.insert(
            key::FORECAST_ENERGY.to_string(),
            MetricValue::Number(today_energy),
        );
        forecast.insert(
            key::ESTIMATED_SAVINGS.to_string(),
            MetricValue::Number(round2(today_energy * cost_per_kwh)),
        );
    }
    forecast
}

/// Vendor `time` (`2025-09-13 22:34:10`) as ISO-8601, `None` if malformed.
pub fn iso_timestamp(vendor_time: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(vendor_time.trim(), VENDOR_TIME_FORMAT)
        .ok()
        .map(|t| t.format(ISO_TIME_FORMAT).to_string())
}

/// Compute derived metrics of one station from its merged power and energy reading.
///
/// Only keys enabled in `options` are returned. The result depends on raw telemetry and
/// `info` only, so applying it to an already enriched reading gives the same values.
pub fn derive(reading: &Reading, info: &StationInfo, options: &Options) -> Reading {
    let mut derived = forecast(reading, options.cost_per_kwh);

    let power1 = model::number(reading, key::POWER1);
    let power2 = model::number(reading, key::POWER2);

    /* The API layer sums the raw legs; fall back to the enabled ones */
    let power_total = model::number(reading, key::POWER_TOTAL).or_else(|| match (power1, power2) {
        (None, None) => None,
        (p1, p2) => Some(p1.unwrap_or(0.0) + p2.unwrap_or(0.0)),
    });
    if let Some(power_total) = power_total {
        derived.insert(
            key::POWER_TOTAL.to_string(),
            MetricValue::Number(power_total),
        );
    }

    let capacity = info
        .capacity
        .as_ref()
        .map(|raw| parse_value(raw).unwrap_or(0.0));
    if let Some(capacity) = capacity {
        derived.insert(
            key::STATION_CAPACITY.to_string(),
            MetricValue::Number(capacity),
        );
    }

    let component_count = model::number(reading, key::COMPONENT_COUNT_RAW)
        .map(f64::trunc)
        .unwrap_or(0.0);
    derived.insert(
        key::COMPONENT_COUNT.to_string(),
        MetricValue::Number(component_count),
    );

    match (power_total, capacity) {
        (Some(power_total), Some(capacity)) if power_total != 0.0 && capacity > 0.0 => {
            /* capacity is in kW */
            let efficiency = (power_total / (capacity * 1000.0) * 100.0).min(100.0);
            derived.insert(
                key::INVERTER_EFFICIENCY.to_string(),
                MetricValue::Number(round2(efficiency)),
            );
        }
        _ => {}
    }

    if let (Some(power1), Some(power2)) = (power1, power2) {
        derived.insert(
            key::POWER_IMBALANCE.to_string(),
            MetricValue::Number((power1 - power2).abs()),
        );
    }

    if let Some(time) = reading.get(key::TIME).and_then(MetricValue::as_str) {
        match iso_timestamp(time) {
            Some(timestamp) => {
                derived.insert(
                    key::LAST_UPDATE_TIME.to_string(),
                    MetricValue::Text(timestamp),
                );
            }
            None => log::debug!("Unparseable inverter time: {}", time),
        }
    }

    derived.retain(|k, _| options.is_enabled(k));
    derived
}
