//! Conversion of vendor value encodings into canonical units.
//!
//! The vendor reports most values as strings with a unit suffix (`"0.5kW"`,
//! `"500Wh"`, `"230V"`, `"42°C"`). Power is normalized to watts and energy to
//! kilowatt-hours.

use serde_json::Value;

/// Checked with `ends_with`, in order. `kw` before `kwh` is fine because a
/// `kwh` string never ends with `kw`.
const SCALED_UNITS: [(&str, f64); 4] = [("kw", 1000.0), ("w", 1.0), ("kwh", 1.0), ("wh", 0.001)];

/// Units stripped without scaling. Mojibake variants of the degree sign come
/// first so their trailing `°c` is not consumed on its own.
const COSMETIC_UNITS: [&str; 9] = [
    "ã‚â°c", "â°c", "â„ƒ", "°c", "℃", "º", "hz", "v", "a",
];

/// Parse a JSON value that may be null, a number or a unit-suffixed string.
pub fn parse_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_str(s),
        _ => None,
    }
}

pub fn parse_str(raw: &str) -> Option<f64> {
    let text = raw.trim().to_lowercase();

    for (unit, multiplier) in SCALED_UNITS.iter() {
        if let Some(number) = text.strip_suffix(unit) {
            return parse_float(number).map(|v| v * multiplier);
        }
    }

    let stripped = COSMETIC_UNITS
        .iter()
        .fold(text, |text, unit| text.replace(unit, ""));
    parse_float(&stripped)
}

/// Frequency is reported in centi-Hz: `5003` is 50.03 Hz.
pub fn parse_frequency(raw: &Value) -> Option<f64> {
    parse_value(raw).map(|centi_hz| centi_hz / 100.0)
}

fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
