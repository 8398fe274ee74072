use prometheus::{Encoder, Gauge, GaugeVec, TextEncoder};
use solarcore_rs::model::MetricValue;
use solarcore_rs::sensor;
use solarcore_rs::status::StationFlags;
use solarcore_rs::Coordinator;

lazy_static! {
    static ref STATION_METRIC_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "solarcore_station_metric",
            "latest published station metric, in the unit given by the `unit` label",
        ),
        &["station_id", "station_name", "key", "unit"],
    )
    .unwrap();
    static ref STATION_FLAG_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("solarcore_station_flag", "station status flag (1 = set)",),
        &["station_id", "station_name", "flag"],
    )
    .unwrap();
    static ref FAILED_UPDATES_GAUGE: Gauge = register_gauge!(opts!(
        "solarcore_failed_updates",
        "consecutive failed poll cycles",
    ))
    .unwrap();
    static ref CONNECTION_PROBLEM_GAUGE: Gauge = register_gauge!(opts!(
        "solarcore_connection_problem",
        "1 while the vendor API has failed three or more consecutive cycles",
    ))
    .unwrap();
}

/// Copy the coordinator's latest snapshot into the Prometheus registry.
///
/// Gauges are reset first so stations that disappeared from the snapshot stop being
/// reported.
pub fn update(coordinator: &Coordinator) {
    let data = coordinator.data();

    STATION_METRIC_GAUGE.reset();
    STATION_FLAG_GAUGE.reset();

    for (station_id, reading) in data.iter() {
        let station_name = coordinator.station_name(station_id);
        let station_id = station_id.to_string();

        for (key, value) in reading {
            /* text values and raw attributes are not exported */
            if let (Some(description), MetricValue::Number(value)) =
                (sensor::description(key), value)
            {
                STATION_METRIC_GAUGE
                    .with_label_values(&[
                        station_id.as_str(),
                        station_name.as_str(),
                        key.as_str(),
                        description.unit,
                    ])
                    .set(*value);
            }
        }

        for (flag, set) in StationFlags::from_reading(reading).iter() {
            STATION_FLAG_GAUGE
                .with_label_values(&[station_id.as_str(), station_name.as_str(), flag])
                .set(if set { 1.0 } else { 0.0 });
        }
    }

    FAILED_UPDATES_GAUGE.set(f64::from(coordinator.failed_updates()));
    CONNECTION_PROBLEM_GAUGE.set(if coordinator.connection_problem() {
        1.0
    } else {
        0.0
    });
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, String> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
