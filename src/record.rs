use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Raw reading as it appears on the ingest boundary, one JSON object per line.
///
/// Only `sensor_id` is required; everything else is tolerated as missing and
/// resolved (or dropped) by the cleaning pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub sensor_id: String,
    #[serde(default)]
    pub event_timestamp: Option<RawTimestamp>,
    #[serde(default)]
    pub body_temperature: Option<f64>,
    #[serde(default)]
    pub heart_rate: Option<f64>,
    #[serde(default, rename = "spO2")]
    pub spo2: Option<i64>,
    #[serde(default)]
    pub battery_level: Option<i64>,
}

/// Upstream devices report timestamps as RFC-3339 strings, unix milliseconds,
/// or unix seconds with a fractional part.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Str(String),
    Int(i64),
    Float(f64),
}

impl RawTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Str(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            RawTimestamp::Int(ms) => millis_to_dt(*ms),
            RawTimestamp::Float(ts) => millis_to_dt((*ts * 1000.0) as i64),
        }
    }
}

fn millis_to_dt(ms: i64) -> Option<DateTime<Utc>> {
    let secs = ms.div_euclid(1000);
    let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

/// Analysis-ready reading emitted by the cleaning pipeline.
///
/// `event_timestamp` is normalized to unix milliseconds on the wire for the
/// downstream loaders; `heart_rate` is guaranteed present (readings with no
/// recoverable heart rate are dropped before this type is built).
#[derive(Debug, Clone, Serialize)]
pub struct CleanReading {
    pub sensor_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub event_timestamp: DateTime<Utc>,
    pub body_temperature: Option<f64>,
    pub heart_rate: f64,
    #[serde(rename = "spO2")]
    pub spo2: Option<i64>,
    pub battery_level: Option<i64>,
    pub heart_rate_imputed: bool,
    pub body_temperature_clamped: bool,
}
