use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use thiserror::Error;

use crate::record::{CleanReading, RawRecord};
use crate::stream;

/// Why a reading was removed from its stream. Drops are per-record and never
/// abort the batch; they are counted for observability.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    #[error("timestamp missing or unparseable")]
    InvalidTimestamp,
    #[error("timestamp later than processing time")]
    FutureTimestamp,
    #[error("no heart rate available after imputation")]
    MissingHeartRate,
}

/// Plausible physical range for the primary vital. Values outside are pulled
/// to the nearest bound, never dropped; an out-of-range measurement still
/// carries directional signal.
#[derive(Debug, Clone, Copy)]
pub struct PlausibleRange {
    pub low: f64,
    pub high: f64,
}

impl PlausibleRange {
    /// Returns the clamped value and whether clamping fired.
    pub fn clamp(&self, value: f64) -> (f64, bool) {
        if value < self.low {
            (self.low, true)
        } else if value > self.high {
            (self.high, true)
        } else {
            (value, false)
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleaningParams {
    pub temperature_range: PlausibleRange,
    pub imputation_window: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleaningStats {
    pub input: u64,
    pub cleaned: u64,
    pub clamped: u64,
    pub imputed: u64,
    pub dropped_invalid_timestamp: u64,
    pub dropped_future_timestamp: u64,
    pub dropped_missing_heart_rate: u64,
}

impl CleaningStats {
    pub fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::InvalidTimestamp => self.dropped_invalid_timestamp += 1,
            DropReason::FutureTimestamp => self.dropped_future_timestamp += 1,
            DropReason::MissingHeartRate => self.dropped_missing_heart_rate += 1,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_invalid_timestamp
            + self.dropped_future_timestamp
            + self.dropped_missing_heart_rate
    }

    pub fn merge(&mut self, other: &CleaningStats) {
        self.input += other.input;
        self.cleaned += other.cleaned;
        self.clamped += other.clamped;
        self.imputed += other.imputed;
        self.dropped_invalid_timestamp += other.dropped_invalid_timestamp;
        self.dropped_future_timestamp += other.dropped_future_timestamp;
        self.dropped_missing_heart_rate += other.dropped_missing_heart_rate;
    }
}

/// Trailing mean over the last `window` surviving heart-rate values of one
/// stream. Dropped readings are never pushed, so they take no part in later
/// windows.
#[derive(Debug)]
struct RollingMean {
    window: usize,
    buffer: VecDeque<f64>,
}

impl RollingMean {
    fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            buffer: VecDeque::new(),
        }
    }

    fn push(&mut self, value: f64) {
        self.buffer.push_back(value);
        while self.buffer.len() > self.window {
            self.buffer.pop_front();
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.buffer.is_empty() {
            return None;
        }
        let total: f64 = self.buffer.iter().sum();
        Some(total / self.buffer.len() as f64)
    }
}

struct Timestamped {
    timestamp: DateTime<Utc>,
    record: RawRecord,
}

/// Transforms one sensor's raw stream into analysis-ready readings.
///
/// Steps, in order: timestamp validation (drop unparseable and future-dated),
/// stable chronological ordering, range clamping of the primary vital, and
/// trailing rolling-mean imputation of missing heart rates. Re-running the
/// pipeline on its own output changes nothing: clamping only fires outside
/// the range and imputation only fires on missing values.
pub fn clean_stream(
    records: Vec<RawRecord>,
    params: &CleaningParams,
    now: DateTime<Utc>,
) -> (Vec<CleanReading>, CleaningStats) {
    let mut stats = CleaningStats {
        input: records.len() as u64,
        ..CleaningStats::default()
    };

    let mut timestamped: Vec<Timestamped> = Vec::with_capacity(records.len());
    for record in records {
        let Some(timestamp) = record
            .event_timestamp
            .as_ref()
            .and_then(|raw| raw.to_datetime())
        else {
            stats.record_drop(DropReason::InvalidTimestamp);
            tracing::debug!(sensor = %record.sensor_id, "dropped reading: {}", DropReason::InvalidTimestamp);
            continue;
        };
        if timestamp > now {
            stats.record_drop(DropReason::FutureTimestamp);
            tracing::debug!(sensor = %record.sensor_id, ts = %timestamp, "dropped reading: {}", DropReason::FutureTimestamp);
            continue;
        }
        timestamped.push(Timestamped { timestamp, record });
    }

    let ordered = stream::order_stream(timestamped, |t| t.timestamp);

    let mut rolling = RollingMean::new(params.imputation_window);
    let mut cleaned: Vec<CleanReading> = Vec::with_capacity(ordered.len());
    for entry in ordered {
        let Timestamped { timestamp, record } = entry.item;

        let (body_temperature, clamped) = match record.body_temperature {
            Some(raw) => {
                let (value, clamped) = params.temperature_range.clamp(raw);
                (Some(value), clamped)
            }
            None => (None, false),
        };
        if clamped {
            stats.clamped += 1;
        }

        let (heart_rate, imputed) = match record.heart_rate {
            Some(value) => (value, false),
            None => match rolling.mean() {
                Some(mean) => (mean, true),
                None => {
                    stats.record_drop(DropReason::MissingHeartRate);
                    tracing::debug!(sensor = %record.sensor_id, ts = %timestamp, "dropped reading: {}", DropReason::MissingHeartRate);
                    continue;
                }
            },
        };
        rolling.push(heart_rate);
        if imputed {
            stats.imputed += 1;
        }

        cleaned.push(CleanReading {
            sensor_id: record.sensor_id,
            event_timestamp: timestamp,
            body_temperature,
            heart_rate,
            spo2: record.spo2,
            battery_level: record.battery_level,
            heart_rate_imputed: imputed,
            body_temperature_clamped: clamped,
        });
    }

    stats.cleaned = cleaned.len() as u64;
    (cleaned, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params() -> CleaningParams {
        CleaningParams {
            temperature_range: PlausibleRange {
                low: 27.0,
                high: 42.6,
            },
            imputation_window: 3,
        }
    }

    fn record(ms: i64, temp: Option<f64>, hr: Option<f64>) -> RawRecord {
        let temp = temp.map_or("null".to_string(), |v| v.to_string());
        let hr = hr.map_or("null".to_string(), |v| v.to_string());
        let mut payload = format!(
            r#"{{"sensor_id":"s-1","event_timestamp":{ms},"body_temperature":{temp},"heart_rate":{hr}}}"#
        )
        .into_bytes();
        simd_json::from_slice(&mut payload).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_000_000_000).single().unwrap()
    }

    #[test]
    fn imputes_missing_heart_rates_from_trailing_mean() {
        let records = vec![
            record(0, Some(37.0), Some(72.0)),
            record(1000, Some(37.0), None),
            record(2000, Some(37.0), None),
            record(3000, Some(37.0), Some(80.0)),
        ];
        let (cleaned, stats) = clean_stream(records, &params(), now());

        let rates: Vec<f64> = cleaned.iter().map(|r| r.heart_rate).collect();
        let flags: Vec<bool> = cleaned.iter().map(|r| r.heart_rate_imputed).collect();
        assert_eq!(rates, vec![72.0, 72.0, 72.0, 80.0]);
        assert_eq!(flags, vec![false, true, true, false]);
        assert_eq!(stats.imputed, 2);
        assert_eq!(stats.cleaned, 4);
    }

    #[test]
    fn clamps_out_of_range_temperature_to_nearest_bound() {
        let records = vec![
            record(0, Some(50.0), Some(70.0)),
            record(1000, Some(20.0), Some(70.0)),
            record(2000, Some(38.0), Some(70.0)),
        ];
        let (cleaned, stats) = clean_stream(records, &params(), now());

        assert_eq!(cleaned[0].body_temperature, Some(42.6));
        assert!(cleaned[0].body_temperature_clamped);
        assert_eq!(cleaned[1].body_temperature, Some(27.0));
        assert!(cleaned[1].body_temperature_clamped);
        assert_eq!(cleaned[2].body_temperature, Some(38.0));
        assert!(!cleaned[2].body_temperature_clamped);
        assert_eq!(stats.clamped, 2);
    }

    #[test]
    fn drops_future_dated_readings_before_sequencing() {
        let records = vec![
            record(0, Some(37.0), Some(70.0)),
            record(2_000_000_000, Some(37.0), Some(70.0)),
            record(1000, Some(37.0), Some(70.0)),
        ];
        let (cleaned, stats) = clean_stream(records, &params(), now());

        assert_eq!(cleaned.len(), 2);
        assert_eq!(stats.dropped_future_timestamp, 1);
        assert!(cleaned
            .iter()
            .all(|r| r.event_timestamp <= now()));
    }

    #[test]
    fn drops_unparseable_timestamps() {
        let mut payload =
            br#"{"sensor_id":"s-1","event_timestamp":"garbage","heart_rate":70}"#.to_vec();
        let bad: RawRecord = simd_json::from_slice(&mut payload).unwrap();
        let records = vec![bad, record(0, Some(37.0), Some(70.0))];
        let (cleaned, stats) = clean_stream(records, &params(), now());

        assert_eq!(cleaned.len(), 1);
        assert_eq!(stats.dropped_invalid_timestamp, 1);
    }

    #[test]
    fn drops_entire_stream_when_no_heart_rate_ever_observed() {
        let records = vec![
            record(0, Some(37.0), None),
            record(1000, Some(37.0), None),
            record(2000, Some(37.0), None),
        ];
        let (cleaned, stats) = clean_stream(records, &params(), now());

        assert!(cleaned.is_empty());
        assert_eq!(stats.dropped_missing_heart_rate, 3);
    }

    #[test]
    fn dropped_readings_do_not_feed_later_imputation_windows() {
        // The two leading hr-less readings are dropped; the window for the
        // final gap is seeded only by surviving readings.
        let records = vec![
            record(0, Some(37.0), None),
            record(1000, Some(37.0), None),
            record(2000, Some(37.0), Some(60.0)),
            record(3000, Some(37.0), None),
        ];
        let (cleaned, _) = clean_stream(records, &params(), now());

        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[1].heart_rate, 60.0);
        assert!(cleaned[1].heart_rate_imputed);
    }

    #[test]
    fn missing_temperature_passes_through_unclamped() {
        let records = vec![record(0, None, Some(70.0))];
        let (cleaned, stats) = clean_stream(records, &params(), now());

        assert_eq!(cleaned[0].body_temperature, None);
        assert!(!cleaned[0].body_temperature_clamped);
        assert_eq!(stats.clamped, 0);
    }

    #[test]
    fn cleaning_is_idempotent_on_its_own_output() {
        let records = vec![
            record(0, Some(50.0), Some(72.0)),
            record(1000, Some(37.0), None),
            record(3000, Some(20.0), Some(80.0)),
        ];
        let (once, _) = clean_stream(records, &params(), now());

        let refed: Vec<RawRecord> = once
            .iter()
            .map(|r| {
                record(
                    r.event_timestamp.timestamp_millis(),
                    r.body_temperature,
                    Some(r.heart_rate),
                )
            })
            .collect();
        let (twice, stats) = clean_stream(refed, &params(), now());

        let key = |r: &CleanReading| {
            (
                r.sensor_id.clone(),
                r.event_timestamp,
                r.body_temperature.map(|v| v.to_bits()),
                r.heart_rate.to_bits(),
            )
        };
        let a: Vec<_> = once.iter().map(key).collect();
        let b: Vec<_> = twice.iter().map(key).collect();
        assert_eq!(a, b);
        assert_eq!(stats.clamped, 0);
        assert_eq!(stats.imputed, 0);
        assert_eq!(stats.dropped(), 0);
    }
}
