use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::streaks::Streak;

/// A streak long enough to be clinically meaningful. Derived output,
/// recomputed from scratch each run.
#[derive(Debug, Clone, Serialize)]
pub struct SustainedAlert {
    pub sensor_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_ts: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_ts: DateTime<Utc>,
    pub length: u64,
    pub mean_value: f64,
}

impl From<Streak> for SustainedAlert {
    fn from(streak: Streak) -> Self {
        Self {
            sensor_id: streak.sensor_id,
            start_ts: streak.start_ts,
            end_ts: streak.end_ts,
            length: streak.length,
            mean_value: streak.mean_value,
        }
    }
}

/// Keeps streaks of at least `minimum_length`, ordered by
/// `(sensor_id, start_ts)`. Aggregates are passed through untouched.
pub fn summarize(streaks: Vec<Streak>, minimum_length: u64) -> Vec<SustainedAlert> {
    let mut alerts: Vec<SustainedAlert> = streaks
        .into_iter()
        .filter(|streak| streak.length >= minimum_length)
        .map(SustainedAlert::from)
        .collect();
    alerts.sort_by(|a, b| {
        a.sensor_id
            .cmp(&b.sensor_id)
            .then(a.start_ts.cmp(&b.start_ts))
    });
    alerts
}
