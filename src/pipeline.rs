use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::alerts::{self, SustainedAlert};
use crate::cleaning::{self, CleaningParams, CleaningStats};
use crate::record::{CleanReading, RawRecord};
use crate::stream;
use crate::streaks::{self, Streak, ThresholdPredicate};

#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub cleaning: CleaningParams,
    pub predicate: ThresholdPredicate,
    pub min_streak_length: u64,
}

/// Everything one sensor's run produced. Owned outright; nothing here
/// references another sensor's working set.
#[derive(Debug)]
pub struct SensorReport {
    pub sensor_id: String,
    pub cleaned: Vec<CleanReading>,
    pub streaks: Vec<Streak>,
    pub stats: CleaningStats,
}

#[derive(Debug)]
pub struct RunSummary {
    pub cleaned: Vec<CleanReading>,
    pub alerts: Vec<SustainedAlert>,
    pub stats: CleaningStats,
}

/// Pure per-sensor pipeline: clean, then detect streaks. A sensor whose
/// stream cleans down to nothing simply reports zero streaks.
pub fn process_sensor(
    sensor_id: String,
    records: Vec<RawRecord>,
    params: &PipelineParams,
    now: DateTime<Utc>,
) -> SensorReport {
    let (cleaned, stats) = cleaning::clean_stream(records, &params.cleaning, now);
    let streaks = streaks::detect_streaks(&cleaned, &params.predicate);
    tracing::debug!(
        sensor = %sensor_id,
        cleaned = cleaned.len(),
        streaks = streaks.len(),
        dropped = stats.dropped(),
        "sensor stream processed"
    );
    SensorReport {
        sensor_id,
        cleaned,
        streaks,
        stats,
    }
}

/// Fans the batch out one task per sensor and merges the results in
/// deterministic sensor order. Sensors share nothing, so no synchronization
/// beyond the final join is needed.
pub async fn run_batch(
    records: Vec<RawRecord>,
    params: PipelineParams,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    let params = Arc::new(params);
    let grouped = stream::group_by_sensor(records);

    let mut handles = Vec::with_capacity(grouped.len());
    for (sensor_id, sensor_records) in grouped {
        let params = params.clone();
        handles.push(tokio::spawn(async move {
            process_sensor(sensor_id, sensor_records, &params, now)
        }));
    }

    let mut cleaned: Vec<CleanReading> = Vec::new();
    let mut streaks: Vec<Streak> = Vec::new();
    let mut stats = CleaningStats::default();
    for report in futures::future::try_join_all(handles).await? {
        cleaned.extend(report.cleaned);
        streaks.extend(report.streaks);
        stats.merge(&report.stats);
    }

    let alerts = alerts::summarize(streaks, params.min_streak_length);
    Ok(RunSummary {
        cleaned,
        alerts,
        stats,
    })
}
