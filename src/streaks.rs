use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::record::CleanReading;
use crate::stream;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lt" => Ok(CompareOp::Lt),
            "lte" => Ok(CompareOp::Lte),
            "gt" => Ok(CompareOp::Gt),
            "gte" => Ok(CompareOp::Gte),
            other => Err(format!("unknown comparison operator {other:?}")),
        }
    }
}

pub fn compare(value: f64, op: CompareOp, threshold: f64) -> bool {
    match op {
        CompareOp::Lt => value < threshold,
        CompareOp::Lte => value <= threshold,
        CompareOp::Gt => value > threshold,
        CompareOp::Gte => value >= threshold,
    }
}

/// Threshold condition over the primary vital. A reading with no
/// body temperature never matches.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPredicate {
    pub op: CompareOp,
    pub value: f64,
}

impl ThresholdPredicate {
    pub fn matches(&self, reading: &CleanReading) -> bool {
        reading
            .body_temperature
            .map(|value| compare(value, self.op, self.value))
            .unwrap_or(false)
    }
}

/// A maximal run of rank-consecutive predicate-matching readings for one
/// sensor. Length-1 streaks are valid here; the minimum-length filter is the
/// alert summarizer's job.
#[derive(Debug, Clone)]
pub struct Streak {
    pub sensor_id: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub length: u64,
    pub mean_value: f64,
}

/// Gaps-and-islands over one sensor's cleaned stream.
///
/// Two rank sequences are computed with the same ordering rule: the overall
/// sequence number across the whole stream, and an independent 1-based rank
/// over the predicate-matching subset. Their difference is constant exactly
/// along runs of consecutive overall positions that all matched, so each
/// distinct difference identifies one maximal streak.
pub fn detect_streaks(cleaned: &[CleanReading], predicate: &ThresholdPredicate) -> Vec<Streak> {
    let overall = stream::order_stream(cleaned.iter().collect::<Vec<_>>(), |r| r.event_timestamp);
    let matching: Vec<_> = overall
        .into_iter()
        .filter(|s| predicate.matches(s.item))
        .collect();
    let ranked = stream::order_stream(matching, |s| s.item.event_timestamp);

    let mut streaks: Vec<Streak> = Vec::new();
    let mut current_key: Option<i64> = None;
    let mut run: Vec<&CleanReading> = Vec::new();

    for entry in &ranked {
        let group_key = entry.item.seq as i64 - entry.seq as i64;
        if current_key != Some(group_key) {
            if let Some(streak) = summarize_run(&run) {
                streaks.push(streak);
            }
            run.clear();
            current_key = Some(group_key);
        }
        run.push(entry.item.item);
    }
    if let Some(streak) = summarize_run(&run) {
        streaks.push(streak);
    }

    streaks
}

fn summarize_run(run: &[&CleanReading]) -> Option<Streak> {
    let first = run.first()?;
    let last = run.last()?;
    let total: f64 = run.iter().filter_map(|r| r.body_temperature).sum();
    Some(Streak {
        sensor_id: first.sensor_id.clone(),
        start_ts: first.event_timestamp,
        end_ts: last.event_timestamp,
        length: run.len() as u64,
        mean_value: round2(total / run.len() as f64),
    })
}

// Two decimal places, half away from zero (f64::round semantics).
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
