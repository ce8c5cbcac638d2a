use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::alerts::SustainedAlert;
use crate::record::{CleanReading, RawRecord};

/// Reads the raw line-delimited input in one scoped pass. Malformed lines
/// (bad JSON, missing or blank sensor identifier) are skipped and counted,
/// never fatal to the batch.
pub fn read_records(path: &Path) -> Result<(Vec<RawRecord>, u64)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open raw input {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records: Vec<RawRecord> = Vec::new();
    let mut malformed: u64 = 0;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut bytes = line.into_bytes();
        match simd_json::from_slice::<RawRecord>(&mut bytes) {
            Ok(record) if !record.sensor_id.trim().is_empty() => records.push(record),
            Ok(_) => {
                malformed += 1;
                tracing::warn!(line = line_no + 1, "skipped record with blank sensor_id");
            }
            Err(err) => {
                malformed += 1;
                tracing::warn!(line = line_no + 1, error = %err, "skipped malformed record");
            }
        }
    }
    Ok((records, malformed))
}

pub fn write_cleaned(path: &Path, readings: &[CleanReading]) -> Result<()> {
    write_lines(path, readings).with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_alerts(path: &Path, alerts: &[SustainedAlert]) -> Result<()> {
    write_lines(path, alerts).with_context(|| format!("failed to write {}", path.display()))
}

fn write_lines<T: serde::Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
