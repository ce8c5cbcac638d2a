use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

use crate::cleaning::{CleaningParams, PlausibleRange};
use crate::streaks::{CompareOp, ThresholdPredicate};

/// Reads an optional numeric parameter. Unset or blank means "use the
/// default"; a value that does not parse aborts startup rather than silently
/// running with the default.
fn numeric_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = trimmed
        .parse::<T>()
        .with_context(|| format!("{key} is invalid: {raw:?}"))?;
    Ok(Some(value))
}

#[derive(Clone, Debug)]
pub struct Config {
    pub input_path: PathBuf,
    pub cleaned_path: PathBuf,
    pub alerts_path: PathBuf,
    pub fever_threshold: f64,
    pub fever_op: CompareOp,
    pub min_streak_length: u64,
    pub imputation_window: usize,
    pub temp_range_low: f64,
    pub temp_range_high: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let input_path = env::var("VITALS_INPUT_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .context("VITALS_INPUT_PATH is required")?;

        let sibling = |name: &str| -> PathBuf {
            input_path
                .parent()
                .map(|dir| dir.join(name))
                .unwrap_or_else(|| PathBuf::from(name))
        };
        let cleaned_path = env::var("VITALS_CLEANED_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| sibling("vitals_cleaned.jsonl"));
        let alerts_path = env::var("VITALS_ALERTS_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| sibling("vitals_alerts.jsonl"));

        let fever_threshold = numeric_env::<f64>("VITALS_FEVER_THRESHOLD")?.unwrap_or(40.0);
        let fever_op = env::var("VITALS_FEVER_OP")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|raw| {
                raw.parse::<CompareOp>()
                    .map_err(anyhow::Error::msg)
                    .context("VITALS_FEVER_OP is invalid")
            })
            .transpose()?
            .unwrap_or(CompareOp::Gt);
        let min_streak_length = numeric_env::<u64>("VITALS_MIN_STREAK_LENGTH")?.unwrap_or(3);
        let imputation_window = numeric_env::<usize>("VITALS_IMPUTATION_WINDOW")?.unwrap_or(3);
        let temp_range_low = numeric_env::<f64>("VITALS_TEMP_RANGE_LOW")?.unwrap_or(27.0);
        let temp_range_high = numeric_env::<f64>("VITALS_TEMP_RANGE_HIGH")?.unwrap_or(42.6);

        let config = Self {
            input_path,
            cleaned_path,
            alerts_path,
            fever_threshold,
            fever_op,
            min_streak_length,
            imputation_window,
            temp_range_low,
            temp_range_high,
        };
        config.validate()?;
        Ok(config)
    }

    /// Nonsensical parameters abort the run before any processing starts.
    pub fn validate(&self) -> Result<()> {
        if !self.fever_threshold.is_finite() {
            bail!("VITALS_FEVER_THRESHOLD must be finite");
        }
        if self.min_streak_length < 1 {
            bail!("VITALS_MIN_STREAK_LENGTH must be >= 1");
        }
        if self.imputation_window < 1 {
            bail!("VITALS_IMPUTATION_WINDOW must be >= 1");
        }
        if !self.temp_range_low.is_finite() || !self.temp_range_high.is_finite() {
            bail!("temperature range bounds must be finite");
        }
        if self.temp_range_low >= self.temp_range_high {
            bail!(
                "VITALS_TEMP_RANGE_LOW ({}) must be < VITALS_TEMP_RANGE_HIGH ({})",
                self.temp_range_low,
                self.temp_range_high
            );
        }
        Ok(())
    }

    pub fn cleaning_params(&self) -> CleaningParams {
        CleaningParams {
            temperature_range: PlausibleRange {
                low: self.temp_range_low,
                high: self.temp_range_high,
            },
            imputation_window: self.imputation_window,
        }
    }

    pub fn predicate(&self) -> ThresholdPredicate {
        ThresholdPredicate {
            op: self.fever_op,
            value: self.fever_threshold,
        }
    }
}
