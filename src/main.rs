mod alerts;
mod cleaning;
mod config;
mod jsonl;
mod pipeline;
mod record;
mod stream;
mod streaks;

use crate::config::Config;
use crate::pipeline::PipelineParams;
use anyhow::Result;
use chrono::Utc;

fn init_tracing() -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,vitals_pipeline=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing()?;

    let now = Utc::now();
    tracing::info!(input = %config.input_path.display(), "ingesting raw vitals");
    let (records, malformed) = jsonl::read_records(&config.input_path)?;
    tracing::info!(records = records.len(), malformed, "raw input read");

    let params = PipelineParams {
        cleaning: config.cleaning_params(),
        predicate: config.predicate(),
        min_streak_length: config.min_streak_length,
    };
    let summary = pipeline::run_batch(records, params, now).await?;

    jsonl::write_cleaned(&config.cleaned_path, &summary.cleaned)?;
    jsonl::write_alerts(&config.alerts_path, &summary.alerts)?;

    tracing::info!(
        cleaned = summary.stats.cleaned,
        imputed = summary.stats.imputed,
        clamped = summary.stats.clamped,
        dropped_invalid_timestamp = summary.stats.dropped_invalid_timestamp,
        dropped_future_timestamp = summary.stats.dropped_future_timestamp,
        dropped_missing_heart_rate = summary.stats.dropped_missing_heart_rate,
        malformed,
        alerts = summary.alerts.len(),
        cleaned_path = %config.cleaned_path.display(),
        alerts_path = %config.alerts_path.display(),
        "run complete"
    );

    Ok(())
}
