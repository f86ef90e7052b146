use anyhow::{Context, Result};

use vol_eval::config::Config;
use vol_eval::ingest;
use vol_eval::loader;
use vol_eval::store::VolatilityStore;

fn main() -> Result<()> {
    // Load config
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure config/default.toml exists");
            std::process::exit(1);
        }
    };

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .init();

    let policy = config.load.failure_policy()?;
    tracing::info!(
        store = %config.store.path.display(),
        policy = ?policy,
        "starting vol-eval"
    );

    // Connection failure is fatal before any work begins; the handle is
    // released on every exit path when it drops.
    let mut store = VolatilityStore::open(&config.store.path)
        .with_context(|| format!("failed to open store at {}", config.store.path.display()))?;

    let daily = ingest::read_series(&config.inputs.garch_forecast)
        .context("failed to read daily GARCH forecasts")?;
    let smoothed = ingest::read_series(&config.inputs.garch_21d_smoothed)
        .context("failed to read 21d smoothed GARCH forecasts")?;
    let realised = ingest::read_series_column(
        &config.inputs.realised_volatility,
        &config.inputs.realised_date_column,
        &config.inputs.realised_value_column,
    )
    .context("failed to read realised volatility")?;

    tracing::info!(
        daily = daily.len(),
        smoothed = smoothed.len(),
        realised = realised.len(),
        "input series loaded"
    );

    let report = loader::run(
        &mut store,
        &daily,
        &realised,
        &smoothed,
        &loader::reference_model_performance(),
        policy,
    )
    .context("pipeline run failed")?;

    for row in &report.recent_forecasts {
        tracing::info!(
            date = %row.date,
            garch = row.garch_forecast,
            realised = row.realised_volatility,
            abs_error = row.abs_error,
            "recent forecast"
        );
    }
    tracing::info!(
        forecasts = report.counts.forecasts,
        performance = report.counts.performance,
        regimes = report.counts.regimes,
        "all data loaded"
    );

    Ok(())
}
