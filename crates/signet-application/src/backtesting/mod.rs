use crate::config::Config;
use crate::shared::{config_snapshot_json, summary_meta_json, timeframe_seconds};
use signet_domain::errors::TradeError;
use signet_domain::repositories::artifacts::ArtifactWriter;
use signet_domain::repositories::features::FeatureVectorProducer;
use signet_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use signet_domain::repositories::predictor::ModelRepository;
use signet_domain::services::engine::backtest::BacktestSimulator;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info_span;

/// Replay the configured symbol's history through the shared signal policy
/// and write the run's artifacts. Returns the run directory.
pub fn run_backtest(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    market_data: &dyn MarketDataRepository,
    features: &dyn FeatureVectorProducer,
    models: &dyn ModelRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<PathBuf, String> {
    let symbol = config
        .run
        .symbols
        .first()
        .ok_or_else(|| "run.symbols must name at least one symbol".to_string())?;

    let _span = info_span!(
        "run_backtest",
        run_id = %config.run.run_id,
        symbol = %symbol,
        timeframe = %config.run.timeframe
    )
    .entered();

    let expected_step = timeframe_seconds(&config.run.timeframe)?;

    let stage_start = Instant::now();
    let (bars, report) = market_data.load_ohlcv(&OhlcvQuery {
        symbol: symbol.clone(),
        timeframe: config.run.timeframe.clone(),
        expected_step_seconds: Some(expected_step),
    })?;
    metrics::histogram!("signet.backtest.load_ohlcv_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    if report.has_issues() {
        tracing::warn!(
            duplicates = report.duplicates,
            gaps = report.gaps,
            out_of_order = report.out_of_order,
            invalid_close = report.invalid_close,
            dropped_timestamps = report.dropped_timestamps,
            "loaded OHLCV with quality issues"
        );
    }
    if bars.is_empty() {
        return Err(format!("no historical bars available for {symbol}"));
    }

    let stage_start = Instant::now();
    let series = features
        .generate(&bars)
        .map_err(|err| format!("feature generation failed: {err}"))?;
    metrics::histogram!("signet.backtest.features_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    let bundle = models
        .load(symbol)
        .map_err(|err| format!("model load failed: {err}"))?
        .ok_or_else(|| {
            TradeError::ModelUnavailable {
                symbol: symbol.clone(),
            }
            .to_string()
        })?;
    let correction = match models.load_correction() {
        Ok(correction) => correction,
        Err(err) => {
            tracing::warn!(error = %err, "correction model unavailable, using base predictions");
            None
        }
    };

    let stage_start = Instant::now();
    let simulator = BacktestSimulator::new(
        config.signal_policy(),
        &bundle,
        correction.as_deref(),
        config.backtest_config(),
    );
    let results = simulator
        .run(&bars, &series.vectors)
        .map_err(|err| format!("backtest failed: {err}"))?;
    let engine_ms = stage_start.elapsed().as_millis() as f64;
    metrics::histogram!("signet.backtest.engine_ms").record(engine_ms);
    metrics::gauge!("signet.backtest.bars_processed")
        .set(results.summary.bars_processed as f64);
    metrics::gauge!("signet.backtest.trades").set(results.summary.trades as f64);

    tracing::info!(
        bars = results.summary.bars_processed,
        trades = results.summary.trades,
        total_return = results.summary.total_return,
        holds_forced = results.summary.holds_forced,
        "backtest complete"
    );

    let base_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    let run_dir = base_dir.join(&config.run.run_id);
    artifacts.ensure_dir(&run_dir)?;
    artifacts.write_trades_csv(run_dir.join("trades.csv").as_path(), &results.trades)?;
    artifacts.write_equity_csv(run_dir.join("equity.csv").as_path(), &results.equity)?;
    let meta = summary_meta_json(config, symbol, &results.equity);
    let snapshot = config_snapshot_json(config);
    artifacts.write_summary_json(
        run_dir.join("summary.json").as_path(),
        &results.summary,
        meta.as_ref(),
        Some(&snapshot),
    )?;
    artifacts
        .write_config_snapshot_toml(run_dir.join("config_snapshot.toml").as_path(), config_toml)?;

    Ok(run_dir)
}
