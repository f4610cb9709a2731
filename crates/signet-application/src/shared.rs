use crate::config::Config;
use chrono::Utc;
use signet_domain::value_objects::equity_point::EquityPoint;
use std::fs;
use std::path::Path;

pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Parse a timeframe label like "1m", "5m", "1h" or "1d" into seconds.
pub fn timeframe_seconds(label: &str) -> Result<i64, String> {
    let trimmed = label.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("timeframe '{trimmed}' has no unit"))?;
    let (digits, unit) = trimmed.split_at(split);
    let value: i64 = digits
        .parse()
        .map_err(|err| format!("timeframe '{trimmed}' is not numeric: {err}"))?;
    if value <= 0 {
        return Err(format!("timeframe '{trimmed}' must be positive"));
    }
    let scale = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        other => return Err(format!("unsupported timeframe unit '{other}'")),
    };
    Ok(value * scale)
}

/// Append one base prediction to the offline error-model log. Best-effort:
/// the caller logs a warning on failure and carries on with the cycle.
pub fn log_base_prediction(path: &Path, symbol: &str, base_prediction: f64) -> Result<(), String> {
    let header_needed = fs::metadata(path).map(|meta| meta.len() == 0).unwrap_or(true);

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("failed to open prediction log {}: {}", path.display(), err))?;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if header_needed {
        wtr.write_record([
            "prediction_date",
            "symbol",
            "base_prediction",
            "actual_return",
            "error",
        ])
        .map_err(|err| format!("failed to write prediction log header: {}", err))?;
    }
    wtr.write_record([
        Utc::now().to_rfc3339(),
        symbol.to_string(),
        base_prediction.to_string(),
        String::new(),
        String::new(),
    ])
    .map_err(|err| format!("failed to append prediction log row: {}", err))?;
    wtr.flush()
        .map_err(|err| format!("failed to flush prediction log: {}", err))
}

pub fn summary_meta_json(
    config: &Config,
    symbol: &str,
    equity: &[EquityPoint],
) -> Option<serde_json::Value> {
    let first = equity.first()?;
    let last = equity.last()?;
    Some(serde_json::json!({
        "run_id": config.run.run_id,
        "symbol": symbol,
        "timeframe": config.run.timeframe,
        "start": first.timestamp,
        "end": last.timestamp,
    }))
}

pub fn config_snapshot_json(config: &Config) -> serde_json::Value {
    serde_json::json!({
        "policy": {
            "buy_threshold": config.policy.buy_threshold,
            "sell_threshold": config.policy.sell_threshold,
        },
        "sizing": {
            "trade_notional": config.sizing.trade_notional,
            "max_position_size": config.sizing.max_position_size,
            "max_notional": config.sizing.max_notional,
        },
        "costs": {
            "transaction_cost_rate": config.costs.transaction_cost_rate,
            "slippage_rate": config.costs.slippage_rate,
        },
        "backtest": {
            "initial_capital": config.backtest.initial_capital,
            "buy_fraction": config.backtest.buy_fraction,
            "sell_fraction": config.backtest.sell_fraction,
        },
        "execution": {
            "dry_run": config.execution.dry_run,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::{log_base_prediction, timeframe_seconds};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_tmp_path(name: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("signet_{name}_{}_{}", std::process::id(), now))
    }

    #[test]
    fn prediction_log_writes_header_once() {
        let path = unique_tmp_path("prediction_log.csv");
        log_base_prediction(&path, "BTCUSDT", 0.0123).expect("first append");
        log_base_prediction(&path, "BTCUSDT", -0.004).expect("second append");

        let contents = fs::read_to_string(&path).expect("read log");
        let headers = contents
            .lines()
            .filter(|line| line.starts_with("prediction_date"))
            .count();
        assert_eq!(headers, 1);
        assert_eq!(contents.lines().count(), 3);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn timeframe_labels_parse_to_seconds() {
        assert_eq!(timeframe_seconds("1m").unwrap(), 60);
        assert_eq!(timeframe_seconds("5m").unwrap(), 300);
        assert_eq!(timeframe_seconds("1h").unwrap(), 3_600);
        assert_eq!(timeframe_seconds("1d").unwrap(), 86_400);
        assert!(timeframe_seconds("five minutes").is_err());
        assert!(timeframe_seconds("0m").is_err());
    }
}
