use signet_domain::entities::metrics::BacktestSummary;
use signet_domain::repositories::artifacts::ArtifactWriter;
use signet_domain::value_objects::equity_point::EquityPoint;
use signet_domain::value_objects::trade::Trade;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err))
    }

    fn write_trades_csv(&self, path: &Path, trades: &[Trade]) -> Result<(), String> {
        let mut wtr = csv::Writer::from_path(path)
            .map_err(|err| format!("failed to create trades csv {}: {}", path.display(), err))?;
        wtr.write_record([
            "timestamp_utc",
            "side",
            "price",
            "shares",
            "cost_or_revenue",
            "realized_pnl",
        ])
        .map_err(|err| format!("failed to write trades csv header: {}", err))?;

        for trade in trades {
            wtr.write_record([
                trade.timestamp.to_string(),
                trade.side.as_str().to_string(),
                trade.price.to_string(),
                trade.shares.to_string(),
                trade.cost_or_revenue.to_string(),
                trade
                    .realized_pnl
                    .map(|pnl| pnl.to_string())
                    .unwrap_or_default(),
            ])
            .map_err(|err| format!("failed to write trades row: {}", err))?;
        }

        wtr.flush()
            .map_err(|err| format!("failed to flush trades csv: {}", err))
    }

    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String> {
        let mut wtr = csv::Writer::from_path(path)
            .map_err(|err| format!("failed to create equity csv {}: {}", path.display(), err))?;
        wtr.write_record([
            "timestamp_utc",
            "equity",
            "cash",
            "shares_held",
            "daily_return",
        ])
        .map_err(|err| format!("failed to write equity csv header: {}", err))?;

        for point in points {
            wtr.write_record([
                point.timestamp.to_string(),
                point.equity.to_string(),
                point.cash.to_string(),
                point.shares_held.to_string(),
                point.daily_return.to_string(),
            ])
            .map_err(|err| format!("failed to write equity row: {}", err))?;
        }

        wtr.flush()
            .map_err(|err| format!("failed to flush equity csv: {}", err))
    }

    fn write_summary_json(
        &self,
        path: &Path,
        summary: &BacktestSummary,
        meta: Option<&serde_json::Value>,
        config_snapshot: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        let json = serde_json::json!({
            "meta": meta,
            "config_snapshot": config_snapshot,
            "bars_processed": summary.bars_processed,
            "trades": summary.trades,
            "initial_capital": summary.initial_capital,
            "final_cash": summary.final_cash,
            "final_value": summary.final_value,
            "total_return": summary.total_return,
            "annualized_return": summary.annualized_return,
            "sharpe": summary.sharpe,
            "max_drawdown": summary.max_drawdown,
            "win_rate": summary.win_rate,
            "holds_forced": summary.holds_forced,
        });
        let contents = serde_json::to_string_pretty(&json)
            .map_err(|err| format!("failed to serialize summary: {}", err))?;
        fs::write(path, contents)
            .map_err(|err| format!("failed to write summary {}: {}", path.display(), err))
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        fs::write(path, contents).map_err(|err| {
            format!(
                "failed to write config snapshot {}: {}",
                path.display(),
                err
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FilesystemArtifactWriter;
    use signet_domain::entities::metrics::BacktestSummary;
    use signet_domain::repositories::artifacts::ArtifactWriter;
    use signet_domain::value_objects::side::Side;
    use signet_domain::value_objects::trade::Trade;
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
    fn trades_csv_has_header_and_rows() {
        let path = unique_tmp_path("trades.csv");
        let trades = vec![
            Trade {
                timestamp: 1,
                side: Side::Buy,
                price: 100.0,
                shares: 2.0,
                cost_or_revenue: 200.08,
                realized_pnl: None,
            },
            Trade {
                timestamp: 2,
                side: Side::Sell,
                price: 110.0,
                shares: 1.0,
                cost_or_revenue: 109.96,
                realized_pnl: Some(9.92),
            },
        ];
        FilesystemArtifactWriter::new()
            .write_trades_csv(&path, &trades)
            .expect("write");

        let contents = fs::read_to_string(&path).expect("read");
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().starts_with("timestamp_utc,side"));
        assert_eq!(lines.count(), 2);
        assert!(contents.contains("SELL"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn summary_json_is_valid_json_with_metrics() {
        let path = unique_tmp_path("summary.json");
        let summary = BacktestSummary {
            bars_processed: 5,
            trades: 1,
            initial_capital: 1000.0,
            final_value: 1009.96,
            total_return: 0.00996,
            ..BacktestSummary::default()
        };
        FilesystemArtifactWriter::new()
            .write_summary_json(&path, &summary, None, None)
            .expect("write");

        let contents = fs::read_to_string(&path).expect("read");
        let parsed: serde_json::Value = serde_json::from_str(&contents).expect("valid json");
        assert_eq!(parsed["bars_processed"], 5);
        assert!((parsed["total_return"].as_f64().unwrap() - 0.00996).abs() < 1e-12);
        fs::remove_file(&path).ok();
    }
}
