use serde::Deserialize;
use signet_domain::services::engine::backtest::BacktestConfig;
use signet_domain::services::policy::SignalPolicy;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

pub const EXECUTION_TOKEN_ENV: &str = "SIGNET_EXECUTION_TOKEN";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    pub policy: PolicyConfig,
    pub sizing: SizingConfig,
    pub costs: CostsConfig,
    pub backtest: BacktestTableConfig,
    pub paths: PathsConfig,
    pub gateway: GatewayConfig,
    pub execution: ExecutionConfig,
    pub features: Option<FeaturesConfig>,
    pub db: Option<DbConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub run_id: String,
    pub symbols: Vec<String>,
    pub timeframe: String,
    pub kline_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyConfig {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

#[derive(Debug, Deserialize)]
pub struct SizingConfig {
    /// Monetary size of one open/add order.
    pub trade_notional: f64,
    pub max_position_size: f64,
    pub max_notional: f64,
}

#[derive(Debug, Deserialize)]
pub struct CostsConfig {
    pub transaction_cost_rate: f64,
    pub slippage_rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct BacktestTableConfig {
    pub initial_capital: f64,
    pub buy_fraction: f64,
    pub sell_fraction: f64,
}

#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    pub ohlcv_csv: String,
    pub models_dir: String,
    pub audit_log: String,
    pub prediction_log: Option<String>,
    pub out_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionConfig {
    pub dry_run: bool,
    /// Shared secret gating confirm-execution. Usually left unset here and
    /// supplied through SIGNET_EXECUTION_TOKEN instead.
    pub execution_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeaturesConfig {
    pub sma_windows: Vec<usize>,
    pub volatility_windows: Vec<usize>,
    pub rsi_period: Option<usize>,
    pub static_factors: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
pub struct DbConfig {
    pub url: Option<String>,
    pub audits_table: String,
    pub pool_max_size: Option<u32>,
}

impl Config {
    pub fn signal_policy(&self) -> SignalPolicy {
        SignalPolicy::new(self.policy.buy_threshold, self.policy.sell_threshold)
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.backtest.initial_capital,
            buy_fraction: self.backtest.buy_fraction,
            sell_fraction: self.backtest.sell_fraction,
            transaction_cost_rate: self.costs.transaction_cost_rate,
            slippage_rate: self.costs.slippage_rate,
            ..BacktestConfig::default()
        }
    }

    /// Config value wins; the environment variable is the fallback. `None`
    /// means confirm-execution fails closed.
    pub fn resolve_execution_token(&self) -> Option<String> {
        if let Some(token) = self.execution.execution_token.as_deref() {
            if !token.trim().is_empty() {
                return Some(token.to_string());
            }
        }
        env::var(EXECUTION_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    pub fn kline_limit(&self) -> usize {
        self.run.kline_limit.unwrap_or(250)
    }
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))
}

/// Sanity checks surfaced by the `validate` command before any run.
pub fn validate_config(config: &Config) -> Vec<String> {
    let mut problems = Vec::new();
    if config.run.symbols.is_empty() {
        problems.push("run.symbols must name at least one symbol".to_string());
    }
    if config.policy.buy_threshold <= config.policy.sell_threshold {
        problems.push("policy.buy_threshold must be above policy.sell_threshold".to_string());
    }
    if config.sizing.trade_notional <= 0.0 {
        problems.push("sizing.trade_notional must be positive".to_string());
    }
    if config.sizing.max_notional < config.sizing.trade_notional {
        problems.push("sizing.max_notional is below sizing.trade_notional".to_string());
    }
    if !(0.0..=1.0).contains(&config.backtest.buy_fraction) {
        problems.push("backtest.buy_fraction must be within [0, 1]".to_string());
    }
    if !(0.0..=1.0).contains(&config.backtest.sell_fraction) {
        problems.push("backtest.sell_fraction must be within [0, 1]".to_string());
    }
    if config.backtest.initial_capital <= 0.0 {
        problems.push("backtest.initial_capital must be positive".to_string());
    }
    if config.costs.transaction_cost_rate < 0.0 || config.costs.slippage_rate < 0.0 {
        problems.push("cost rates must not be negative".to_string());
    }
    problems
}
