use signet_application::config::Config;
use signet_infrastructure::audit::{AuditIndex, JsonlAuditStore};
use signet_infrastructure::exchange::{HttpExchangeGateway, RetryPolicy};
use signet_infrastructure::features::{FeatureContext, IndicatorFeatureProducer};
use signet_infrastructure::market_data::ohlcv::CsvMarketDataRepository;
use signet_infrastructure::models::FileModelRepository;
use signet_infrastructure::persistence::postgres_audit::PostgresAuditIndex;
use std::env;

pub struct CycleInfra {
    pub gateway: HttpExchangeGateway,
    pub models: FileModelRepository,
    pub features: IndicatorFeatureProducer,
    pub audit: JsonlAuditStore,
}

pub struct BacktestInfra {
    pub market_data: CsvMarketDataRepository,
    pub models: FileModelRepository,
    pub features: IndicatorFeatureProducer,
}

pub fn build_cycle_infra(config: &Config) -> Result<CycleInfra, String> {
    Ok(CycleInfra {
        gateway: build_gateway(config)?,
        models: FileModelRepository::new(&config.paths.models_dir),
        features: build_feature_producer(config),
        audit: build_audit_store(config)?,
    })
}

pub fn build_backtest_infra(config: &Config) -> Result<BacktestInfra, String> {
    Ok(BacktestInfra {
        market_data: CsvMarketDataRepository::new(&config.paths.ohlcv_csv),
        models: FileModelRepository::new(&config.paths.models_dir),
        features: build_feature_producer(config),
    })
}

pub fn build_gateway(config: &Config) -> Result<HttpExchangeGateway, String> {
    HttpExchangeGateway::new(
        config.gateway.base_url.clone(),
        config.gateway.api_key.clone(),
        config.gateway.timeout_ms,
        RetryPolicy {
            max_attempts: config.gateway.max_retries.max(1),
            backoff_ms: config.gateway.backoff_ms,
            max_backoff_ms: 10_000,
        },
    )
}

pub fn build_feature_producer(config: &Config) -> IndicatorFeatureProducer {
    let context = match &config.features {
        Some(features) => FeatureContext {
            sma_windows: features.sma_windows.clone(),
            volatility_windows: features.volatility_windows.clone(),
            rsi_period: features.rsi_period,
            static_factors: features.static_factors.clone().unwrap_or_default(),
        },
        None => FeatureContext::default(),
    };
    IndicatorFeatureProducer::new(context)
}

/// The JSONL log is always on; the Postgres index is attached only when
/// [db] is configured and reachable, and the store degrades to log-only
/// when it is not.
pub fn build_audit_store(config: &Config) -> Result<JsonlAuditStore, String> {
    let index = build_audit_index(config);
    JsonlAuditStore::open(&config.paths.audit_log, index)
}

fn build_audit_index(config: &Config) -> Option<Box<dyn AuditIndex>> {
    let db = config.db.as_ref()?;
    let url = match db.url.as_deref() {
        Some(url) if !url.trim().is_empty() => url.to_string(),
        _ => match env::var("SIGNET_DB_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => {
                tracing::warn!("db section configured but no url or SIGNET_DB_URL, audit index disabled");
                return None;
            }
        },
    };

    match PostgresAuditIndex::new(url, db.audits_table.clone(), db.pool_max_size.unwrap_or(4)) {
        Ok(index) => {
            if let Err(err) = index.ensure_schema() {
                tracing::warn!(error = %err, "failed to ensure audits table, audit index disabled");
                return None;
            }
            Some(Box::new(index))
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to initialize audit index, continuing log-only");
            None
        }
    }
}
