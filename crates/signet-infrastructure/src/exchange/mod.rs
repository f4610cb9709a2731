use reqwest::blocking::Client;
use signet_domain::entities::venue::VenueRules;
use signet_domain::errors::TradeError;
use signet_domain::repositories::exchange::ExchangeGateway;
use signet_domain::value_objects::bar::Bar;
use signet_domain::value_objects::position::{Position, PositionSide};
use signet_domain::value_objects::side::Side;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Bounded transport retry. Applies to reads only; order submissions are
/// never retried because a timed-out submit may already have filled.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 250,
            max_backoff_ms: 10_000,
        }
    }
}

#[derive(Debug)]
struct RequestFailure {
    message: String,
    retryable: bool,
}

pub struct HttpExchangeGateway {
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
    cancel: Arc<AtomicBool>,
    client: Client,
}

impl HttpExchangeGateway {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout_ms: u64,
        retry: RetryPolicy,
    ) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            retry,
            cancel: Arc::new(AtomicBool::new(false)),
            client,
        })
    }

    /// Flag checked between retry attempts; setting it abandons the
    /// remaining attempts of in-flight reads.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn get_json(&self, url: &str) -> Result<serde_json::Value, RequestFailure> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }
        let response = request.send().map_err(|err| RequestFailure {
            message: format!("request failed: {err}"),
            retryable: true,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestFailure {
                message: format!("http status {}", status.as_u16()),
                retryable: status.is_server_error(),
            });
        }

        response.json::<serde_json::Value>().map_err(|err| RequestFailure {
            message: format!("failed to parse response body: {err}"),
            retryable: false,
        })
    }

    fn with_retry<T>(
        &self,
        operation: &'static str,
        attempt_fn: impl Fn() -> Result<T, RequestFailure>,
    ) -> Result<T, String> {
        let mut backoff_ms = self.retry.backoff_ms;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match attempt_fn() {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    if !failure.retryable
                        || attempt >= self.retry.max_attempts.max(1)
                        || self.cancel.load(Ordering::Relaxed)
                    {
                        return Err(format!(
                            "{operation} failed after {attempt} attempt(s): {}",
                            failure.message
                        ));
                    }
                    metrics::counter!("signet.gateway.retries", "operation" => operation)
                        .increment(1);
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %failure.message,
                        "gateway request failed, backing off"
                    );
                    thread::sleep(Duration::from_millis(backoff_ms));
                    backoff_ms = backoff_ms.saturating_mul(2).min(self.retry.max_backoff_ms);
                }
            }
        }
    }
}

impl ExchangeGateway for HttpExchangeGateway {
    fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, TradeError> {
        let url = format!(
            "{}/api/v1/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, timeframe, limit
        );
        let value = self
            .with_retry("fetch_klines", || self.get_json(&url))
            .map_err(TradeError::DataUnavailable)?;
        parse_klines(symbol, &value).map_err(TradeError::DataUnavailable)
    }

    fn fetch_position(&self, symbol: &str) -> Result<Position, TradeError> {
        let url = format!("{}/api/v1/position?symbol={}", self.base_url, symbol);
        let value = self
            .with_retry("fetch_position", || self.get_json(&url))
            .map_err(TradeError::GatewayRejected)?;
        parse_position(symbol, &value).map_err(TradeError::GatewayRejected)
    }

    fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        reduce_only: bool,
    ) -> Result<serde_json::Value, TradeError> {
        let url = format!("{}/api/v1/order", self.base_url);
        let body = serde_json::json!({
            "symbol": symbol,
            "side": side.as_str(),
            "type": "MARKET",
            "quantity": quantity,
            "reduceOnly": reduce_only,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        // Single attempt on purpose: a timed-out submit may have filled.
        let response = request
            .send()
            .map_err(|err| TradeError::GatewayRejected(format!("order submit failed: {err}")))?;
        let status = response.status();
        let value = response.json::<serde_json::Value>().map_err(|err| {
            TradeError::GatewayRejected(format!("failed to parse order response: {err}"))
        })?;
        if !status.is_success() {
            return Err(TradeError::GatewayRejected(format!(
                "order rejected with status {}: {}",
                status.as_u16(),
                value
            )));
        }
        Ok(value)
    }

    fn venue_rules(&self, symbol: &str) -> Result<VenueRules, TradeError> {
        let url = format!("{}/api/v1/exchangeInfo?symbol={}", self.base_url, symbol);
        let value = self
            .with_retry("venue_rules", || self.get_json(&url))
            .map_err(TradeError::GatewayRejected)?;
        parse_venue_rules(&value).map_err(TradeError::GatewayRejected)
    }
}

fn lenient_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn parse_klines(symbol: &str, value: &serde_json::Value) -> Result<Vec<Bar>, String> {
    let rows = value
        .as_array()
        .ok_or_else(|| "klines response is not an array".to_string())?;

    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = row
            .as_array()
            .ok_or_else(|| "kline row is not an array".to_string())?;
        if fields.len() < 6 {
            return Err(format!("kline row has {} fields, expected 6", fields.len()));
        }
        let open_time_ms = fields[0]
            .as_i64()
            .or_else(|| lenient_f64(&fields[0]).map(|v| v as i64))
            .ok_or_else(|| "kline open time is not numeric".to_string())?;
        let parse = |index: usize, name: &str| -> Result<f64, String> {
            lenient_f64(&fields[index]).ok_or_else(|| format!("kline {name} is not numeric"))
        };
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp: open_time_ms / 1000,
            open: parse(1, "open")?,
            high: parse(2, "high")?,
            low: parse(3, "low")?,
            close: parse(4, "close")?,
            volume: parse(5, "volume")?,
        });
    }
    Ok(bars)
}

fn parse_position(symbol: &str, value: &serde_json::Value) -> Result<Position, String> {
    let amount = value
        .get("positionAmt")
        .and_then(lenient_f64)
        .ok_or_else(|| "position response lacks positionAmt".to_string())?;
    let entry_price = value
        .get("entryPrice")
        .and_then(lenient_f64)
        .unwrap_or(0.0);

    let side = if amount > 0.0 {
        PositionSide::Long
    } else if amount < 0.0 {
        PositionSide::Short
    } else {
        PositionSide::Flat
    };

    Ok(Position {
        symbol: symbol.to_string(),
        side,
        quantity: amount.abs(),
        entry_price,
    })
}

fn parse_venue_rules(value: &serde_json::Value) -> Result<VenueRules, String> {
    let lot_step = value
        .get("stepSize")
        .and_then(lenient_f64)
        .ok_or_else(|| "exchangeInfo response lacks stepSize".to_string())?;
    let min_notional = value
        .get("minNotional")
        .and_then(lenient_f64)
        .unwrap_or(0.0);
    Ok(VenueRules {
        lot_step,
        min_notional,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        parse_klines, parse_position, parse_venue_rules, HttpExchangeGateway, RequestFailure,
        RetryPolicy,
    };
    use signet_domain::value_objects::position::PositionSide;
    use std::cell::Cell;
    use std::sync::atomic::Ordering;

    fn gateway(retry: RetryPolicy) -> HttpExchangeGateway {
        HttpExchangeGateway::new("http://127.0.0.1:9".to_string(), None, 100, retry)
            .expect("gateway")
    }

    #[test]
    fn klines_parse_mixed_string_and_number_fields() {
        let value = serde_json::json!([
            [1700000000000i64, "25000.1", "25100.0", "24900.0", "25050.5", "12.5"],
            [1700000300000i64, 25050.5, 25200.0, 25000.0, 25150.0, 8.0],
        ]);
        let bars = parse_klines("BTCUSDT", &value).expect("parse");
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, 1_700_000_000);
        assert!((bars[0].close - 25050.5).abs() < 1e-9);
        assert!((bars[1].volume - 8.0).abs() < 1e-9);
    }

    #[test]
    fn short_kline_rows_are_an_error() {
        let value = serde_json::json!([[1700000000000i64, "1", "2"]]);
        assert!(parse_klines("BTCUSDT", &value).is_err());
    }

    #[test]
    fn position_sign_determines_side() {
        let long = serde_json::json!({"positionAmt": "0.4", "entryPrice": "26000"});
        let short = serde_json::json!({"positionAmt": "-0.4", "entryPrice": 26000.0});
        let flat = serde_json::json!({"positionAmt": "0", "entryPrice": "0"});

        let parsed = parse_position("BTCUSDT", &long).expect("long");
        assert_eq!(parsed.side, PositionSide::Long);
        assert!((parsed.quantity - 0.4).abs() < 1e-12);

        let parsed = parse_position("BTCUSDT", &short).expect("short");
        assert_eq!(parsed.side, PositionSide::Short);
        assert!((parsed.quantity - 0.4).abs() < 1e-12);

        let parsed = parse_position("BTCUSDT", &flat).expect("flat");
        assert_eq!(parsed.side, PositionSide::Flat);
    }

    #[test]
    fn venue_rules_parse_step_and_min_notional() {
        let value = serde_json::json!({"stepSize": "0.001", "minNotional": "10"});
        let rules = parse_venue_rules(&value).expect("rules");
        assert!((rules.lot_step - 0.001).abs() < 1e-12);
        assert!((rules.min_notional - 10.0).abs() < 1e-12);
    }

    #[test]
    fn retry_gives_up_after_max_attempts() {
        let gateway = gateway(RetryPolicy {
            max_attempts: 3,
            backoff_ms: 1,
            max_backoff_ms: 2,
        });
        let attempts = Cell::new(0u32);
        let result: Result<(), String> = gateway.with_retry("test_op", || {
            attempts.set(attempts.get() + 1);
            Err(RequestFailure {
                message: "boom".to_string(),
                retryable: true,
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn non_retryable_failures_stop_immediately() {
        let gateway = gateway(RetryPolicy {
            max_attempts: 5,
            backoff_ms: 1,
            max_backoff_ms: 2,
        });
        let attempts = Cell::new(0u32);
        let result: Result<(), String> = gateway.with_retry("test_op", || {
            attempts.set(attempts.get() + 1);
            Err(RequestFailure {
                message: "http status 404".to_string(),
                retryable: false,
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn cancellation_abandons_remaining_attempts() {
        let gateway = gateway(RetryPolicy {
            max_attempts: 10,
            backoff_ms: 1,
            max_backoff_ms: 2,
        });
        gateway.cancel_flag().store(true, Ordering::Relaxed);
        let attempts = Cell::new(0u32);
        let result: Result<(), String> = gateway.with_retry("test_op", || {
            attempts.set(attempts.get() + 1);
            Err(RequestFailure {
                message: "boom".to_string(),
                retryable: true,
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }
}
