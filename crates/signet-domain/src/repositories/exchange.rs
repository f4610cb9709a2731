use crate::entities::venue::VenueRules;
use crate::errors::TradeError;
use crate::value_objects::bar::Bar;
use crate::value_objects::position::Position;
use crate::value_objects::side::Side;

/// Live exchange port. Adapters own transport retry (bounded attempts with
/// backoff); a returned error is final for the cycle.
pub trait ExchangeGateway: Send + Sync {
    fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, TradeError>;

    fn fetch_position(&self, symbol: &str) -> Result<Position, TradeError>;

    fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        reduce_only: bool,
    ) -> Result<serde_json::Value, TradeError>;

    /// Lot step and minimum notional for the symbol. Quantity rounding is
    /// `VenueRules::round_quantity` over the returned rules.
    fn venue_rules(&self, symbol: &str) -> Result<VenueRules, TradeError>;
}
