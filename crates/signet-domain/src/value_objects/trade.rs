use crate::value_objects::side::Side;
use serde::{Deserialize, Serialize};

/// One fill in the backtest ledger. `realized_pnl` is present on sells only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: i64,
    pub side: Side,
    pub price: f64,
    pub shares: f64,
    /// Total cash moved: cost including fees on buys, net revenue on sells.
    pub cost_or_revenue: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<f64>,
}
