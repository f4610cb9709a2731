use crate::entities::metrics::{summarize, BacktestSummary, DEFAULT_ANNUALIZATION_DAYS};
use crate::errors::TradeError;
use crate::repositories::predictor::{CorrectionModel, ModelBundle};
use crate::services::policy::SignalPolicy;
use crate::value_objects::bar::Bar;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::feature_vector::FeatureVector;
use crate::value_objects::side::Side;
use crate::value_objects::signal::SignalKind;
use crate::value_objects::trade::Trade;

#[derive(Debug, Clone, Copy)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fraction of current cash committed on a BUY bar.
    pub buy_fraction: f64,
    /// Fraction of held shares liquidated on a SELL bar.
    pub sell_fraction: f64,
    /// Fraction of notional charged to the buyer on buys, seller on sells.
    pub transaction_cost_rate: f64,
    pub slippage_rate: f64,
    pub annualization_days: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            buy_fraction: 0.2,
            sell_fraction: 0.5,
            transaction_cost_rate: 0.0003,
            slippage_rate: 0.0001,
            annualization_days: DEFAULT_ANNUALIZATION_DAYS,
        }
    }
}

#[derive(Debug)]
pub struct BacktestResults {
    pub summary: BacktestSummary,
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
}

/// Bar-by-bar replay of the signal policy against a virtual single-symbol
/// ledger. Strictly sequential, no lookahead; one run owns its state and is
/// exactly reproducible from the same inputs.
///
/// A bar whose required features are missing is forced to HOLD (and
/// counted) so the run always produces a complete equity curve. The live
/// engine treats the same condition as an ERROR; the divergence is
/// deliberate.
pub struct BacktestSimulator<'a> {
    policy: SignalPolicy,
    bundle: &'a ModelBundle,
    correction: Option<&'a dyn CorrectionModel>,
    config: BacktestConfig,
    cash: f64,
    shares_held: f64,
    average_cost_basis: f64,
    trades: Vec<Trade>,
    equity: Vec<EquityPoint>,
    holds_forced: usize,
}

impl<'a> BacktestSimulator<'a> {
    pub fn new(
        policy: SignalPolicy,
        bundle: &'a ModelBundle,
        correction: Option<&'a dyn CorrectionModel>,
        config: BacktestConfig,
    ) -> Self {
        Self {
            policy,
            bundle,
            correction,
            config,
            cash: config.initial_capital,
            shares_held: 0.0,
            average_cost_basis: 0.0,
            trades: Vec::new(),
            equity: Vec::new(),
            holds_forced: 0,
        }
    }

    /// Replay the series. `features` must align one-to-one with `bars`.
    pub fn run(
        mut self,
        bars: &[Bar],
        features: &[FeatureVector],
    ) -> Result<BacktestResults, TradeError> {
        if bars.len() != features.len() {
            return Err(TradeError::DataUnavailable(format!(
                "feature series length {} does not match bar series length {}",
                features.len(),
                bars.len()
            )));
        }

        for (bar, vector) in bars.iter().zip(features.iter()) {
            let kind = self.decide(vector);
            match kind {
                SignalKind::Buy => self.execute_buy(bar),
                SignalKind::Sell => self.execute_sell(bar),
                SignalKind::Hold | SignalKind::Error => {}
            }
            self.record_equity(bar);
        }

        let mut summary = summarize(
            self.config.initial_capital,
            &self.equity,
            &self.trades,
            self.config.annualization_days,
        );
        summary.holds_forced = self.holds_forced;

        Ok(BacktestResults {
            summary,
            trades: self.trades,
            equity: self.equity,
        })
    }

    fn decide(&mut self, vector: &FeatureVector) -> SignalKind {
        if !vector.missing(&self.bundle.feature_names).is_empty() {
            self.holds_forced += 1;
            return SignalKind::Hold;
        }
        let base = match self.bundle.predictor.predict(vector) {
            Ok(base) => base,
            Err(_) => {
                self.holds_forced += 1;
                return SignalKind::Hold;
            }
        };
        let signal = self.policy.decide(base, self.correction);
        if signal.kind == SignalKind::Error {
            self.holds_forced += 1;
            return SignalKind::Hold;
        }
        signal.kind
    }

    fn execute_buy(&mut self, bar: &Bar) {
        let price = bar.close;
        if price <= 0.0 || self.cash <= 0.0 {
            return;
        }

        let cost_multiplier = 1.0 + self.config.transaction_cost_rate + self.config.slippage_rate;
        let budget = self.cash * self.config.buy_fraction;
        let shares = (budget / (price * cost_multiplier)).floor();
        if shares < 1.0 {
            return;
        }

        let total_cost = shares * price * cost_multiplier;
        if total_cost > self.cash {
            return;
        }

        let previous_value = self.average_cost_basis * self.shares_held;
        self.cash -= total_cost;
        self.shares_held += shares;
        self.average_cost_basis = (previous_value + total_cost) / self.shares_held;

        self.trades.push(Trade {
            timestamp: bar.timestamp,
            side: Side::Buy,
            price,
            shares,
            cost_or_revenue: total_cost,
            realized_pnl: None,
        });
    }

    fn execute_sell(&mut self, bar: &Bar) {
        let price = bar.close;
        if price <= 0.0 || self.shares_held < 1.0 {
            return;
        }

        let shares = (self.shares_held * self.config.sell_fraction).floor();
        if shares < 1.0 {
            return;
        }

        let revenue = shares * price;
        let total_revenue =
            revenue * (1.0 - self.config.transaction_cost_rate - self.config.slippage_rate);
        let realized_pnl = total_revenue - self.average_cost_basis * shares;

        self.cash += total_revenue;
        self.shares_held -= shares;
        if self.shares_held < 1.0 {
            self.shares_held = 0.0;
            self.average_cost_basis = 0.0;
        }

        self.trades.push(Trade {
            timestamp: bar.timestamp,
            side: Side::Sell,
            price,
            shares,
            cost_or_revenue: total_revenue,
            realized_pnl: Some(realized_pnl),
        });
    }

    fn record_equity(&mut self, bar: &Bar) {
        let value = self.cash + self.shares_held * bar.close;
        let daily_return = match self.equity.last() {
            Some(prev) if prev.equity != 0.0 => (value - prev.equity) / prev.equity,
            _ => 0.0,
        };
        self.equity.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: value,
            cash: self.cash,
            shares_held: self.shares_held,
            daily_return,
        });
    }
}
