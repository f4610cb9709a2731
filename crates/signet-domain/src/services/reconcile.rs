use crate::entities::venue::VenueConstraints;
use crate::errors::TradeError;
use crate::value_objects::order_intent::OrderIntent;
use crate::value_objects::position::{Position, PositionSide};
use crate::value_objects::side::Side;
use crate::value_objects::signal::{Signal, SignalKind};

/// Why sizing refused to produce intents. Every rejection is recorded as a
/// `rejected` audit row by the caller, never silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    NotionalExceeded { notional: f64, max_notional: f64 },
    PrecisionError { detail: String },
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NotionalExceeded { .. } => "notional_exceeded",
            RejectReason::PrecisionError { .. } => "precision_error",
        }
    }

    pub fn detail(&self) -> String {
        self.to_error().to_string()
    }

    /// The taxonomy error this rejection surfaces as.
    pub fn to_error(&self) -> TradeError {
        match self {
            RejectReason::NotionalExceeded {
                notional,
                max_notional,
            } => TradeError::NotionalExceeded {
                notional: *notional,
                max_notional: *max_notional,
            },
            RejectReason::PrecisionError { detail } => TradeError::PrecisionError(detail.clone()),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Zero, one or two intents, close-before-open when two.
    pub intents: Vec<OrderIntent>,
    pub rejection: Option<RejectReason>,
    /// Set when the raw quantity was capped to max_position_size.
    pub capped_quantity: Option<f64>,
}

impl ReconcileOutcome {
    fn rejected(reason: RejectReason) -> Self {
        Self {
            intents: Vec::new(),
            rejection: Some(reason),
            capped_quantity: None,
        }
    }
}

/// Turn a signal plus fresh venue position into order intents.
///
/// The checks run in a fixed order: notional cap (reject), raw quantity,
/// position-size cap (cap and continue), lot rounding plus min-notional
/// (reject). A flip always closes the opposite side with a reduce-only
/// intent before opening the new one, so a failure between the two halves
/// is visible per intent instead of losing the position state. A repeated
/// signal on an already-open same-side position adds to it.
pub fn reconcile(
    signal: &Signal,
    position: &Position,
    desired_notional: f64,
    price: f64,
    constraints: &VenueConstraints,
) -> ReconcileOutcome {
    let open_side = match signal.kind {
        SignalKind::Buy => Side::Buy,
        SignalKind::Sell => Side::Sell,
        SignalKind::Hold | SignalKind::Error => return ReconcileOutcome::default(),
    };

    if desired_notional > constraints.max_notional {
        return ReconcileOutcome::rejected(RejectReason::NotionalExceeded {
            notional: desired_notional,
            max_notional: constraints.max_notional,
        });
    }

    if !price.is_finite() || price <= 0.0 {
        return ReconcileOutcome::rejected(RejectReason::PrecisionError {
            detail: format!("price not positive: {price}"),
        });
    }

    let mut raw_quantity = desired_notional / price;
    let mut capped_quantity = None;
    if constraints.max_position_size > 0.0 && raw_quantity > constraints.max_position_size {
        raw_quantity = constraints.max_position_size;
        capped_quantity = Some(raw_quantity);
    }

    let rounded = constraints.rules().round_quantity(raw_quantity);
    if rounded <= 0.0 || !rounded.is_finite() {
        return ReconcileOutcome::rejected(RejectReason::PrecisionError {
            detail: format!("quantity {raw_quantity} rounds to zero at lot step"),
        });
    }
    if rounded * price < constraints.min_notional {
        return ReconcileOutcome::rejected(RejectReason::PrecisionError {
            detail: format!(
                "rounded notional {} below venue minimum {}",
                rounded * price,
                constraints.min_notional
            ),
        });
    }

    let mut intents = Vec::with_capacity(2);

    let opposite = match open_side {
        Side::Buy => PositionSide::Short,
        Side::Sell => PositionSide::Long,
    };
    if position.side == opposite && position.quantity > 0.0 {
        intents.push(OrderIntent {
            symbol: position.symbol.clone(),
            side: open_side,
            quantity: position.quantity.abs(),
            reduce_only: true,
        });
    }

    intents.push(OrderIntent {
        symbol: position.symbol.clone(),
        side: open_side,
        quantity: rounded,
        reduce_only: false,
    });

    ReconcileOutcome {
        intents,
        rejection: None,
        capped_quantity,
    }
}
