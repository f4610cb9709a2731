use serde::{Deserialize, Serialize};

/// Rules owned by the venue for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VenueRules {
    /// Smallest quantity increment the venue accepts.
    pub lot_step: f64,
    /// Smallest order notional (price * quantity) the venue accepts.
    pub min_notional: f64,
}

impl VenueRules {
    /// Round a quantity down to the venue's lot step. A non-positive step
    /// leaves the quantity untouched.
    pub fn round_quantity(&self, quantity: f64) -> f64 {
        if self.lot_step <= 0.0 || !quantity.is_finite() {
            return quantity;
        }
        (quantity / self.lot_step).floor() * self.lot_step
    }
}

/// Everything the reconciler needs to size an order: venue rules plus the
/// deployment's own caps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VenueConstraints {
    pub lot_step: f64,
    pub min_notional: f64,
    pub max_position_size: f64,
    pub max_notional: f64,
}

impl VenueConstraints {
    pub fn new(rules: VenueRules, max_position_size: f64, max_notional: f64) -> Self {
        Self {
            lot_step: rules.lot_step,
            min_notional: rules.min_notional,
            max_position_size,
            max_notional,
        }
    }

    pub fn rules(&self) -> VenueRules {
        VenueRules {
            lot_step: self.lot_step,
            min_notional: self.min_notional,
        }
    }
}
