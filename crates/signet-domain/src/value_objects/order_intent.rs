use crate::value_objects::side::Side;
use serde::{Deserialize, Serialize};

/// One market order the reconciler wants submitted. A reduce-only intent
/// may only shrink an existing position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub reduce_only: bool,
}
