use crate::repositories::predictor::CorrectionModel;
use crate::value_objects::signal::{Signal, SignalKind};

/// Maps a predicted return to a discrete signal via fixed thresholds.
/// Thresholds are configuration, not business law; the defaults match the
/// production deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalPolicy {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self {
            buy_threshold: 0.005,
            sell_threshold: -0.005,
        }
    }
}

impl SignalPolicy {
    pub fn new(buy_threshold: f64, sell_threshold: f64) -> Self {
        Self {
            buy_threshold,
            sell_threshold,
        }
    }

    /// Decide from a base prediction, applying the correction model when one
    /// is configured. Both the base and the final prediction are retained on
    /// the signal for audit and logging; only the final one drives the
    /// decision. Strict comparisons: a prediction exactly at a threshold
    /// holds.
    pub fn decide(&self, base_prediction: f64, correction: Option<&dyn CorrectionModel>) -> Signal {
        if !base_prediction.is_finite() {
            return Signal::error(format!("prediction is not finite: {base_prediction}"));
        }

        let adjustment = correction.and_then(|model| model.correct(base_prediction));
        let final_prediction = base_prediction + adjustment.unwrap_or(0.0);
        if !final_prediction.is_finite() {
            return Signal::error(format!(
                "corrected prediction is not finite: base={base_prediction}"
            ));
        }

        let kind = if final_prediction > self.buy_threshold {
            SignalKind::Buy
        } else if final_prediction < self.sell_threshold {
            SignalKind::Sell
        } else {
            SignalKind::Hold
        };

        Signal {
            kind,
            prediction: Some(final_prediction),
            base_prediction: adjustment.map(|_| base_prediction),
            comment: None,
        }
    }

    /// Error signal for a symbol with no trained model. Distinct from Hold:
    /// callers must be able to tell "no opportunity" from "could not
    /// evaluate".
    pub fn model_unavailable(symbol: &str) -> Signal {
        Signal::error(format!("no trained model for {symbol}"))
    }

    /// Error signal for a feature vector with missing required values.
    pub fn feature_incomplete(missing: &[String]) -> Signal {
        Signal::error(format!("missing features: {}", missing.join(", ")))
    }
}
