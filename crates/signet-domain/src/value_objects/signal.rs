use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
    Error,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Buy => "BUY",
            SignalKind::Sell => "SELL",
            SignalKind::Hold => "HOLD",
            SignalKind::Error => "ERROR",
        }
    }
}

/// A trading decision plus the prediction that produced it. `Error` means
/// the decision could not be made at all; callers must not treat it as a
/// quiet Hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    /// Final prediction that drove the decision (after correction, if any).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<f64>,
    /// Uncorrected prediction, retained when a correction model was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_prediction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Signal {
    pub fn hold() -> Self {
        Self {
            kind: SignalKind::Hold,
            prediction: None,
            base_prediction: None,
            comment: None,
        }
    }

    pub fn error(comment: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::Error,
            prediction: None,
            base_prediction: None,
            comment: Some(comment.into()),
        }
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self.kind, SignalKind::Buy | SignalKind::Sell)
    }
}
