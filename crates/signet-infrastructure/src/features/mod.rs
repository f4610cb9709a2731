mod rolling;

use rolling::{RollingMean, RollingRsi, RollingStd};
use signet_domain::errors::TradeError;
use signet_domain::repositories::features::{FeatureSeries, FeatureVectorProducer};
use signet_domain::value_objects::bar::Bar;
use signet_domain::value_objects::feature_vector::FeatureVector;
use std::collections::BTreeMap;

/// Immutable reference data handed to the producer at construction time.
/// There is no hidden module-level state: whoever builds the producer owns
/// what it can see.
#[derive(Debug, Clone)]
pub struct FeatureContext {
    pub sma_windows: Vec<usize>,
    pub volatility_windows: Vec<usize>,
    pub rsi_period: Option<usize>,
    /// Per-deployment reference factors appended to every vector
    /// (macro flags, sector loadings, ...).
    pub static_factors: BTreeMap<String, f64>,
}

impl Default for FeatureContext {
    fn default() -> Self {
        Self {
            sma_windows: vec![10, 50],
            volatility_windows: vec![20],
            rsi_period: Some(14),
            static_factors: BTreeMap::new(),
        }
    }
}

/// Rolling-indicator features over a bar series. Early rows legitimately
/// miss windowed values until each window fills; callers check for that
/// instead of assuming a dense result.
pub struct IndicatorFeatureProducer {
    context: FeatureContext,
}

impl IndicatorFeatureProducer {
    pub fn new(context: FeatureContext) -> Self {
        Self { context }
    }

    fn feature_names(&self) -> Vec<String> {
        let mut names = vec!["close".to_string(), "ret_1".to_string()];
        for window in &self.context.sma_windows {
            names.push(format!("sma_{window}"));
        }
        for window in &self.context.volatility_windows {
            names.push(format!("vol_{window}"));
        }
        if let Some(period) = self.context.rsi_period {
            names.push(format!("rsi_{period}"));
        }
        names.extend(self.context.static_factors.keys().cloned());
        names
    }
}

impl FeatureVectorProducer for IndicatorFeatureProducer {
    fn generate(&self, bars: &[Bar]) -> Result<FeatureSeries, TradeError> {
        if bars.is_empty() {
            return Err(TradeError::DataUnavailable(
                "cannot build features over an empty series".to_string(),
            ));
        }

        let mut smas: Vec<(usize, RollingMean)> = self
            .context
            .sma_windows
            .iter()
            .map(|&window| (window, RollingMean::new(window)))
            .collect();
        let mut vols: Vec<(usize, RollingStd)> = self
            .context
            .volatility_windows
            .iter()
            .map(|&window| (window, RollingStd::new(window)))
            .collect();
        let mut rsi = self
            .context
            .rsi_period
            .map(|period| (period, RollingRsi::new(period)));

        let mut vectors = Vec::with_capacity(bars.len());
        let mut prev_close: Option<f64> = None;

        for bar in bars {
            let mut vector = FeatureVector::new(bar.timestamp);
            vector.insert("close", bar.close);

            let ret = prev_close
                .filter(|prev| *prev > 0.0)
                .map(|prev| bar.close / prev - 1.0);
            if let Some(ret) = ret {
                vector.insert("ret_1", ret);
            }
            prev_close = Some(bar.close);

            for (window, sma) in smas.iter_mut() {
                if let Some(value) = sma.update(bar.close) {
                    vector.insert(format!("sma_{window}"), value);
                }
            }
            for (window, vol) in vols.iter_mut() {
                if let Some(ret) = ret {
                    if let Some(value) = vol.update(ret) {
                        vector.insert(format!("vol_{window}"), value);
                    }
                }
            }
            if let Some((period, rsi)) = rsi.as_mut() {
                if let Some(value) = rsi.update(bar.close) {
                    vector.insert(format!("rsi_{period}"), value);
                }
            }

            for (name, value) in &self.context.static_factors {
                vector.insert(name.clone(), *value);
            }

            vectors.push(vector);
        }

        Ok(FeatureSeries {
            vectors,
            feature_names: self.feature_names(),
        })
    }
}
