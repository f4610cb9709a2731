use crate::errors::TradeError;
use crate::value_objects::bar::Bar;
use crate::value_objects::feature_vector::FeatureVector;

/// Feature vectors aligned one-to-one with the input bars, plus the names
/// the producer emitted. Rolling computations may legitimately leave leading
/// or trailing rows with missing values; callers must check, not assume a
/// dense result.
pub struct FeatureSeries {
    pub vectors: Vec<FeatureVector>,
    pub feature_names: Vec<String>,
}

pub trait FeatureVectorProducer: Send + Sync {
    fn generate(&self, bars: &[Bar]) -> Result<FeatureSeries, TradeError>;
}
