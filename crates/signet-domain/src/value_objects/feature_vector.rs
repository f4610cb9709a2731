use std::collections::BTreeMap;

/// Named feature values attached to exactly one bar timestamp. An absent
/// entry and a non-finite value both mean "insufficient data".
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub timestamp: i64,
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Names from `required` that are absent or non-finite here.
    pub fn missing(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.get(name).map(f64::is_finite).unwrap_or(false))
            .cloned()
            .collect()
    }
}
