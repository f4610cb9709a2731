use signet_domain::errors::TradeError;
use signet_domain::repositories::predictor::{
    CorrectionModel, ModelBundle, ModelRepository, ReturnPredictor,
};
use signet_domain::value_objects::feature_vector::FeatureVector;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

const ERROR_MODEL_FILE: &str = "error_model.json";

/// Linear estimator over named features. Stands behind the predictor port;
/// training it happens elsewhere.
#[derive(Debug, Clone)]
pub struct LinearPredictor {
    pub intercept: f64,
    pub weights: BTreeMap<String, f64>,
}

impl ReturnPredictor for LinearPredictor {
    fn predict(&self, features: &FeatureVector) -> Result<f64, TradeError> {
        let mut missing = Vec::new();
        let mut total = self.intercept;
        for (name, weight) in &self.weights {
            match features.get(name) {
                Some(value) if value.is_finite() => total += weight * value,
                _ => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(TradeError::FeatureIncomplete { missing });
        }
        Ok(total)
    }
}

#[derive(Debug, Clone)]
struct LinearCorrection {
    intercept: f64,
    slope: f64,
}

impl CorrectionModel for LinearCorrection {
    fn correct(&self, base_prediction: f64) -> Option<f64> {
        let estimated_error = self.intercept + self.slope * base_prediction;
        estimated_error.is_finite().then_some(estimated_error)
    }
}

/// Loads model payloads from `<models_dir>/<TICKER>_model.json` and
/// canonicalizes every accepted shape into one ModelBundle, so nothing
/// downstream ever branches on payload shape again.
#[derive(Debug, Clone)]
pub struct FileModelRepository {
    models_dir: PathBuf,
}

impl FileModelRepository {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    fn model_path(&self, symbol: &str) -> PathBuf {
        self.models_dir
            .join(format!("{}_model.json", safe_ticker(symbol)))
    }
}

impl ModelRepository for FileModelRepository {
    fn load(&self, symbol: &str) -> Result<Option<ModelBundle>, TradeError> {
        let path = self.model_path(symbol);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|err| {
            TradeError::Audit(format!("failed to read model {}: {err}", path.display()))
        })?;
        let payload: serde_json::Value = serde_json::from_str(&contents).map_err(|err| {
            TradeError::Audit(format!("failed to parse model {}: {err}", path.display()))
        })?;
        canonicalize(&payload)
            .map(Some)
            .map_err(|err| TradeError::Audit(format!("invalid model {}: {err}", path.display())))
    }

    fn load_correction(&self) -> Result<Option<Box<dyn CorrectionModel>>, TradeError> {
        let path = self.models_dir.join(ERROR_MODEL_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|err| {
            TradeError::Audit(format!("failed to read error model {}: {err}", path.display()))
        })?;
        let payload: serde_json::Value = serde_json::from_str(&contents).map_err(|err| {
            TradeError::Audit(format!("failed to parse error model {}: {err}", path.display()))
        })?;
        let intercept = payload.get("intercept").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let slope = payload.get("slope").and_then(|v| v.as_f64()).unwrap_or(0.0);
        Ok(Some(Box::new(LinearCorrection { intercept, slope })))
    }
}

/// Historic payloads come in three shapes: a dict with `model` and
/// `features`, a bare estimator object, or a list whose first element is
/// the estimator. All of them normalize here.
pub fn canonicalize(payload: &serde_json::Value) -> Result<ModelBundle, String> {
    if let Some(list) = payload.as_array() {
        let first = list
            .first()
            .ok_or_else(|| "model payload list is empty".to_string())?;
        return canonicalize(first);
    }

    if let Some(object) = payload.as_object() {
        if let Some(inner) = object.get("model") {
            let estimator = parse_estimator(inner)?;
            let feature_names = match object.get("features").and_then(|v| v.as_array()) {
                Some(names) => names
                    .iter()
                    .map(|name| {
                        name.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| "feature name is not a string".to_string())
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                None => estimator.weights.keys().cloned().collect(),
            };
            return Ok(ModelBundle {
                feature_names,
                predictor: Box::new(estimator),
            });
        }

        let estimator = parse_estimator(payload)?;
        let feature_names = estimator.weights.keys().cloned().collect();
        return Ok(ModelBundle {
            feature_names,
            predictor: Box::new(estimator),
        });
    }

    Err("unknown model payload shape".to_string())
}

fn parse_estimator(value: &serde_json::Value) -> Result<LinearPredictor, String> {
    let weights_value = value
        .get("weights")
        .and_then(|v| v.as_object())
        .ok_or_else(|| "estimator lacks a weights object".to_string())?;
    let mut weights = BTreeMap::new();
    for (name, weight) in weights_value {
        let weight = weight
            .as_f64()
            .ok_or_else(|| format!("weight for '{name}' is not numeric"))?;
        weights.insert(name.clone(), weight);
    }
    if weights.is_empty() {
        return Err("estimator has no weights".to_string());
    }
    let intercept = value.get("intercept").and_then(|v| v.as_f64()).unwrap_or(0.0);
    Ok(LinearPredictor { intercept, weights })
}

/// "BTC/USDT" -> "BTC_USDT"; "600519.SH" -> "600519"; plain codes pass
/// through uppercased.
fn safe_ticker(symbol: &str) -> String {
    if symbol.contains('.') {
        return symbol
            .to_uppercase()
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();
    }
    symbol.replace('/', "_").to_uppercase()
}
