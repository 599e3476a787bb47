//! Estimators that can be stored in a model artifact.
//!
//! Each type implements only the prediction traits it genuinely supports;
//! the loader discovers capabilities from those impls, never by probing.

use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::normalize::sigmoid;
use super::predictor::{
    MarginPredictor, ModelCapabilities, PredictError, Predictor, ProbabilityPredictor,
};

fn check_width(x: &ArrayView2<'_, f64>, expected: usize) -> Result<(), PredictError> {
    if x.ncols() != expected {
        return Err(PredictError::ShapeMismatch {
            expected,
            got: x.ncols(),
        });
    }
    Ok(())
}

/// Binary logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    fn margins(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, PredictError> {
        check_width(&x, self.coefficients.len())?;
        let w = ArrayView1::from(self.coefficients.as_slice());
        Ok(x.dot(&w) + self.intercept)
    }
}

impl Predictor for LogisticRegression {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<i64>, PredictError> {
        Ok(self.margins(x)?.mapv(|m| i64::from(m > 0.0)))
    }
}

impl ProbabilityPredictor for LogisticRegression {
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, PredictError> {
        let positive = self.margins(x)?.mapv(sigmoid);
        let negative = positive.mapv(|p| 1.0 - p);
        ndarray::stack(Axis(1), &[negative.view(), positive.view()])
            .map_err(|e| PredictError::Degenerate(e.to_string()))
    }
}

impl MarginPredictor for LogisticRegression {
    fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, PredictError> {
        self.margins(x)
    }
}

/// Linear support vector machine. Margins only, no calibrated probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvm {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl Predictor for LinearSvm {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<i64>, PredictError> {
        Ok(self.decision_function(x)?.mapv(|m| i64::from(m > 0.0)))
    }
}

impl MarginPredictor for LinearSvm {
    fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, PredictError> {
        check_width(&x, self.weights.len())?;
        let w = ArrayView1::from(self.weights.as_slice());
        Ok(x.dot(&w) + self.bias)
    }
}

/// Ignores features and answers with the training class distribution.
///
/// A single-class prior yields a one-column probability matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorClassifier {
    pub classes: Vec<i64>,
    pub priors: Vec<f64>,
}

impl PriorClassifier {
    fn validate(&self) -> Result<(), PredictError> {
        if self.classes.is_empty() {
            return Err(PredictError::Degenerate("no classes".into()));
        }
        if self.classes.len() != self.priors.len() {
            return Err(PredictError::Degenerate(format!(
                "{} classes but {} priors",
                self.classes.len(),
                self.priors.len()
            )));
        }
        Ok(())
    }
}

impl Predictor for PriorClassifier {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<i64>, PredictError> {
        self.validate()?;
        let mut best = 0;
        for (i, p) in self.priors.iter().enumerate() {
            if *p > self.priors[best] {
                best = i;
            }
        }
        Ok(Array1::from_elem(x.nrows(), self.classes[best]))
    }
}

impl ProbabilityPredictor for PriorClassifier {
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, PredictError> {
        self.validate()?;
        Ok(Array2::from_shape_fn((x.nrows(), self.priors.len()), |(_, j)| {
            self.priors[j]
        }))
    }
}

/// Single-feature cutoff. Labels only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub feature_index: usize,
    pub threshold: f64,
}

impl Predictor for ThresholdRule {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<i64>, PredictError> {
        if self.feature_index >= x.ncols() {
            return Err(PredictError::ShapeMismatch {
                expected: self.feature_index + 1,
                got: x.ncols(),
            });
        }
        Ok(x.column(self.feature_index)
            .mapv(|v| i64::from(v > self.threshold)))
    }
}

/// Preprocessing step saved on its own. Decodes fine, cannot predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Every estimator an artifact may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    LinearSvm(LinearSvm),
    PriorClassifier(PriorClassifier),
    ThresholdRule(ThresholdRule),
    StandardScaler(StandardScaler),
}

impl Estimator {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LogisticRegression(_) => "LogisticRegression",
            Self::LinearSvm(_) => "LinearSvm",
            Self::PriorClassifier(_) => "PriorClassifier",
            Self::ThresholdRule(_) => "ThresholdRule",
            Self::StandardScaler(_) => "StandardScaler",
        }
    }

    /// Wire up the traits this estimator implements. `None` when it cannot predict.
    pub fn into_capabilities(self) -> Option<ModelCapabilities> {
        match self {
            Self::LogisticRegression(m) => {
                let m = Arc::new(m);
                Some(ModelCapabilities {
                    predictor: m.clone(),
                    probability: Some(m.clone()),
                    margin: Some(m),
                })
            }
            Self::LinearSvm(m) => {
                let m = Arc::new(m);
                Some(ModelCapabilities {
                    predictor: m.clone(),
                    probability: None,
                    margin: Some(m),
                })
            }
            Self::PriorClassifier(m) => {
                let m = Arc::new(m);
                Some(ModelCapabilities {
                    predictor: m.clone(),
                    probability: Some(m),
                    margin: None,
                })
            }
            Self::ThresholdRule(m) => Some(ModelCapabilities {
                predictor: Arc::new(m),
                probability: None,
                margin: None,
            }),
            Self::StandardScaler(_) => None,
        }
    }
}
