//! Turns whatever a model exposes into one positive-class probability.
//!
//! Preference order: a probability matrix if the model has one, then the
//! logistic transform of its margin. A model with neither, a failing call,
//! or an out-of-range result all yield `Unavailable` rather than a guess.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use super::predictor::{LoadedModel, PredictionRequest};

/// Where an available probability came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbabilitySource {
    /// Read from this column of the probability matrix.
    ProbabilityColumn { column: usize },
    /// Logistic transform of the decision margin.
    LogisticMargin { margin: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// No model is loaded for this condition.
    NoModel,
    /// The model exposes neither probabilities nor a margin.
    NoProbabilityCapability,
    PredictorFailed(String),
    PredictorPanicked,
    UnexpectedShape(String),
    OutOfRange(f64),
    /// The intake could not be encoded into the model's features.
    FeatureUnavailable(String),
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoModel => f.write_str("no model loaded"),
            Self::NoProbabilityCapability => f.write_str("model exposes no probability or margin"),
            Self::PredictorFailed(e) => write!(f, "predictor failed: {e}"),
            Self::PredictorPanicked => f.write_str("predictor panicked"),
            Self::UnexpectedShape(s) => write!(f, "unexpected output shape: {s}"),
            Self::OutOfRange(v) => write!(f, "probability {v} outside [0, 1]"),
            Self::FeatureUnavailable(e) => write!(f, "features unavailable: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbabilityOutcome {
    Available {
        value: f64,
        source: ProbabilitySource,
    },
    Unavailable {
        reason: UnavailableReason,
    },
}

impl ProbabilityOutcome {
    fn unavailable(reason: UnavailableReason) -> Self {
        Self::Unavailable { reason }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Available { value, .. } => Some(*value),
            Self::Unavailable { .. } => None,
        }
    }

    /// Probability as a percentage rounded to two decimals.
    pub fn risk_percent(&self) -> Option<f64> {
        self.value().map(|p| (p * 100.0 * 100.0).round() / 100.0)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Positive-class probability for a single request, or `NoModel` when absent.
pub fn positive_probability_for(
    model: Option<&LoadedModel>,
    request: &PredictionRequest,
) -> ProbabilityOutcome {
    match model {
        Some(model) => positive_probability(model, request),
        None => ProbabilityOutcome::unavailable(UnavailableReason::NoModel),
    }
}

/// Positive-class probability for a single request.
///
/// Never panics: a panicking estimator is reported as unavailable.
pub fn positive_probability(model: &LoadedModel, request: &PredictionRequest) -> ProbabilityOutcome {
    let outcome = catch_unwind(AssertUnwindSafe(|| normalize(model, request)))
        .unwrap_or_else(|_| ProbabilityOutcome::unavailable(UnavailableReason::PredictorPanicked));

    match &outcome {
        ProbabilityOutcome::Available { value, source } => {
            tracing::debug!(model = %model.info().name, value, ?source, "Probability normalized");
        }
        ProbabilityOutcome::Unavailable { reason } => {
            tracing::warn!(model = %model.info().name, %reason, "Probability unavailable");
        }
    }
    outcome
}

fn normalize(model: &LoadedModel, request: &PredictionRequest) -> ProbabilityOutcome {
    let x = request.matrix();

    if let Some(proba) = model.probability() {
        // A failing probability call is final; the margin is not consulted.
        let matrix = match proba.predict_proba(x) {
            Ok(m) => m,
            Err(e) => {
                return ProbabilityOutcome::unavailable(UnavailableReason::PredictorFailed(
                    e.to_string(),
                ))
            }
        };
        let column = match matrix.ncols() {
            0 => {
                return ProbabilityOutcome::unavailable(UnavailableReason::UnexpectedShape(
                    format!("{:?}", matrix.shape()),
                ))
            }
            1 => 0,
            _ => 1,
        };
        let Some(value) = matrix.get((0, column)).copied() else {
            return ProbabilityOutcome::unavailable(UnavailableReason::UnexpectedShape(format!(
                "{:?}",
                matrix.shape()
            )));
        };
        return checked(value, ProbabilitySource::ProbabilityColumn { column });
    }

    if let Some(margin_fn) = model.margin() {
        let margins = match margin_fn.decision_function(x) {
            Ok(m) => m,
            Err(e) => {
                return ProbabilityOutcome::unavailable(UnavailableReason::PredictorFailed(
                    e.to_string(),
                ))
            }
        };
        let Some(margin) = margins.first().copied() else {
            return ProbabilityOutcome::unavailable(UnavailableReason::UnexpectedShape(
                "empty margin vector".into(),
            ));
        };
        return checked(sigmoid(margin), ProbabilitySource::LogisticMargin { margin });
    }

    ProbabilityOutcome::unavailable(UnavailableReason::NoProbabilityCapability)
}

fn checked(value: f64, source: ProbabilitySource) -> ProbabilityOutcome {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        ProbabilityOutcome::Available { value, source }
    } else {
        ProbabilityOutcome::unavailable(UnavailableReason::OutOfRange(value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ndarray::{Array1, Array2, ArrayView2};

    use super::*;
    use crate::inference::predictor::test_support::{info, label_only, ConstantLabel};
    use crate::inference::predictor::{
        MarginPredictor, ModelCapabilities, PredictError, Predictor, ProbabilityPredictor,
    };

    /// Returns a fixed probability row.
    struct FixedProba(Vec<f64>);

    impl Predictor for FixedProba {
        fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<i64>, PredictError> {
            Ok(Array1::zeros(x.nrows()))
        }
    }

    impl ProbabilityPredictor for FixedProba {
        fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, PredictError> {
            let row = self.0.clone();
            Ok(Array2::from_shape_fn((x.nrows(), row.len()), |(_, j)| row[j]))
        }
    }

    /// Returns a fixed margin.
    struct FixedMargin(f64);

    impl Predictor for FixedMargin {
        fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<i64>, PredictError> {
            Ok(Array1::zeros(x.nrows()))
        }
    }

    impl MarginPredictor for FixedMargin {
        fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, PredictError> {
            Ok(Array1::from_elem(x.nrows(), self.0))
        }
    }

    /// Probability call always fails; margin would succeed.
    struct BrokenProba;

    impl Predictor for BrokenProba {
        fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<i64>, PredictError> {
            Ok(Array1::zeros(x.nrows()))
        }
    }

    impl ProbabilityPredictor for BrokenProba {
        fn predict_proba(&self, _x: ArrayView2<'_, f64>) -> Result<Array2<f64>, PredictError> {
            Err(PredictError::Degenerate("calibration missing".into()))
        }
    }

    impl MarginPredictor for BrokenProba {
        fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, PredictError> {
            Ok(Array1::from_elem(x.nrows(), 3.0))
        }
    }

    struct Panicky;

    impl Predictor for Panicky {
        fn predict(&self, _x: ArrayView2<'_, f64>) -> Result<Array1<i64>, PredictError> {
            panic!("estimator bug")
        }
    }

    impl ProbabilityPredictor for Panicky {
        fn predict_proba(&self, _x: ArrayView2<'_, f64>) -> Result<Array2<f64>, PredictError> {
            panic!("estimator bug")
        }
    }

    fn proba_model(row: Vec<f64>) -> LoadedModel {
        LoadedModel::new(
            ModelCapabilities {
                predictor: Arc::new(ConstantLabel(0)),
                probability: Some(Arc::new(FixedProba(row))),
                margin: None,
            },
            info("FixedProba"),
        )
    }

    fn margin_model(margin: f64) -> LoadedModel {
        let m = Arc::new(FixedMargin(margin));
        LoadedModel::new(
            ModelCapabilities {
                predictor: m.clone(),
                probability: None,
                margin: Some(m),
            },
            info("FixedMargin"),
        )
    }

    fn request() -> PredictionRequest {
        PredictionRequest::new(vec![1.0, 2.0])
    }

    #[test]
    fn two_columns_reads_positive_class() {
        let outcome = positive_probability(&proba_model(vec![0.277, 0.723]), &request());
        assert_eq!(
            outcome,
            ProbabilityOutcome::Available {
                value: 0.723,
                source: ProbabilitySource::ProbabilityColumn { column: 1 },
            }
        );
        assert_eq!(outcome.risk_percent(), Some(72.3));
    }

    #[test]
    fn three_columns_still_reads_column_one() {
        let outcome = positive_probability(&proba_model(vec![0.2, 0.5, 0.3]), &request());
        assert_eq!(outcome.value(), Some(0.5));
    }

    #[test]
    fn single_column_reads_column_zero() {
        let outcome = positive_probability(&proba_model(vec![0.64]), &request());
        assert_eq!(
            outcome,
            ProbabilityOutcome::Available {
                value: 0.64,
                source: ProbabilitySource::ProbabilityColumn { column: 0 },
            }
        );
    }

    #[test]
    fn zero_margin_is_one_half() {
        let outcome = positive_probability(&margin_model(0.0), &request());
        assert_eq!(outcome.value(), Some(0.5));
        assert_eq!(outcome.risk_percent(), Some(50.0));
    }

    #[test]
    fn margin_goes_through_sigmoid() {
        let outcome = positive_probability(&margin_model(2.0), &request());
        let expected = 1.0 / (1.0 + (-2.0f64).exp());
        assert!((outcome.value().unwrap() - expected).abs() < 1e-12);
        assert!(matches!(
            outcome,
            ProbabilityOutcome::Available {
                source: ProbabilitySource::LogisticMargin { .. },
                ..
            }
        ));
    }

    #[test]
    fn label_only_model_unavailable() {
        let outcome = positive_probability(&label_only(1), &request());
        assert_eq!(
            outcome,
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::NoProbabilityCapability
            }
        );
        assert_eq!(outcome.risk_percent(), None);
    }

    #[test]
    fn failing_proba_does_not_fall_back_to_margin() {
        let m = Arc::new(BrokenProba);
        let model = LoadedModel::new(
            ModelCapabilities {
                predictor: m.clone(),
                probability: Some(m.clone()),
                margin: Some(m),
            },
            info("BrokenProba"),
        );
        let outcome = positive_probability(&model, &request());
        assert!(matches!(
            outcome,
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::PredictorFailed(_)
            }
        ));
    }

    #[test]
    fn panic_is_contained() {
        let m = Arc::new(Panicky);
        let model = LoadedModel::new(
            ModelCapabilities {
                predictor: m.clone(),
                probability: Some(m),
                margin: None,
            },
            info("Panicky"),
        );
        let outcome = positive_probability(&model, &request());
        assert_eq!(
            outcome,
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::PredictorPanicked
            }
        );
    }

    #[test]
    fn out_of_range_probability_rejected() {
        let outcome = positive_probability(&proba_model(vec![-0.2, 1.2]), &request());
        assert!(matches!(
            outcome,
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::OutOfRange(_)
            }
        ));
    }

    #[test]
    fn nan_probability_rejected() {
        let outcome = positive_probability(&proba_model(vec![0.5, f64::NAN]), &request());
        assert!(!outcome.is_available());
    }

    #[test]
    fn empty_probability_matrix_rejected() {
        let outcome = positive_probability(&proba_model(vec![]), &request());
        assert!(matches!(
            outcome,
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::UnexpectedShape(_)
            }
        ));
    }

    #[test]
    fn missing_model_is_no_model() {
        let outcome = positive_probability_for(None, &request());
        assert_eq!(
            outcome,
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::NoModel
            }
        );
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!((sigmoid(3.0) + sigmoid(-3.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn risk_percent_rounds_to_two_decimals() {
        let outcome = ProbabilityOutcome::Available {
            value: 0.123456,
            source: ProbabilitySource::ProbabilityColumn { column: 1 },
        };
        assert_eq!(outcome.risk_percent(), Some(12.35));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(ProbabilityOutcome::Unavailable {
            reason: UnavailableReason::NoModel,
        })
        .unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["reason"]["reason"], "no_model");
    }
}
