//! From an intake record to a finished report.
//!
//! Encodes the record into the feature vector the condition's model expects,
//! asks the model for a label and a probability, and compiles the report.
//! A missing or broken model, or an intake the model cannot take, never
//! fails the assessment; the report is issued with an unknown risk instead.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use thiserror::Error;

use crate::config::AppConfig;
use crate::inference::{
    positive_probability_for, LoadedModel, ModelRegistry, PredictionRequest, ProbabilityOutcome,
    UnavailableReason,
};
use crate::models::enums::Condition;
use crate::models::measurement::{MeasurementValue, RawRecord};
use crate::report::{
    canonicalize, compile, CanonicalRecord, Parameter, PatientIdentity, ReportDocument,
    ReportError, Vocabulary,
};

/// Verdict printed when no label could be obtained.
pub const PREDICTION_UNAVAILABLE: &str = "Prediction unavailable";

const POSITIVE_WORDS: [&str; 5] = ["yes", "poor", "abnormal", "1", "true"];

#[derive(Error, Debug)]
pub enum AssessmentError {
    #[error("{condition} assessment needs '{feature}', which the intake does not provide")]
    MissingFeature { condition: Condition, feature: String },

    #[error("Feature '{feature}' must be numeric, got '{value}'")]
    NotNumeric { feature: String, value: String },

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// How an intake value becomes a model feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureEncoding {
    Numeric,
    /// Yes/Poor/Abnormal/1/true become 1, anything else 0.
    Binary,
    /// Male becomes 1; numbers pass through.
    Gender,
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    /// Canonical parameter the value is filed under, when it has one.
    pub parameter: Option<Parameter>,
    /// Raw keys tried after the canonical name.
    pub raw_keys: &'static [&'static str],
    pub encoding: FeatureEncoding,
}

const fn feature(
    name: &'static str,
    parameter: Option<Parameter>,
    raw_keys: &'static [&'static str],
    encoding: FeatureEncoding,
) -> FeatureSpec {
    FeatureSpec {
        name,
        parameter,
        raw_keys,
        encoding,
    }
}

use FeatureEncoding::{Binary, Gender, Numeric};

const AGE: FeatureSpec = feature("age", None, &["Age", "age"], Numeric);

const HEART: [FeatureSpec; 13] = [
    AGE,
    feature("sex", None, &["Sex", "sex", "Gender", "gender"], Gender),
    feature("cp", Some(Parameter::ChestPainType), &["cp"], Numeric),
    feature("trestbps", Some(Parameter::RestingBloodPressure), &["trestbps"], Numeric),
    feature("chol", Some(Parameter::Cholesterol), &["chol"], Numeric),
    feature("fbs", Some(Parameter::FastingBloodSugar), &["fbs"], Binary),
    feature("restecg", Some(Parameter::RestingEcg), &["restecg"], Numeric),
    feature("thalach", Some(Parameter::MaxHeartRate), &["thalach"], Numeric),
    feature("exang", Some(Parameter::ExerciseInducedAngina), &["exang"], Binary),
    feature("oldpeak", Some(Parameter::StDepression), &["oldpeak"], Numeric),
    feature("slope", Some(Parameter::StSlope), &["slope"], Numeric),
    feature("ca", Some(Parameter::MajorVesselsColored), &["ca"], Numeric),
    feature("thal", Some(Parameter::Thalassemia), &["thal"], Numeric),
];

const DIABETES: [FeatureSpec; 6] = [
    feature("gender", None, &["Gender", "gender", "Sex", "sex"], Gender),
    AGE,
    feature("bmi", Some(Parameter::Bmi), &["bmi"], Numeric),
    feature("glucose", Some(Parameter::BloodGlucose), &["glucose"], Numeric),
    feature("hba1c", Some(Parameter::Hba1c), &["hba1c"], Numeric),
    feature("hypertension", Some(Parameter::Hypertension), &["hypertension"], Binary),
];

const KIDNEY: [FeatureSpec; 24] = [
    AGE,
    feature("bp", Some(Parameter::BloodPressure), &["bp"], Numeric),
    feature("sg", Some(Parameter::SpecificGravity), &["sg"], Numeric),
    feature("al", Some(Parameter::Albumin), &["al"], Numeric),
    feature("su", Some(Parameter::Sugar), &["su"], Numeric),
    feature("rbc", Some(Parameter::RedBloodCells), &["rbc"], Binary),
    feature("pc", Some(Parameter::PusCell), &["pc"], Binary),
    feature("pcc", Some(Parameter::PusCellClumps), &["pcc"], Binary),
    feature("ba", Some(Parameter::Bacteria), &["ba"], Binary),
    feature("bgr", Some(Parameter::BloodGlucoseRandom), &["bgr"], Numeric),
    feature("bu", Some(Parameter::BloodUrea), &["bu"], Numeric),
    feature("sc", Some(Parameter::SerumCreatinine), &["sc"], Numeric),
    feature("sod", Some(Parameter::Sodium), &["sod"], Numeric),
    feature("pot", Some(Parameter::Potassium), &["pot"], Numeric),
    feature("hemo", Some(Parameter::Haemoglobin), &["hemo"], Numeric),
    feature("pcv", Some(Parameter::PackedCellVolume), &["pcv"], Numeric),
    feature("wc", Some(Parameter::WhiteBloodCellCount), &["wc"], Numeric),
    feature("rc", Some(Parameter::RedBloodCellCount), &["rc"], Numeric),
    feature("htn", Some(Parameter::Hypertension), &["htn"], Binary),
    feature("dm", Some(Parameter::DiabetesMellitus), &["dm"], Binary),
    feature("cad", Some(Parameter::CoronaryArteryDisease), &["cad"], Binary),
    feature("appet", Some(Parameter::Appetite), &["appet"], Binary),
    feature("pe", Some(Parameter::PedaEdema), &["pe"], Binary),
    feature("ane", Some(Parameter::Anaemia), &["ane"], Binary),
];

/// Features the condition's model takes, in column order.
pub fn feature_schema(condition: Condition) -> &'static [FeatureSpec] {
    match condition {
        Condition::Heart => &HEART,
        Condition::Diabetes => &DIABETES,
        Condition::Kidney => &KIDNEY,
    }
}

fn lookup<'r>(spec: &FeatureSpec, record: &'r CanonicalRecord) -> Option<&'r MeasurementValue> {
    spec.parameter
        .map(|p| p.display_name())
        .into_iter()
        .chain(spec.raw_keys.iter().copied())
        .filter_map(|key| record.get(key))
        .find(|v| !v.is_blank())
}

fn encode(spec: &FeatureSpec, value: &MeasurementValue) -> Result<f64, AssessmentError> {
    let not_numeric = || AssessmentError::NotNumeric {
        feature: spec.name.to_string(),
        value: value.literal(),
    };
    match spec.encoding {
        Numeric => value.as_number().ok_or_else(not_numeric),
        Binary => {
            let word = value.literal().trim().to_lowercase();
            Ok(if POSITIVE_WORDS.contains(&word.as_str()) { 1.0 } else { 0.0 })
        }
        Gender => match value.as_number() {
            Some(n) => Ok(n),
            None => Ok(if value.literal().trim().eq_ignore_ascii_case("male") {
                1.0
            } else {
                0.0
            }),
        },
    }
}

/// Encode a canonical record into the condition's feature vector.
pub fn build_request(
    condition: Condition,
    record: &CanonicalRecord,
) -> Result<PredictionRequest, AssessmentError> {
    let features = feature_schema(condition)
        .iter()
        .map(|spec| {
            let value = lookup(spec, record).ok_or_else(|| AssessmentError::MissingFeature {
                condition,
                feature: spec.name.to_string(),
            })?;
            encode(spec, value)
        })
        .collect::<Result<Vec<f64>, _>>()?;
    Ok(PredictionRequest::new(features))
}

/// Result of one assessment.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub condition: Condition,
    pub verdict: String,
    /// Hard label from the model, if one was obtained.
    pub label: Option<i64>,
    pub probability: ProbabilityOutcome,
    pub report: ReportDocument,
}

fn predict_label(model: &LoadedModel, request: &PredictionRequest) -> Option<i64> {
    match catch_unwind(AssertUnwindSafe(|| model.predict_label(request))) {
        Ok(Ok(label)) => label,
        Ok(Err(e)) => {
            tracing::warn!(model = %model.info().name, error = %e, "Prediction failed");
            None
        }
        Err(_) => {
            tracing::warn!(model = %model.info().name, "Predictor panicked");
            None
        }
    }
}

fn warn_on_schema_drift(condition: Condition, model: &LoadedModel) {
    let expected: Vec<&str> = feature_schema(condition).iter().map(|s| s.name).collect();
    let declared = &model.info().feature_names;
    if !declared.is_empty() && !declared.iter().map(String::as_str).eq(expected.iter().copied()) {
        tracing::warn!(
            condition = %condition,
            model = %model.info().name,
            declared = ?declared,
            expected = ?expected,
            "Artifact feature names differ from the intake schema"
        );
    }
}

fn predict(
    registry: &ModelRegistry,
    condition: Condition,
    request: &PredictionRequest,
) -> (Option<i64>, ProbabilityOutcome) {
    let model = registry.get(condition);
    let label = match model.as_deref() {
        Some(model) => {
            warn_on_schema_drift(condition, model);
            predict_label(model, request)
        }
        None => {
            tracing::warn!(condition = %condition, "No model available, risk will be unknown");
            None
        }
    };
    (label, positive_probability_for(model.as_deref(), request))
}

/// Run one condition's assessment over a raw intake record.
///
/// An intake that cannot be encoded for the model still yields a report,
/// with the verdict unavailable and the risk unknown. Use `build_request`
/// directly for strict checking.
pub fn assess(
    registry: &ModelRegistry,
    vocabulary: &Vocabulary,
    config: &AppConfig,
    condition: Condition,
    intake: &RawRecord,
) -> Result<Assessment, AssessmentError> {
    let record = canonicalize(vocabulary, intake);

    let (label, probability) = match build_request(condition, &record) {
        Ok(request) => predict(registry, condition, &request),
        Err(e) => {
            tracing::warn!(
                condition = %condition,
                error = %e,
                "Intake cannot be encoded for the model, risk will be unknown"
            );
            let reason = UnavailableReason::FeatureUnavailable(e.to_string());
            (None, ProbabilityOutcome::Unavailable { reason })
        }
    };

    let verdict = match label {
        Some(l) => condition.verdict(l == 1).to_string(),
        None => PREDICTION_UNAVAILABLE.to_string(),
    };

    let identity = PatientIdentity::from_record(&record, &config.report_generator);
    let report = compile(
        vocabulary,
        identity,
        condition.report_label(),
        &record,
        probability.risk_percent(),
        &verdict,
    );

    tracing::info!(
        condition = %condition,
        verdict = %verdict,
        risk = ?probability.risk_percent(),
        "Assessment complete"
    );

    Ok(Assessment {
        condition,
        verdict,
        label,
        probability,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::codec::test_support::{heart_logistic, write_artifact};
    use crate::inference::estimators::{Estimator, ThresholdRule};
    use crate::inference::ArtifactLoader;
    use crate::models::enums::ArtifactFormat;

    const HEART_INTAKE: &str = r#"{
        "Patient Name": "Asha Rao", "Age": 54, "Sex": "Male", "cp": 2,
        "trestbps": 140, "chol": 250, "fbs": "No", "restecg": 1, "thalach": 150,
        "exang": "Yes", "oldpeak": 1.4, "slope": 1, "ca": 0, "thal": 2
    }"#;

    fn intake(json: &str) -> RawRecord {
        RawRecord::from_json_str(json).unwrap()
    }

    fn heart_registry(dir: &std::path::Path, estimator: Estimator) -> ModelRegistry {
        let path = write_artifact(dir, "heart.bin", estimator, ArtifactFormat::Bincode);
        ModelRegistry::new(ArtifactLoader::default(), [(Condition::Heart, path)])
    }

    #[test]
    fn heart_request_encodes_in_schema_order() {
        let vocab = Vocabulary::builtin();
        let record = canonicalize(&vocab, &intake(HEART_INTAKE));
        let request = build_request(Condition::Heart, &record).unwrap();
        assert_eq!(
            request.features(),
            &[54.0, 1.0, 2.0, 140.0, 250.0, 0.0, 1.0, 150.0, 1.0, 1.4, 1.0, 0.0, 2.0]
        );
    }

    #[test]
    fn display_names_satisfy_features() {
        let vocab = Vocabulary::builtin();
        let record = canonicalize(
            &vocab,
            &intake(r#"{"gender": "Female", "age": 40, "BMI": 31.2, "Blood Glucose": 130, "HbA1c": 6.8, "Hypertension": "Yes"}"#),
        );
        let request = build_request(Condition::Diabetes, &record).unwrap();
        assert_eq!(request.features(), &[0.0, 40.0, 31.2, 130.0, 6.8, 1.0]);
    }

    #[test]
    fn kidney_binary_words() {
        let vocab = Vocabulary::builtin();
        let json = r#"{
            "age": 61, "bp": 80, "sg": 1.02, "al": 1, "su": 0, "rbc": "Abnormal",
            "pc": "Normal", "pcc": "No", "ba": "No", "bgr": 121, "bu": 36, "sc": 1.2,
            "sod": 138, "pot": 4.4, "hemo": 15.4, "pcv": 44, "wc": 7800, "rc": 5.2,
            "htn": "Yes", "dm": "yes", "cad": "no", "appet": "Poor", "pe": "No", "ane": "No"
        }"#;
        let record = canonicalize(&vocab, &intake(json));
        let features = build_request(Condition::Kidney, &record).unwrap();
        let f = features.features();
        assert_eq!(f.len(), 24);
        assert_eq!(f[5], 1.0); // rbc abnormal
        assert_eq!(f[6], 0.0); // pc normal
        assert_eq!(f[18], 1.0); // htn
        assert_eq!(f[21], 1.0); // appet poor
        assert_eq!(f[23], 0.0);
    }

    #[test]
    fn missing_feature_is_reported() {
        let vocab = Vocabulary::builtin();
        let record = canonicalize(&vocab, &intake(r#"{"Age": 54, "Sex": "Male"}"#));
        match build_request(Condition::Heart, &record) {
            Err(AssessmentError::MissingFeature { condition, feature }) => {
                assert_eq!(condition, Condition::Heart);
                assert_eq!(feature, "cp");
            }
            other => panic!("expected MissingFeature, got {other:?}"),
        }
    }

    #[test]
    fn blank_feature_counts_as_missing() {
        let vocab = Vocabulary::builtin();
        let json = HEART_INTAKE.replace(r#""chol": 250"#, r#""chol": """#);
        let record = canonicalize(&vocab, &intake(&json));
        assert!(matches!(
            build_request(Condition::Heart, &record),
            Err(AssessmentError::MissingFeature { .. })
        ));
    }

    #[test]
    fn non_numeric_feature_rejected() {
        let vocab = Vocabulary::builtin();
        let json = HEART_INTAKE.replace(r#""chol": 250"#, r#""chol": "pending""#);
        let record = canonicalize(&vocab, &intake(&json));
        assert!(matches!(
            build_request(Condition::Heart, &record),
            Err(AssessmentError::NotNumeric { .. })
        ));
    }

    #[test]
    fn heart_assessment_with_logistic_model() {
        let dir = tempfile::tempdir().unwrap();
        let registry = heart_registry(dir.path(), heart_logistic());
        let result = assess(
            &registry,
            &Vocabulary::builtin(),
            &AppConfig::default(),
            Condition::Heart,
            &intake(HEART_INTAKE),
        )
        .unwrap();

        assert_eq!(result.label, Some(1));
        assert_eq!(result.verdict, "High Risk");
        let risk = result.report.risk_percent().unwrap();
        assert!(risk > 50.0 && risk <= 100.0, "risk {risk}");
        assert_eq!(result.report.diagnosis(), "High Risk");
        assert_eq!(result.report.condition_label(), "Heart Disease");
        let chol = result
            .report
            .rows()
            .iter()
            .find(|r| r.name == "Cholesterol")
            .unwrap();
        assert_eq!(chol.flag.status, crate::models::enums::FlagStatus::High);
    }

    #[test]
    fn label_only_model_gives_verdict_without_risk() {
        let dir = tempfile::tempdir().unwrap();
        let rule = Estimator::ThresholdRule(ThresholdRule {
            feature_index: 4,
            threshold: 300.0,
        });
        let registry = heart_registry(dir.path(), rule);
        let result = assess(
            &registry,
            &Vocabulary::builtin(),
            &AppConfig::default(),
            Condition::Heart,
            &intake(HEART_INTAKE),
        )
        .unwrap();

        assert_eq!(result.label, Some(0));
        assert_eq!(result.verdict, "Safe");
        assert_eq!(result.report.risk_percent(), None);
        assert_eq!(
            result.probability,
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::NoProbabilityCapability
            }
        );
    }

    #[test]
    fn missing_model_degrades_to_unknown_risk() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(
            ArtifactLoader::default(),
            [(Condition::Heart, dir.path().join("absent.bin"))],
        );
        let result = assess(
            &registry,
            &Vocabulary::builtin(),
            &AppConfig::default(),
            Condition::Heart,
            &intake(HEART_INTAKE),
        )
        .unwrap();

        assert_eq!(result.label, None);
        assert_eq!(result.verdict, PREDICTION_UNAVAILABLE);
        assert_eq!(result.report.risk_display(), "unknown");
        assert_eq!(
            result.probability,
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::NoModel
            }
        );
        assert!(!result.report.rows().is_empty());
    }

    #[test]
    fn malformed_feature_still_yields_report() {
        let dir = tempfile::tempdir().unwrap();
        let registry = heart_registry(dir.path(), heart_logistic());
        let json = HEART_INTAKE.replace(r#""chol": 250"#, r#""chol": "pending""#);
        let result = assess(
            &registry,
            &Vocabulary::builtin(),
            &AppConfig::default(),
            Condition::Heart,
            &intake(&json),
        )
        .unwrap();

        assert_eq!(result.label, None);
        assert_eq!(result.verdict, PREDICTION_UNAVAILABLE);
        assert_eq!(result.report.risk_percent(), None);
        assert!(matches!(
            result.probability,
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::FeatureUnavailable(_)
            }
        ));
        let chol = result
            .report
            .rows()
            .iter()
            .find(|r| r.name == "Cholesterol")
            .unwrap();
        assert_eq!(chol.flag.status, crate::models::enums::FlagStatus::Normal);
        assert_eq!(chol.flag.basis, crate::report::FlagBasis::ValueNotNumeric);
    }

    #[test]
    fn partial_intake_without_model_still_yields_report() {
        let registry = ModelRegistry::new(ArtifactLoader::default(), Vec::new());
        let result = assess(
            &registry,
            &Vocabulary::builtin(),
            &AppConfig::default(),
            Condition::Heart,
            &intake(r#"{"Patient Name": "Asha", "chol": 250}"#),
        )
        .unwrap();

        assert_eq!(result.verdict, PREDICTION_UNAVAILABLE);
        assert_eq!(result.report.risk_display(), "unknown");
        assert_eq!(result.report.identity().patient_name.as_deref(), Some("Asha"));
        assert_eq!(result.report.rows().len(), 1);
        assert_eq!(
            result.report.rows()[0].flag.status,
            crate::models::enums::FlagStatus::High
        );
        match result.probability {
            ProbabilityOutcome::Unavailable {
                reason: UnavailableReason::FeatureUnavailable(detail),
            } => assert!(detail.contains("age"), "{detail}"),
            other => panic!("expected FeatureUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn report_generator_comes_from_config() {
        let registry = ModelRegistry::new(ArtifactLoader::default(), Vec::new());
        let config = AppConfig {
            report_generator: "Ward 4 Analyzer".into(),
            ..AppConfig::default()
        };
        let result = assess(
            &registry,
            &Vocabulary::builtin(),
            &config,
            Condition::Heart,
            &intake(HEART_INTAKE),
        )
        .unwrap();
        assert_eq!(
            result.report.identity().generated_by.as_deref(),
            Some("Ward 4 Analyzer")
        );
    }

    #[test]
    fn every_schema_feature_has_a_key() {
        for condition in Condition::ALL {
            for spec in feature_schema(condition) {
                assert!(
                    spec.parameter.is_some() || !spec.raw_keys.is_empty(),
                    "{condition}: {}",
                    spec.name
                );
            }
        }
    }
}
