use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use super::canonical::CanonicalRecord;
use super::identity::PatientIdentity;
use super::range::{Flag, RangeSpec};
use super::vocabulary::{Parameter, Vocabulary};
use crate::models::measurement::MeasurementValue;

/// One line of the results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub parameter: Parameter,
    pub name: String,
    pub value: MeasurementValue,
    pub range: RangeSpec,
    pub flag: Flag,
}

/// Everything a renderer needs. Built once, never modified.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    report_id: Uuid,
    generated_at: DateTime<Local>,
    vocabulary_version: String,
    identity: PatientIdentity,
    condition_label: String,
    risk_percent: Option<f64>,
    rows: Vec<ResultRow>,
    measurements: CanonicalRecord,
    diagnosis: String,
}

impl ReportDocument {
    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    pub fn generated_at(&self) -> DateTime<Local> {
        self.generated_at
    }

    pub fn vocabulary_version(&self) -> &str {
        &self.vocabulary_version
    }

    pub fn identity(&self) -> &PatientIdentity {
        &self.identity
    }

    pub fn condition_label(&self) -> &str {
        &self.condition_label
    }

    pub fn risk_percent(&self) -> Option<f64> {
        self.risk_percent
    }

    /// Risk as printed: two decimals with `%`, or `unknown`.
    pub fn risk_display(&self) -> String {
        match self.risk_percent {
            Some(r) => format!("{r:.2}%"),
            None => "unknown".into(),
        }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn measurements(&self) -> &CanonicalRecord {
        &self.measurements
    }

    pub fn diagnosis(&self) -> &str {
        &self.diagnosis
    }
}

/// Assemble a report from a canonical record.
///
/// Rows are the measurements that have a reference range, in vocabulary
/// order; everything else stays in `measurements` only.
pub fn compile(
    vocabulary: &Vocabulary,
    identity: PatientIdentity,
    condition_label: &str,
    record: &CanonicalRecord,
    risk_percent: Option<f64>,
    diagnosis: &str,
) -> ReportDocument {
    let rows: Vec<ResultRow> = vocabulary
        .entries()
        .iter()
        .filter_map(|entry| {
            let name = entry.display_name();
            let value = record.get(name)?;
            Some(ResultRow {
                parameter: entry.parameter,
                name: name.to_string(),
                value: value.clone(),
                range: entry.range.clone(),
                flag: vocabulary.flag(name, value),
            })
        })
        .collect();

    let report_id = Uuid::new_v4();
    tracing::info!(
        report_id = %report_id,
        condition = condition_label,
        rows = rows.len(),
        measurements = record.len(),
        risk_known = risk_percent.is_some(),
        "Report compiled"
    );

    ReportDocument {
        report_id,
        generated_at: Local::now(),
        vocabulary_version: vocabulary.version().to_string(),
        identity,
        condition_label: condition_label.to_string(),
        risk_percent,
        rows,
        measurements: record.clone(),
        diagnosis: diagnosis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::FlagStatus;
    use crate::models::measurement::RawRecord;
    use crate::report::canonical::canonicalize;

    fn compile_json(json: &str, risk: Option<f64>) -> ReportDocument {
        let vocab = Vocabulary::builtin();
        let record = canonicalize(&vocab, &RawRecord::from_json_str(json).unwrap());
        let identity = PatientIdentity::from_record(&record, "MedGuardian AI Lab System");
        compile(&vocab, identity, "Heart Disease", &record, risk, "High Risk")
    }

    #[test]
    fn cholesterol_end_to_end() {
        let doc = compile_json(r#"{"Cholesterol": 250}"#, Some(72.3));
        assert_eq!(doc.rows().len(), 1);
        let row = &doc.rows()[0];
        assert_eq!(row.name, "Cholesterol");
        assert_eq!(row.value, MeasurementValue::Integer(250));
        assert_eq!(row.range.text(), "< 200");
        assert_eq!(row.flag.status, FlagStatus::High);
        assert_eq!(doc.risk_percent(), Some(72.3));
        assert_eq!(doc.risk_display(), "72.30%");
    }

    #[test]
    fn rows_follow_vocabulary_order() {
        let doc = compile_json(r#"{"sc": 1.4, "chol": 180, "cp": 2, "Notes": "fasting"}"#, None);
        let names: Vec<&str> = doc.rows().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Chest Pain Type", "Cholesterol", "Serum Creatinine"]);
    }

    #[test]
    fn unranged_measurements_kept_but_not_tabled() {
        let doc = compile_json(r#"{"Patient Name": "Asha", "Notes": "fasting", "chol": 150}"#, None);
        assert_eq!(doc.rows().len(), 1);
        assert_eq!(doc.measurements().len(), 3);
        assert!(doc.measurements().get("Notes").is_some());
    }

    #[test]
    fn unknown_risk_displays_unknown() {
        let doc = compile_json(r#"{"chol": 150}"#, None);
        assert_eq!(doc.risk_percent(), None);
        assert_eq!(doc.risk_display(), "unknown");
    }

    #[test]
    fn blank_measurement_still_gets_a_row() {
        let doc = compile_json(r#"{"Cholesterol": null}"#, None);
        assert_eq!(doc.rows().len(), 1);
        assert_eq!(doc.rows()[0].flag.status, FlagStatus::Normal);
    }

    #[test]
    fn no_ranged_parameters_gives_empty_table() {
        let doc = compile_json(r#"{"Patient Name": "Asha"}"#, Some(10.0));
        assert!(doc.rows().is_empty());
    }

    #[test]
    fn report_ids_are_unique() {
        let a = compile_json("{}", None);
        let b = compile_json("{}", None);
        assert_ne!(a.report_id(), b.report_id());
    }

    #[test]
    fn document_serializes_with_rows_and_identity() {
        let doc = compile_json(r#"{"Patient ID": "MG-7", "chol": 250}"#, Some(72.3));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["identity"]["patient_id"], "MG-7");
        assert_eq!(json["rows"][0]["flag"]["status"], "high");
        assert_eq!(json["rows"][0]["range"]["text"], "< 200");
        assert_eq!(json["risk_percent"], 72.3);
        assert_eq!(json["vocabulary_version"], "2025.1");
    }
}
