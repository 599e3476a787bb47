use serde::{Deserialize, Serialize};

use super::canonical::CanonicalRecord;

const CONTACT_KEYS: [&str; 5] = [
    "Phone",
    "Patient Contact",
    "Contact",
    "Phone Number",
    "Patient Phone",
];

/// Who the report is about and who ordered it.
///
/// Every field is optional; renderers print `-` for an absent one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub contact: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub doctor_name: Option<String>,
    pub referred_by: Option<String>,
    pub sample_collected: Option<String>,
    pub generated_by: Option<String>,
}

impl PatientIdentity {
    /// Pull identity fields out of an intake record.
    ///
    /// Each field takes the first non-blank of its display key and its
    /// snake_case key. `default_generator` fills "Report Generated By".
    pub fn from_record(record: &CanonicalRecord, default_generator: &str) -> Self {
        let generated_by = first_present(record, &["Report Generated By", "report_generated_by"])
            .or_else(|| Some(default_generator.to_string()).filter(|g| !g.trim().is_empty()));
        Self {
            patient_id: first_present(record, &["Patient ID", "patient_id"]),
            patient_name: first_present(record, &["Patient Name", "patient_name"]),
            contact: first_present(record, &CONTACT_KEYS),
            age: first_present(record, &["Age", "age"]),
            gender: first_present(record, &["Gender", "gender"]),
            doctor_name: first_present(record, &["Doctor Name", "doctor_name"]),
            referred_by: first_present(record, &["Referred By", "referred_by"]),
            sample_collected: first_present(record, &["Sample Collected", "sample_collected"]),
            generated_by,
        }
    }
}

fn first_present(record: &CanonicalRecord, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| record.get(k))
        .find(|v| !v.is_blank())
        .map(|v| v.to_string())
}

/// `-` for an absent field.
pub fn or_dash(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::measurement::RawRecord;
    use crate::report::canonical::canonicalize;
    use crate::report::vocabulary::Vocabulary;

    fn identity(json: &str) -> PatientIdentity {
        let raw = RawRecord::from_json_str(json).unwrap();
        PatientIdentity::from_record(&canonicalize(&Vocabulary::builtin(), &raw), "MedGuardian AI Lab System")
    }

    #[test]
    fn display_keys_read_first() {
        let id = identity(r#"{"Patient ID": "MG-1", "patient_id": "other", "Patient Name": "Asha Rao"}"#);
        assert_eq!(id.patient_id.as_deref(), Some("MG-1"));
        assert_eq!(id.patient_name.as_deref(), Some("Asha Rao"));
    }

    #[test]
    fn snake_case_fallback() {
        let id = identity(r#"{"patient_id": "MG-2", "doctor_name": "Dr. Iyer", "referred_by": "OPD"}"#);
        assert_eq!(id.patient_id.as_deref(), Some("MG-2"));
        assert_eq!(id.doctor_name.as_deref(), Some("Dr. Iyer"));
        assert_eq!(id.referred_by.as_deref(), Some("OPD"));
    }

    #[test]
    fn contact_key_priority() {
        let id = identity(r#"{"Patient Phone": "+91 1", "Contact": "+91 2"}"#);
        assert_eq!(id.contact.as_deref(), Some("+91 2"));
        let id = identity(r#"{"Phone Number": "+91 3"}"#);
        assert_eq!(id.contact.as_deref(), Some("+91 3"));
    }

    #[test]
    fn blank_values_fall_through() {
        let id = identity(r#"{"Phone": "", "Patient Contact": "+91 4"}"#);
        assert_eq!(id.contact.as_deref(), Some("+91 4"));
    }

    #[test]
    fn missing_fields_render_as_dash() {
        let id = identity("{}");
        assert_eq!(or_dash(&id.patient_name), "-");
        assert_eq!(or_dash(&id.age), "-");
    }

    #[test]
    fn numeric_age_rendered() {
        let id = identity(r#"{"Age": 52, "Gender": "Female"}"#);
        assert_eq!(id.age.as_deref(), Some("52"));
        assert_eq!(id.gender.as_deref(), Some("Female"));
    }

    #[test]
    fn generator_defaults_from_config() {
        assert_eq!(
            identity("{}").generated_by.as_deref(),
            Some("MedGuardian AI Lab System")
        );
        let id = identity(r#"{"Report Generated By": "Night shift"}"#);
        assert_eq!(id.generated_by.as_deref(), Some("Night shift"));
    }
}
