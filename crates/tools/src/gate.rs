//! Validation gate for report generation.
//!
//! A pure check run before any report is built. A field counts as
//! missing when it is absent, blank, not a string, or one of the
//! placeholder tokens a model tends to invent ("unknown", "n/a", ...)
//! to push the call through. The rejection text names exactly the
//! missing fields so the model can ask the user for them next turn.

use chrono::Utc;
use medintake_core::tool::ValidationVerdict;
use serde_json::Value;
use crate::report::ReportPayload;

pub const REJECTION_PREFIX: &str = "SYSTEM_REJECTION:";

/// Sentinel medication list when none were given.
pub const NO_MEDICATIONS: &str = "None reported";

struct RequiredField {
    key: &'static str,
    label: &'static str,
    placeholders: &'static [&'static str],
    numeric_ok: bool,
}

/// Identity fields, in the order they are reported.
const REQUIRED: [RequiredField; 3] = [
    RequiredField {
        key: "patient_name",
        label: "Patient Name",
        placeholders: &["unknown", "user", "patient", "n/a", "na", "none"],
        numeric_ok: false,
    },
    RequiredField {
        key: "age",
        label: "Age",
        placeholders: &["unknown", "0", "n/a", "na", "none"],
        numeric_ok: true,
    },
    RequiredField {
        key: "gender",
        label: "Gender",
        placeholders: &["unknown", "not specified", "n/a", "na", "none"],
        numeric_ok: false,
    },
];

/// Read a required field as trimmed text, or `None` if it is unusable.
fn present_value(args: &Value, field: &RequiredField) -> Option<String> {
    let raw = match args.get(field.key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) if field.numeric_ok => n.to_string(),
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }
    let lowered = raw.to_lowercase();
    if field.placeholders.contains(&lowered.as_str()) {
        return None;
    }
    Some(raw)
}

/// Labels of every missing identity field, in stable order.
pub fn missing_fields(args: &Value) -> Vec<String> {
    REQUIRED
        .iter()
        .filter(|f| present_value(args, f).is_none())
        .map(|f| f.label.to_string())
        .collect()
}

pub fn rejection_message(missing: &[String]) -> String {
    format!(
        "{REJECTION_PREFIX} You cannot generate a report yet. You are missing: {}. Ask the user for these details first.",
        missing.join(", ")
    )
}

/// Run the gate.
pub fn check(args: &Value) -> ValidationVerdict {
    let missing = missing_fields(args);
    if missing.is_empty() {
        ValidationVerdict::accept()
    } else {
        let message = rejection_message(&missing);
        ValidationVerdict::reject(missing, message)
    }
}

/// Validate and build the normalized payload.
pub fn normalize(args: &Value) -> Result<ReportPayload, ValidationVerdict> {
    let verdict = check(args);
    if !verdict.accepted {
        return Err(verdict);
    }

    // Accepted, so all three are present.
    let [name, age, gender] = REQUIRED.map(|f| present_value(args, &f).unwrap_or_default());

    Ok(ReportPayload {
        patient_name: title_case(&name),
        age,
        gender: title_case(&gender),
        chief_complaint: free_text(args, "chief_complaint"),
        history: free_text(args, "history"),
        lifestyle_impact: free_text(args, "lifestyle_impact"),
        diagnosis: free_text(args, "diagnosis"),
        medications: medications(args.get("medications")),
        prognosis: free_text(args, "prognosis"),
        medical_opinion: free_text(args, "medical_opinion"),
        recommendations: free_text(args, "recommendations"),
        generated_at: Utc::now(),
    })
}

/// Clinical prose is kept exactly as the model wrote it.
fn free_text(args: &Value, key: &str) -> String {
    match args.get(key) {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn medications(value: Option<&Value>) -> Vec<String> {
    let list = match value {
        Some(Value::String(s)) => split_medications(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .flat_map(split_medications)
            .collect(),
        _ => Vec::new(),
    };
    if list.is_empty() {
        vec![NO_MEDICATIONS.to_string()]
    } else {
        list
    }
}

/// Split on commas and newlines; one title-cased entry per non-empty segment.
pub fn split_medications(raw: &str) -> Vec<String> {
    raw.replace('\n', ",")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(title_case)
        .collect()
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete() -> Value {
        json!({
            "patient_name": "asha rao",
            "age": "34",
            "gender": "female",
            "chief_complaint": "Fever for 3 days, 101°F\n  worse at night",
            "history": "",
            "medications": "metformin, lisinopril"
        })
    }

    #[test]
    fn missing_name_only() {
        let verdict = check(&json!({"patient_name": "", "age": "29", "gender": "Female"}));
        assert!(!verdict.accepted);
        assert_eq!(verdict.missing_fields, vec!["Patient Name"]);
        assert_eq!(
            verdict.message,
            "SYSTEM_REJECTION: You cannot generate a report yet. You are missing: Patient Name. Ask the user for these details first."
        );
    }

    #[test]
    fn all_missing_in_stable_order() {
        let verdict = check(&json!({}));
        assert_eq!(verdict.missing_fields, vec!["Patient Name", "Age", "Gender"]);
        assert!(verdict.message.contains("Patient Name, Age, Gender"));
    }

    #[test]
    fn placeholders_count_as_missing() {
        let verdict = check(&json!({"patient_name": " Patient ", "age": "N/A", "gender": "Not Specified"}));
        assert_eq!(verdict.missing_fields, vec!["Patient Name", "Age", "Gender"]);

        let verdict = check(&json!({"patient_name": "UNKNOWN", "age": "0", "gender": "none"}));
        assert_eq!(verdict.missing_fields.len(), 3);
    }

    #[test]
    fn non_string_values_are_absent() {
        let verdict = check(&json!({"patient_name": 42, "age": null, "gender": ["f"]}));
        assert_eq!(verdict.missing_fields, vec!["Patient Name", "Age", "Gender"]);
    }

    #[test]
    fn numeric_age_accepted_except_zero() {
        assert!(check(&json!({"patient_name": "Ravi", "age": 61, "gender": "Male"})).accepted);
        let verdict = check(&json!({"patient_name": "Ravi", "age": 0, "gender": "Male"}));
        assert_eq!(verdict.missing_fields, vec!["Age"]);
    }

    #[test]
    fn gate_is_idempotent() {
        let args = json!({"patient_name": "user", "age": "40", "gender": ""});
        assert_eq!(check(&args), check(&args));
    }

    #[test]
    fn accepts_sparse_clinical_fields() {
        let payload = normalize(&json!({
            "patient_name": "Asha Rao",
            "age": "34",
            "gender": "Female",
            "medications": "metformin, lisinopril"
        }))
        .unwrap();
        assert_eq!(payload.medications, vec!["Metformin", "Lisinopril"]);
        assert_eq!(payload.chief_complaint, "");
    }

    #[test]
    fn normalize_title_cases_identity() {
        let payload = normalize(&complete()).unwrap();
        assert_eq!(payload.patient_name, "Asha Rao");
        assert_eq!(payload.gender, "Female");
        assert_eq!(payload.age, "34");
    }

    #[test]
    fn normalize_keeps_free_text_verbatim() {
        let payload = normalize(&complete()).unwrap();
        assert_eq!(payload.chief_complaint, "Fever for 3 days, 101°F\n  worse at night");
        assert_eq!(payload.history, "");
        assert_eq!(payload.diagnosis, "");
    }

    #[test]
    fn normalize_rejection_carries_verdict() {
        let err = normalize(&json!({"patient_name": "Asha", "age": "34"})).unwrap_err();
        assert_eq!(err.missing_fields, vec!["Gender"]);
    }

    #[test]
    fn medication_split_on_commas_and_newlines() {
        assert_eq!(
            split_medications("paracetamol 500mg,\n  ibuprofen\n\n, ,VITAMIN d3"),
            vec!["Paracetamol 500Mg", "Ibuprofen", "Vitamin D3"]
        );
    }

    #[test]
    fn empty_medications_fall_back_to_sentinel() {
        let mut args = complete();
        args["medications"] = json!(" , \n ");
        assert_eq!(normalize(&args).unwrap().medications, vec![NO_MEDICATIONS]);

        args.as_object_mut().unwrap().remove("medications");
        assert_eq!(normalize(&args).unwrap().medications, vec![NO_MEDICATIONS]);
    }

    #[test]
    fn medication_array_accepted() {
        let mut args = complete();
        args["medications"] = json!(["aspirin", "warfarin, atorvastatin"]);
        assert_eq!(
            normalize(&args).unwrap().medications,
            vec!["Aspirin", "Warfarin", "Atorvastatin"]
        );
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("mary-jane o'neil"), "Mary-Jane O'Neil");
        assert_eq!(title_case("DR. SMITH"), "Dr. Smith");
    }
}
