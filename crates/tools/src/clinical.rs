//! Clinical-mode lookup tools.
//!
//! Deterministic stand-ins for the hospital record system, a drug
//! interaction database and document OCR. They return plausible text so
//! the interview flow can be exercised end-to-end without network access.

use async_trait::async_trait;
use medintake_core::error::ToolError;
use medintake_core::tool::{Tool, ToolKind, ToolResult};

fn required_str<'a>(arguments: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

pub struct SearchPatientRecordsTool;

const PATIENT_RECORDS: &[(&str, &str)] = &[
    (
        "john doe",
        "PATIENT: John Doe (M, 45). Hx: Hypertension, Type 2 Diabetes. Last Visit: 3 months ago. Meds: Metformin, Lisinopril.",
    ),
    (
        "sarah smith",
        "PATIENT: Sarah Smith (F, 29). Hx: Asthma. Allergies: Penicillin.",
    ),
];

#[async_trait]
impl Tool for SearchPatientRecordsTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SearchPatientRecords
    }

    fn description(&self) -> &str {
        "Search the hospital records for a patient's prior history by full name."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query_name": {
                    "type": "string",
                    "description": "The patient's full name"
                }
            },
            "required": ["query_name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let name = required_str(&arguments, "query_name")?.to_lowercase();
        let record = PATIENT_RECORDS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, record)| *record);

        let found = record.is_some();
        let text = record.unwrap_or("No record found. Create new profile.");
        Ok(ToolResult::ok(format!("[DATABASE RETURN] {text}"))
            .with_data(serde_json::json!({ "found": found })))
    }
}

pub struct CheckDrugInteractionTool;

/// Pairs are stored sorted so lookup is order-insensitive.
const INTERACTIONS: &[((&str, &str), &str)] = &[
    (("aspirin", "warfarin"), "CRITICAL: Increased bleeding risk."),
    (("ibuprofen", "lisinopril"), "MODERATE: May reduce anti-hypertensive effect."),
];

pub fn interaction_for(drug_a: &str, drug_b: &str) -> &'static str {
    let mut pair = [drug_a.trim().to_lowercase(), drug_b.trim().to_lowercase()];
    pair.sort();
    INTERACTIONS
        .iter()
        .find(|((a, b), _)| *a == pair[0] && *b == pair[1])
        .map(|(_, verdict)| *verdict)
        .unwrap_or("SAFE: No known major interactions.")
}

#[async_trait]
impl Tool for CheckDrugInteractionTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CheckDrugInteraction
    }

    fn description(&self) -> &str {
        "Check two medications for contraindications."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "drug_a": { "type": "string", "description": "First medication" },
                "drug_b": { "type": "string", "description": "Second medication" }
            },
            "required": ["drug_a", "drug_b"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let a = required_str(&arguments, "drug_a")?;
        let b = required_str(&arguments, "drug_b")?;
        Ok(ToolResult::ok(interaction_for(a, b)))
    }
}

pub struct ScanUploadedDocumentTool;

#[async_trait]
impl Tool for ScanUploadedDocumentTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ScanUploadedDocument
    }

    fn description(&self) -> &str {
        "Read back the contents of a document the patient uploaded (lab report, prescription, discharge summary)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "doc_type": {
                    "type": "string",
                    "description": "What kind of document it is, e.g. 'lab report'"
                }
            },
            "required": ["doc_type"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let doc_type = required_str(&arguments, "doc_type")?;
        let text = if doc_type.to_lowercase().contains("lab") {
            "OCR SCAN RESULT: [Lab Report: CBC] WBC: 12.5 (High), RBC: Normal. Platelets: Normal."
        } else {
            "OCR SCAN RESULT: [Unknown Document] Text unclear."
        };
        Ok(ToolResult::ok(text))
    }
}
