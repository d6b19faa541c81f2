//! Admin-mode tools.

use async_trait::async_trait;
use medintake_core::error::ToolError;
use medintake_core::tool::{Tool, ToolKind, ToolResult, ValidationVerdict};
use tracing::info;
use crate::gate::REJECTION_PREFIX;

const DEFAULT_URGENCY: &str = "Routine";

/// Books a slot in the hospital system. Stand-in: always succeeds.
pub struct ScheduleAppointmentTool;

#[async_trait]
impl Tool for ScheduleAppointmentTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ScheduleAppointment
    }

    fn description(&self) -> &str {
        "Book an appointment slot in a hospital department."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "department": {
                    "type": "string",
                    "description": "Department to book, e.g. 'Cardiology'"
                },
                "urgency": {
                    "type": "string",
                    "description": "Routine, Soon or Urgent",
                    "default": DEFAULT_URGENCY
                }
            },
            "required": ["department"]
        })
    }

    fn validate(&self, arguments: &serde_json::Value) -> ValidationVerdict {
        let department = arguments["department"].as_str().map(str::trim).unwrap_or_default();
        if department.is_empty() || department.eq_ignore_ascii_case("unknown") {
            return ValidationVerdict::reject(
                vec!["Department".into()],
                format!("{REJECTION_PREFIX} You cannot book an appointment yet. You are missing: Department. Ask the user for these details first."),
            );
        }
        ValidationVerdict::accept()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let department = arguments["department"]
            .as_str()
            .map(str::trim)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'department' argument".into()))?;
        let urgency = arguments["urgency"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_URGENCY);

        info!(department, urgency, "Appointment booked");

        Ok(ToolResult::ok(format!(
            "SUCCESS: Appointment booked in {department} (Priority: {urgency}) for tomorrow at 10:00 AM."
        ))
        .with_data(serde_json::json!({ "department": department, "urgency": urgency })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn books_with_given_urgency() {
        let result = ScheduleAppointmentTool
            .execute(json!({"department": "Cardiology", "urgency": "Urgent"}))
            .await
            .unwrap();
        assert_eq!(
            result.content,
            "SUCCESS: Appointment booked in Cardiology (Priority: Urgent) for tomorrow at 10:00 AM."
        );
    }

    #[tokio::test]
    async fn urgency_defaults_to_routine() {
        let result = ScheduleAppointmentTool
            .execute(json!({"department": "ENT"}))
            .await
            .unwrap();
        assert!(result.content.contains("Priority: Routine"));
    }

    #[test]
    fn missing_department_rejected() {
        let verdict = ScheduleAppointmentTool.validate(&json!({"urgency": "Urgent"}));
        assert!(!verdict.accepted);
        assert_eq!(verdict.missing_fields, vec!["Department"]);
        assert!(verdict.message.starts_with("SYSTEM_REJECTION:"));
        assert!(!ScheduleAppointmentTool.validate(&json!({"department": " unknown "})).accepted);
        assert!(ScheduleAppointmentTool.validate(&json!({"department": "Dermatology"})).accepted);
    }

    #[test]
    fn has_side_effects() {
        assert!(ScheduleAppointmentTool.kind().has_side_effects());
    }
}
