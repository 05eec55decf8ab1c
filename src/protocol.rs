// Wire shapes for the three backend endpoints. Requests are ordered form-field lists that JS
// appends to a FormData; responses are parsed from the JSON bodies.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::summary::SessionSummary;
use crate::types::*;

pub const START_SESSION_PATH: &str = "/start-session";
pub const FRAME_PATH: &str = "/frame";
pub const END_SESSION_PATH: &str = "/end-session";

pub const START_FAILED_MESSAGE: &str = "Failed to start session.";
pub const SERVER_ERROR_MESSAGE: &str = "Error talking to the server.";

/// Ordered `(name, value)` pairs for a multipart/urlencoded body.
pub type FormFields = Vec<(String, String)>;

fn field(name: &str, value: impl ToString) -> (String, String) {
    (name.to_string(), value.to_string())
}

/// Session settings as entered in the start form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionForm {
    pub duration_minutes: u32,
    /// Seconds; may be fractional.
    pub alert_threshold: f64,
    #[serde(default)]
    pub alert_mode: AlertMode,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub send_email: bool,
    #[serde(default)]
    pub send_sms: bool,
}

impl SessionForm {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.duration_minutes == 0 {
            return Err(EngineError::InvalidForm(
                "duration_minutes must be a positive number of minutes".to_string(),
            ));
        }
        if !self.alert_threshold.is_finite() || self.alert_threshold < 0.0 {
            return Err(EngineError::InvalidForm(format!(
                "alert_threshold must be a non-negative number of seconds, got {}",
                self.alert_threshold
            )));
        }
        Ok(())
    }

    /// Fields for the start-session request. Empty contact fields and unset flags are omitted.
    pub fn to_fields(&self) -> Result<FormFields, EngineError> {
        self.validate()?;

        let mut fields = vec![
            field("duration_minutes", self.duration_minutes),
            field("alert_threshold", self.alert_threshold),
            field("alert_mode", self.alert_mode.as_str()),
        ];
        if let Some(email) = non_empty(&self.email) {
            fields.push(field("email", email));
        }
        if let Some(phone) = non_empty(&self.phone) {
            fields.push(field("phone", phone));
        }
        if self.send_email {
            fields.push(field("send_email_flag", "true"));
        }
        if self.send_sms {
            fields.push(field("send_sms_flag", "true"));
        }
        Ok(fields)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Body of a successful start-session response. Missing alert settings fall back to the
/// engine configuration when the session is activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub alert_threshold_ms: Option<u64>,
    #[serde(default, deserialize_with = "lenient_alert_mode")]
    pub alert_mode: Option<AlertMode>,
}

fn lenient_alert_mode<'de, D>(deserializer: D) -> Result<Option<AlertMode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(AlertMode::parse))
}

impl StartSessionResponse {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

/// Metadata for one frame upload; JS attaches the JPEG blob as `frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRequest {
    pub session_id: SessionId,
    pub seq: FrameSeq,
}

impl FrameRequest {
    pub fn to_fields(&self) -> FormFields {
        vec![field("session_id", self.session_id)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameResponse {
    #[serde(default)]
    pub focused: bool,
}

impl FrameResponse {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

/// Fields for the end-session request.
pub fn end_session_fields(summary: &SessionSummary) -> FormFields {
    vec![
        field("session_id", summary.session_id),
        field("total_seconds", summary.total_seconds),
        field("focused_seconds", summary.focused_seconds),
        field("unfocused_seconds", summary.unfocused_seconds),
        field("breaks_count", summary.breaks_count),
        field("focus_percent", summary.focus_percent),
        field("ended_early", if summary.ended_early { "true" } else { "false" }),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndSessionResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl EndSessionResponse {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::FocusTotals;

    fn form() -> SessionForm {
        SessionForm {
            duration_minutes: 25,
            alert_threshold: 2.5,
            alert_mode: AlertMode::Popup,
            email: Some("test@example.com".to_string()),
            phone: Some("   ".to_string()),
            send_email: true,
            send_sms: false,
        }
    }

    fn names(fields: &FormFields) -> Vec<&str> {
        fields.iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn start_fields_omit_empty_optionals() {
        let fields = form().to_fields().unwrap();
        assert_eq!(
            names(&fields),
            vec!["duration_minutes", "alert_threshold", "alert_mode", "email", "send_email_flag"]
        );
        assert_eq!(fields[1].1, "2.5");
        assert_eq!(fields[4].1, "true");
    }

    #[test]
    fn start_form_rejects_zero_duration() {
        let bad = SessionForm { duration_minutes: 0, ..form() };
        assert!(matches!(bad.to_fields(), Err(EngineError::InvalidForm(_))));
    }

    #[test]
    fn start_form_rejects_negative_threshold() {
        let bad = SessionForm { alert_threshold: -1.0, ..form() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn start_response_ignores_extra_fields() {
        let json = r#"{
            "session_id": 12,
            "duration_minutes": 25,
            "email": "test@example.com",
            "alert_threshold_ms": 2500,
            "alert_mode": "both",
            "ends_at": "2024-05-01T10:25:00"
        }"#;
        let resp = StartSessionResponse::from_json(json).unwrap();
        assert_eq!(resp.session_id, SessionId::new(12));
        assert_eq!(resp.alert_threshold_ms, Some(2500));
        assert_eq!(resp.alert_mode, Some(AlertMode::Both));
    }

    #[test]
    fn start_response_unknown_mode_is_popup() {
        let json = r#"{"session_id":1,"alert_threshold_ms":1000,"alert_mode":"flash"}"#;
        assert_eq!(
            StartSessionResponse::from_json(json).unwrap().alert_mode,
            Some(AlertMode::Popup)
        );
    }

    #[test]
    fn start_response_alert_settings_are_optional() {
        let resp = StartSessionResponse::from_json(r#"{"session_id":5}"#).unwrap();
        assert_eq!(resp.session_id, SessionId::new(5));
        assert!(resp.alert_threshold_ms.is_none());
        assert!(resp.alert_mode.is_none());

        let nulls = r#"{"session_id":5,"alert_threshold_ms":null,"alert_mode":null}"#;
        let resp = StartSessionResponse::from_json(nulls).unwrap();
        assert!(resp.alert_threshold_ms.is_none());
        assert!(resp.alert_mode.is_none());
    }

    #[test]
    fn start_response_missing_id_is_invalid() {
        let err = StartSessionResponse::from_json(r#"{"alert_threshold_ms":1000}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidResponse(_)));
    }

    #[test]
    fn frame_response_defaults_to_unfocused() {
        assert!(!FrameResponse::from_json("{}").unwrap().focused);
        assert!(FrameResponse::from_json(r#"{"focused":true}"#).unwrap().focused);
    }

    #[test]
    fn end_fields_encode_summary() {
        let totals = FocusTotals {
            focused_ms: 240_000,
            unfocused_ms: 60_000,
            breaks_count: 3,
        };
        let summary = SessionSummary::from_totals(SessionId::new(5), totals, false);
        let fields = end_session_fields(&summary);
        assert_eq!(fields[0], ("session_id".to_string(), "5".to_string()));
        assert_eq!(fields[5], ("focus_percent".to_string(), "80".to_string()));
        assert_eq!(fields[6], ("ended_early".to_string(), "false".to_string()));
    }

    #[test]
    fn end_response_reports_failure() {
        let resp = EndSessionResponse::from_json(r#"{"ok":false,"error":"Session not found"}"#).unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.error.as_deref(), Some("Session not found"));
    }
}
