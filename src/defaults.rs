// Saved form defaults, persisted by JS in localStorage under a fixed key.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::protocol::SessionForm;
use crate::types::AlertMode;

pub const DEFAULTS_STORAGE_KEY: &str = "focus_sentry_defaults";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDefaults {
    pub duration_minutes: u32,
    pub alert_threshold: f64,
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

impl SavedDefaults {
    /// Parse the stored record. Missing or malformed data yields `None`; the form keeps
    /// its built-in values.
    pub fn load(raw: Option<&str>) -> Option<SavedDefaults> {
        let raw = raw?;
        match serde_json::from_str::<SavedDefaults>(raw) {
            Ok(defaults) if defaults.to_form().validate().is_ok() => Some(defaults),
            Ok(_) => {
                debug!("Ignoring stored defaults with out-of-range values");
                None
            }
            Err(err) => {
                debug!("Ignoring malformed stored defaults: {}", err);
                None
            }
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_form(&self) -> SessionForm {
        SessionForm {
            duration_minutes: self.duration_minutes,
            alert_threshold: self.alert_threshold,
            alert_mode: self.alert_mode,
            email: self.email.clone(),
            phone: self.phone.clone(),
            send_email: self.send_email,
            send_sms: self.send_sms,
        }
    }
}

impl From<&SessionForm> for SavedDefaults {
    fn from(form: &SessionForm) -> Self {
        SavedDefaults {
            duration_minutes: form.duration_minutes,
            alert_threshold: form.alert_threshold,
            alert_mode: form.alert_mode,
            email: form.email.clone(),
            phone: form.phone.clone(),
            send_email: form.send_email,
            send_sms: form.send_sms,
        }
    }
}
