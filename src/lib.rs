// focus_engine: Focus Sentry Rust/WASM Engine
// Session accounting, countdown, alert policy, and history statistics live here; JS is plumbing
// (DOM, getUserMedia, canvas capture, fetch, setInterval, localStorage, Chart.js).

mod countdown;
mod defaults;
mod error;
mod focus;
mod history;
mod host;
mod logging;
mod ports;
mod protocol;
mod session;
mod summary;
mod types;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

pub use countdown::{Countdown, CountdownTick};
pub use defaults::{SavedDefaults, DEFAULTS_STORAGE_KEY};
pub use error::EngineError;
pub use focus::{FocusTotals, FocusTracker, Observation};
pub use history::{
    build_series, compute_stats, filter_sessions, format_date_short, parse_timestamp,
    HistoryRange, HistoryStats, HistoryView, HistoryViewer, SeriesPoint, SessionRecord,
    WasmHistoryViewer,
};
pub use ports::{Camera, CameraLease, Clock, TimerKind, TimerSource};
pub use protocol::*;
pub use session::{CountdownUpdate, Finalization, SessionPhase, SessionTracker, TrackerSnapshot};
pub use summary::SessionSummary;
pub use types::*;

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init(LevelFilter::Info);
}

/// Observation as rendered by the page: status line plus how to alert, if at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ObservationView {
    state: FocusState,
    status_text: String,
    changed: bool,
    alert: Option<AlertView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AlertView {
    mode: AlertMode,
    notice: Option<String>,
    sound: bool,
}

impl From<Observation> for ObservationView {
    fn from(obs: Observation) -> Self {
        ObservationView {
            state: obs.state,
            status_text: obs.state.status_text(),
            changed: obs.changed,
            alert: obs.alert.map(|mode| AlertView {
                mode,
                notice: mode.shows_notice().then(|| ALERT_MESSAGE.to_string()),
                sound: mode.plays_sound(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FrameRequestView {
    session_id: SessionId,
    seq: FrameSeq,
    fields: FormFields,
}

#[derive(Debug, Serialize)]
struct Endpoints {
    start_session: &'static str,
    frame: &'static str,
    end_session: &'static str,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn js_err(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Session tracker exposed to JavaScript.
///
/// `host` must provide `startTimer(kind, everyMs)` and `cancelTimer(kind)`; timer callbacks
/// call `begin_frame`/`apply_frame` (kind `"frame"`) and `tick_countdown` (kind `"countdown"`).
#[wasm_bindgen]
pub struct SessionEngine {
    tracker: SessionTracker,
}

#[wasm_bindgen]
impl SessionEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, host: JsValue) -> Result<SessionEngine, JsValue> {
        let config = EngineConfig::from_json(config_json).map_err(js_err)?;
        let timers = host::JsTimers::from_host(host).map_err(js_err)?;
        Ok(SessionEngine {
            tracker: SessionTracker::new(config, Box::new(host::JsClock), Box::new(timers)),
        })
    }

    /// Endpoint paths: `{ start_session, frame, end_session }`.
    pub fn endpoints() -> Result<String, JsValue> {
        to_json(&Endpoints {
            start_session: START_SESSION_PATH,
            frame: FRAME_PATH,
            end_session: END_SESSION_PATH,
        })
    }

    /// Canvas capture settings: `{ width, height, jpeg_quality, file_name }`.
    pub fn frame_capture(&self) -> Result<String, JsValue> {
        to_json(&self.tracker.config().frame_capture)
    }

    /// Validate the start form and return the start-session fields as `[[name, value], ...]`.
    pub fn start_request(&self, form_json: &str) -> Result<String, JsValue> {
        let form: SessionForm = serde_json::from_str(form_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid session form: {}", e)))?;
        let fields = self.tracker.start_request(&form).map_err(js_err)?;
        to_json(&fields)
    }

    /// Status line for a failed start; pass the HTTP status, or nothing for a network error.
    pub fn start_failed(&self, status: Option<u16>) -> String {
        self.tracker.start_failed(status).to_string()
    }

    pub fn activate(&mut self, duration_minutes: u32, response_json: &str) -> Result<(), JsValue> {
        let response = StartSessionResponse::from_json(response_json).map_err(js_err)?;
        self.tracker
            .activate(duration_minutes, &response)
            .map_err(js_err)
    }

    /// Hand over the `MediaStream`; starts both timers.
    pub fn attach_camera(&mut self, stream: JsValue) -> Result<(), JsValue> {
        let camera = host::JsCamera::new(stream).map_err(js_err)?;
        self.tracker.attach_camera(Box::new(camera)).map_err(js_err)
    }

    /// Abort the pending session; returns the message to show.
    pub fn camera_failed(&mut self, reason: &str) -> String {
        self.tracker.camera_failed(reason).to_string()
    }

    /// Next frame request (`{ session_id, seq, fields }`), or nothing when no session runs.
    pub fn begin_frame(&mut self) -> Result<Option<String>, JsValue> {
        self.tracker
            .begin_frame()
            .map(|req| {
                to_json(&FrameRequestView {
                    session_id: req.session_id,
                    seq: req.seq,
                    fields: req.to_fields(),
                })
            })
            .transpose()
    }

    /// Apply a frame response body. Returns nothing for stale or late responses.
    pub fn apply_frame(&mut self, seq: u32, response_json: &str) -> Result<Option<String>, JsValue> {
        let seq = FrameSeq::new(u64::from(seq));
        let response = match FrameResponse::from_json(response_json) {
            Ok(response) => response,
            Err(err) => {
                self.tracker.frame_failed(seq, &err.to_string());
                return Ok(None);
            }
        };
        self.tracker
            .apply_frame(seq, response)
            .map(|obs| to_json(&ObservationView::from(obs)))
            .transpose()
    }

    pub fn frame_failed(&self, seq: u32, reason: &str) {
        self.tracker.frame_failed(FrameSeq::new(u64::from(seq)), reason);
    }

    /// Countdown callback: `{ tick, display, finished }`; `finished` carries the finalization.
    pub fn tick_countdown(&mut self) -> Result<Option<String>, JsValue> {
        self.tracker
            .tick_countdown()
            .map(|update| to_json(&update))
            .transpose()
    }

    /// Explicit end. Returns the finalization once; later calls return nothing.
    pub fn end_session(&mut self) -> Result<Option<String>, JsValue> {
        self.tracker.end_early().map(|fin| to_json(&fin)).transpose()
    }

    /// Report the end-session outcome: the JSON body, or an error description.
    pub fn end_session_settled(&self, response_json: Option<String>, error: Option<String>) {
        let result = match (response_json, error) {
            (_, Some(error)) => Err(EngineError::InvalidResponse(error)),
            (Some(body), None) => EndSessionResponse::from_json(&body),
            (None, None) => Err(EngineError::InvalidResponse("empty response".to_string())),
        };
        self.tracker.end_session_settled(result);
    }

    pub fn snapshot(&self) -> Result<String, JsValue> {
        to_json(&self.tracker.snapshot())
    }

    /// Storage key for saved defaults.
    pub fn defaults_key() -> String {
        DEFAULTS_STORAGE_KEY.to_string()
    }

    /// Parse stored defaults; nothing when absent or malformed.
    pub fn load_defaults(raw: Option<String>) -> Option<String> {
        SavedDefaults::load(raw.as_deref()).and_then(|defaults| defaults.to_json().ok())
    }

    /// Serialize the submitted form for storage.
    pub fn defaults_from_form(form_json: &str) -> Result<String, JsValue> {
        let form: SessionForm = serde_json::from_str(form_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid session form: {}", e)))?;
        SavedDefaults::from(&form).to_json().map_err(js_err)
    }
}
