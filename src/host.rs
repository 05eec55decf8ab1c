// Browser-backed ports. The page passes a host object and a MediaStream; everything here is
// thin js-sys plumbing around them.

use js_sys::{Array, Function, Reflect};
use log::error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::error::EngineError;
use crate::ports::{Camera, Clock, TimerKind, TimerSource};
use crate::types::Millis;

pub struct JsClock;

impl Clock for JsClock {
    fn now(&self) -> Millis {
        Millis::from_js(js_sys::Date::now())
    }
}

fn method(target: &JsValue, name: &str) -> Result<Function, EngineError> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
        .ok_or_else(|| EngineError::InvalidConfig(format!("host object has no `{}` function", name)))
}

/// Timers driven by the host object's `startTimer(kind, everyMs)` and `cancelTimer(kind)`,
/// which wrap `setInterval`/`clearInterval` and call back into the engine.
pub struct JsTimers {
    host: JsValue,
    start: Function,
    cancel: Function,
}

impl JsTimers {
    pub fn from_host(host: JsValue) -> Result<Self, EngineError> {
        let start = method(&host, "startTimer")?;
        let cancel = method(&host, "cancelTimer")?;
        Ok(JsTimers { host, start, cancel })
    }
}

impl TimerSource for JsTimers {
    fn start(&mut self, kind: TimerKind, every_ms: u32) {
        let result = self.start.call2(
            &self.host,
            &JsValue::from_str(kind.as_str()),
            &JsValue::from(every_ms),
        );
        if let Err(err) = result {
            error!("startTimer({}) failed: {:?}", kind.as_str(), err);
        }
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Err(err) = self.cancel.call1(&self.host, &JsValue::from_str(kind.as_str())) {
            error!("cancelTimer({}) failed: {:?}", kind.as_str(), err);
        }
    }
}

/// A `MediaStream` from `getUserMedia`. Release stops every track.
pub struct JsCamera {
    stream: JsValue,
}

impl JsCamera {
    pub fn new(stream: JsValue) -> Result<Self, EngineError> {
        if stream.is_null() || stream.is_undefined() {
            return Err(EngineError::CameraUnavailable("no media stream".to_string()));
        }
        method(&stream, "getTracks")
            .map_err(|_| EngineError::CameraUnavailable("value is not a MediaStream".to_string()))?;
        Ok(JsCamera { stream })
    }
}

impl Camera for JsCamera {
    fn release(&mut self) {
        let tracks = match method(&self.stream, "getTracks")
            .ok()
            .and_then(|get_tracks| get_tracks.call0(&self.stream).ok())
        {
            Some(tracks) => Array::from(&tracks),
            None => {
                error!("Could not list camera tracks to stop");
                return;
            }
        };

        for track in tracks.iter() {
            let stopped = method(&track, "stop")
                .ok()
                .and_then(|stop| stop.call0(&track).ok());
            if stopped.is_none() {
                error!("Failed to stop a camera track");
            }
        }
    }
}
