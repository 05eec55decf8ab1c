// Session lifecycle: idle -> active -> finalized. Owns the focus accounting, the countdown,
// frame sequencing, the camera lease, and the two interval timers of one session.
// See DESIGN.md: Session Tracker

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::countdown::{Countdown, CountdownTick};
use crate::error::EngineError;
use crate::focus::{FocusTotals, FocusTracker, Observation};
use crate::ports::{Camera, CameraLease, Clock, TimerKind, TimerSource};
use crate::protocol::{
    self, EndSessionResponse, FormFields, FrameRequest, FrameResponse, SessionForm,
    StartSessionResponse,
};
use crate::summary::SessionSummary;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Active,
    Finalized,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Active => "active",
            SessionPhase::Finalized => "finalized",
        }
    }
}

/// Everything the page needs after a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalization {
    pub summary: SessionSummary,
    pub summary_text: String,
    pub end_session_fields: FormFields,
}

/// Outcome of one countdown timer callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownUpdate {
    pub tick: CountdownTick,
    pub display: String,
    pub finished: Option<Finalization>,
}

/// Live view of the tracker for status rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub phase: SessionPhase,
    pub session_id: Option<SessionId>,
    pub state: FocusState,
    pub totals: FocusTotals,
    pub camera_held: bool,
}

struct ActiveSession {
    session_id: SessionId,
    focus: FocusTracker,
    duration_minutes: u32,
    countdown: Option<Countdown>,
    issued: FrameSeq,
    last_applied: Option<FrameSeq>,
    camera: Option<CameraLease>,
}

enum Phase {
    Idle,
    Active(Box<ActiveSession>),
    Finalized(SessionSummary),
}

pub struct SessionTracker {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    timers: Box<dyn TimerSource>,
    phase: Phase,
}

impl SessionTracker {
    pub fn new(config: EngineConfig, clock: Box<dyn Clock>, timers: Box<dyn TimerSource>) -> Self {
        SessionTracker {
            config,
            clock,
            timers,
            phase: Phase::Idle,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            Phase::Idle => SessionPhase::Idle,
            Phase::Active(_) => SessionPhase::Active,
            Phase::Finalized(_) => SessionPhase::Finalized,
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match &self.phase {
            Phase::Active(active) => Some(active.session_id),
            _ => None,
        }
    }

    /// The summary of the last finalized session, if any.
    pub fn last_summary(&self) -> Option<&SessionSummary> {
        match &self.phase {
            Phase::Finalized(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        match &self.phase {
            Phase::Active(active) => TrackerSnapshot {
                phase: SessionPhase::Active,
                session_id: Some(active.session_id),
                state: active.focus.state(),
                totals: active.focus.totals(),
                camera_held: active.camera.as_ref().is_some_and(CameraLease::is_held),
            },
            _ => TrackerSnapshot {
                phase: self.phase(),
                session_id: None,
                state: FocusState::Unknown,
                totals: FocusTotals::default(),
                camera_held: false,
            },
        }
    }

    fn not_while_active(&self, operation: &'static str) -> Result<(), EngineError> {
        if let Phase::Active(_) = self.phase {
            return Err(EngineError::InvalidState {
                phase: SessionPhase::Active.as_str(),
                operation,
            });
        }
        Ok(())
    }

    fn active_mut(&mut self, operation: &'static str) -> Result<&mut ActiveSession, EngineError> {
        let phase = self.phase();
        match &mut self.phase {
            Phase::Active(active) => Ok(&mut **active),
            _ => Err(EngineError::InvalidState {
                phase: phase.as_str(),
                operation,
            }),
        }
    }

    /// Validate the start form and build the start-session request body.
    pub fn start_request(&self, form: &SessionForm) -> Result<FormFields, EngineError> {
        self.not_while_active("start_request")?;
        form.to_fields()
    }

    /// Log a failed start-session call and return the status line to show.
    /// `status` is the HTTP status for non-success responses, `None` for network errors.
    pub fn start_failed(&self, status: Option<u16>) -> &'static str {
        match status {
            Some(code) => {
                warn!("start-session rejected with status {}", code);
                protocol::START_FAILED_MESSAGE
            }
            None => {
                error!("start-session request failed");
                protocol::SERVER_ERROR_MESSAGE
            }
        }
    }

    /// Enter the active phase with a server-assigned session. Accounting is reset; the
    /// countdown deadline and both timers wait for the camera.
    pub fn activate(
        &mut self,
        duration_minutes: u32,
        response: &StartSessionResponse,
    ) -> Result<(), EngineError> {
        self.not_while_active("activate")?;
        if duration_minutes == 0 {
            return Err(EngineError::InvalidForm(
                "duration_minutes must be a positive number of minutes".to_string(),
            ));
        }

        let threshold_ms = response
            .alert_threshold_ms
            .unwrap_or(self.config.default_alert_threshold_ms);
        let mode = response.alert_mode.unwrap_or(self.config.default_alert_mode);
        let now = self.clock.now();
        self.phase = Phase::Active(Box::new(ActiveSession {
            session_id: response.session_id,
            focus: FocusTracker::started_at(threshold_ms, mode, now),
            duration_minutes,
            countdown: None,
            issued: FrameSeq::default(),
            last_applied: None,
            camera: None,
        }));
        info!(
            "Session {} started: {} min, alert after {} ms via {}",
            response.session_id,
            duration_minutes,
            threshold_ms,
            mode.as_str()
        );
        Ok(())
    }

    /// Take ownership of the acquired camera, fix the countdown deadline and start both
    /// interval timers. A camera that cannot be attached is released before the error returns.
    pub fn attach_camera(&mut self, camera: Box<dyn Camera>) -> Result<(), EngineError> {
        let lease = CameraLease::new(camera);
        let now = self.clock.now();
        let frame_every = self.config.frame_interval_ms;
        let countdown_every = self.config.countdown_interval_ms;

        let active = self.active_mut("attach_camera")?;
        if active.camera.is_some() {
            return Err(EngineError::InvalidState {
                phase: SessionPhase::Active.as_str(),
                operation: "attach_camera",
            });
        }
        active.camera = Some(lease);
        active.countdown = Some(Countdown::start(now, active.duration_minutes));

        self.timers.start(TimerKind::Frame, frame_every);
        self.timers.start(TimerKind::Countdown, countdown_every);
        Ok(())
    }

    /// Abort a session whose camera could not be acquired. The session id is discarded
    /// without any further backend traffic.
    pub fn camera_failed(&mut self, reason: &str) -> EngineError {
        if let Phase::Active(active) = &self.phase {
            error!(
                "Camera unavailable for session {}: {}",
                active.session_id, reason
            );
            self.timers.cancel(TimerKind::Frame);
            self.timers.cancel(TimerKind::Countdown);
            self.phase = Phase::Idle;
        }
        EngineError::CameraUnavailable(reason.to_string())
    }

    /// Issue the next frame request, or `None` when no camera-backed session is running.
    pub fn begin_frame(&mut self) -> Option<FrameRequest> {
        match &mut self.phase {
            Phase::Active(active) if active.camera.is_some() => {
                active.issued = active.issued.next();
                Some(FrameRequest {
                    session_id: active.session_id,
                    seq: active.issued,
                })
            }
            _ => None,
        }
    }

    /// Apply a classification response. Responses older than the last applied one, or for
    /// a sequence this session never issued, are dropped.
    pub fn apply_frame(&mut self, seq: FrameSeq, response: FrameResponse) -> Option<Observation> {
        let now = self.clock.now();
        let Phase::Active(active) = &mut self.phase else {
            debug!("Dropping frame {} outside an active session", seq.as_u64());
            return None;
        };

        if seq > active.issued || active.last_applied.is_some_and(|last| seq <= last) {
            debug!(
                "Dropping stale frame {} (last applied {:?})",
                seq.as_u64(),
                active.last_applied.map(|s| s.as_u64())
            );
            return None;
        }

        active.last_applied = Some(seq);
        let observation = active.focus.observe(response.focused, now);
        if let Some(mode) = observation.alert {
            info!(
                "Unfocused for {} ms or more, alerting via {}",
                active.focus.alert_threshold_ms(),
                mode.as_str()
            );
        }
        Some(observation)
    }

    /// A frame request failed; the classification simply stays as it was.
    pub fn frame_failed(&self, seq: FrameSeq, reason: &str) {
        error!("Frame {} request failed: {}", seq.as_u64(), reason);
    }

    /// Countdown timer callback. Finalizes the session when the deadline passes.
    pub fn tick_countdown(&mut self) -> Option<CountdownUpdate> {
        let now = self.clock.now();
        let tick = match &self.phase {
            Phase::Active(active) => active.countdown?.tick(now),
            _ => return None,
        };

        let finished = if tick.is_expired() {
            self.finalize(false)
        } else {
            None
        };

        Some(CountdownUpdate {
            tick,
            display: tick.display(),
            finished,
        })
    }

    /// Explicit end action.
    pub fn end_early(&mut self) -> Option<Finalization> {
        self.finalize(true)
    }

    /// Stop timers, release the camera, fold the open interval and build the summary.
    /// Returns `None` if no session is active, so a second call is a no-op.
    pub fn finalize(&mut self, ended_early: bool) -> Option<Finalization> {
        let mut active = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Active(active) => active,
            other => {
                self.phase = other;
                return None;
            }
        };

        self.timers.cancel(TimerKind::Frame);
        self.timers.cancel(TimerKind::Countdown);
        if let Some(mut lease) = active.camera.take() {
            lease.release();
        }

        let totals = active.focus.close(self.clock.now());
        let summary = SessionSummary::from_totals(active.session_id, totals, ended_early);
        self.phase = Phase::Finalized(summary);

        info!(
            "Session {} finalized: {} s total, {}% focused, {} breaks, ended early: {}",
            summary.session_id,
            summary.total_seconds,
            summary.focus_percent,
            summary.breaks_count,
            ended_early
        );

        Some(Finalization {
            summary,
            summary_text: summary.text(),
            end_session_fields: protocol::end_session_fields(&summary),
        })
    }

    /// Record the end-session outcome. Failures are logged only; the summary stays shown.
    pub fn end_session_settled(&self, result: Result<EndSessionResponse, EngineError>) {
        match result {
            Ok(response) if response.ok => info!("Session saved"),
            Ok(response) => error!(
                "Backend failed to save session: {}",
                response.error.as_deref().unwrap_or("no reason given")
            ),
            Err(err) => error!("Failed to send session summary to backend: {}", err),
        }
    }
}
