// Host capabilities the session tracker depends on: wall clock, interval timers, and the camera.
// Browser implementations live in `host`; tests use the manual fakes below.

use log::info;
use serde::{Deserialize, Serialize};

use crate::types::Millis;

pub trait Clock {
    fn now(&self) -> Millis;
}

/// The two periodic timers a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    Frame,
    Countdown,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::Frame => "frame",
            TimerKind::Countdown => "countdown",
        }
    }
}

pub trait TimerSource {
    /// (Re)start the periodic timer of `kind`. Starting an already running timer replaces it.
    fn start(&mut self, kind: TimerKind, every_ms: u32);
    fn cancel(&mut self, kind: TimerKind);
}

/// An acquired camera stream.
pub trait Camera {
    /// Stop every track of the stream. Called exactly once per acquisition.
    fn release(&mut self);
}

/// Scoped ownership of an acquired camera: released on [`CameraLease::release`] or drop,
/// whichever comes first.
pub struct CameraLease {
    camera: Option<Box<dyn Camera>>,
}

impl CameraLease {
    pub fn new(camera: Box<dyn Camera>) -> Self {
        CameraLease {
            camera: Some(camera),
        }
    }

    pub fn is_held(&self) -> bool {
        self.camera.is_some()
    }

    pub fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.release();
            info!("Camera released");
        }
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CameraLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraLease")
            .field("held", &self.is_held())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::CountingCamera;
    use super::*;

    #[test]
    fn lease_releases_once() {
        let camera = CountingCamera::default();
        let releases = camera.releases.clone();
        let mut lease = CameraLease::new(Box::new(camera));
        assert!(lease.is_held());
        lease.release();
        lease.release();
        drop(lease);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn lease_releases_on_drop() {
        let camera = CountingCamera::default();
        let releases = camera.releases.clone();
        {
            let _lease = CameraLease::new(Box::new(camera));
        }
        assert_eq!(releases.get(), 1);
    }
}
