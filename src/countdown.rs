// Countdown against a fixed deadline. Remaining time is recomputed from the deadline on
// every tick, so interval jitter never accumulates.

use serde::{Deserialize, Serialize};

use crate::types::Millis;

const MS_PER_MINUTE: u64 = 60_000;

/// What the countdown display should show after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CountdownTick {
    Running { remaining_secs: u64 },
    Expired,
}

impl CountdownTick {
    pub fn is_expired(&self) -> bool {
        matches!(self, CountdownTick::Expired)
    }

    /// `"Time left: M:SS"`.
    pub fn display(&self) -> String {
        let secs = match self {
            CountdownTick::Running { remaining_secs } => *remaining_secs,
            CountdownTick::Expired => 0,
        };
        format!("Time left: {}:{:02}", secs / 60, secs % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    deadline: Millis,
}

impl Countdown {
    pub fn start(now: Millis, duration_minutes: u32) -> Self {
        Countdown {
            deadline: now.plus(u64::from(duration_minutes) * MS_PER_MINUTE),
        }
    }

    pub fn deadline(&self) -> Millis {
        self.deadline
    }

    pub fn tick(&self, now: Millis) -> CountdownTick {
        let remaining_ms = self.deadline.since(now);
        if remaining_ms == 0 {
            CountdownTick::Expired
        } else {
            CountdownTick::Running {
                remaining_secs: remaining_ms / 1000,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_fixed_at_start() {
        let countdown = Countdown::start(Millis::from_millis(1_000), 25);
        assert_eq!(countdown.deadline().as_millis(), 1_000 + 25 * 60_000);
    }

    #[test]
    fn remaining_is_floored_to_whole_seconds() {
        let countdown = Countdown::start(Millis::from_millis(0), 1);
        let tick = countdown.tick(Millis::from_millis(1_400));
        assert_eq!(tick, CountdownTick::Running { remaining_secs: 58 });
        assert_eq!(tick.display(), "Time left: 0:58");
    }

    #[test]
    fn jittered_ticks_track_the_deadline() {
        let countdown = Countdown::start(Millis::from_millis(0), 2);
        // Late tick still reports from the deadline, not from the previous tick.
        let tick = countdown.tick(Millis::from_millis(61_950));
        assert_eq!(tick, CountdownTick::Running { remaining_secs: 58 });
        assert_eq!(tick.display(), "Time left: 0:58");
        assert_eq!(
            countdown.tick(Millis::from_millis(1_000)).display(),
            "Time left: 1:59"
        );
    }

    #[test]
    fn expires_at_and_after_deadline() {
        let countdown = Countdown::start(Millis::from_millis(0), 1);
        assert!(countdown.tick(Millis::from_millis(60_000)).is_expired());
        assert!(countdown.tick(Millis::from_millis(90_000)).is_expired());
        assert_eq!(CountdownTick::Expired.display(), "Time left: 0:00");
    }

    #[test]
    fn zero_duration_expires_immediately() {
        let countdown = Countdown::start(Millis::from_millis(500), 0);
        assert!(countdown.tick(Millis::from_millis(500)).is_expired());
    }
}
