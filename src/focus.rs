// Focus accounting state machine: attributes wall-clock time to focused/unfocused runs,
// counts breaks, and raises at most one alert per unfocused run.
// See DESIGN.md: Focus State Machine

use serde::{Deserialize, Serialize};

use crate::types::*;

/// Result of feeding one classifier observation into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub state: FocusState,
    pub changed: bool,
    /// Set on the single observation that crossed the alert threshold for this run.
    pub alert: Option<AlertMode>,
}

/// Snapshot of the accumulated totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FocusTotals {
    pub focused_ms: u64,
    pub unfocused_ms: u64,
    pub breaks_count: u32,
}

impl FocusTotals {
    pub fn tracked_ms(&self) -> u64 {
        self.focused_ms + self.unfocused_ms
    }
}

/// Per-session accounting state.
///
/// `last_change` is re-baselined on every observation, so the observation loop
/// doubles as the accounting tick. The interval since the last observation stays
/// open until the next observation or [`FocusTracker::close`].
#[derive(Debug, Clone)]
pub struct FocusTracker {
    state: FocusState,
    last_change: Option<Millis>,
    unfocused_since: Option<Millis>,
    alerted_this_run: bool,
    totals: FocusTotals,
    alert_threshold_ms: u64,
    alert_mode: AlertMode,
}

impl FocusTracker {
    pub fn new(alert_threshold_ms: u64, alert_mode: AlertMode) -> Self {
        FocusTracker {
            state: FocusState::Unknown,
            last_change: None,
            unfocused_since: None,
            alerted_this_run: false,
            totals: FocusTotals::default(),
            alert_threshold_ms,
            alert_mode,
        }
    }

    /// Start tracking with the baseline at `now`. Unknown time is never attributed, so the
    /// first observation still contributes nothing.
    pub fn started_at(alert_threshold_ms: u64, alert_mode: AlertMode, now: Millis) -> Self {
        let mut tracker = Self::new(alert_threshold_ms, alert_mode);
        tracker.last_change = Some(now);
        tracker
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn totals(&self) -> FocusTotals {
        self.totals
    }

    pub fn alert_threshold_ms(&self) -> u64 {
        self.alert_threshold_ms
    }

    /// Feed one "is focused" observation taken at `now`.
    pub fn observe(&mut self, focused: bool, now: Millis) -> Observation {
        self.attribute_open_interval(now);

        let previous = self.state;
        let mut alert = None;

        if focused {
            if previous == FocusState::Unfocused {
                self.totals.breaks_count += 1;
                self.unfocused_since = None;
                self.alerted_this_run = false;
            }
            self.state = FocusState::Focused;
        } else if previous != FocusState::Unfocused {
            self.state = FocusState::Unfocused;
            self.unfocused_since = Some(now);
            self.alerted_this_run = false;
        } else if !self.alerted_this_run {
            if let Some(since) = self.unfocused_since {
                if now.since(since) >= self.alert_threshold_ms {
                    self.alerted_this_run = true;
                    alert = Some(self.alert_mode);
                }
            }
        }

        self.last_change = Some(now);

        Observation {
            state: self.state,
            changed: previous != self.state,
            alert,
        }
    }

    /// Fold the still-open interval into the totals one final time.
    pub fn close(&mut self, now: Millis) -> FocusTotals {
        if self.last_change.is_some() {
            self.attribute_open_interval(now);
            self.last_change = Some(now);
        }
        self.totals
    }

    fn attribute_open_interval(&mut self, now: Millis) {
        let last = *self.last_change.get_or_insert(now);
        let delta = now.since(last);
        match self.state {
            FocusState::Focused => self.totals.focused_ms += delta,
            FocusState::Unfocused => self.totals.unfocused_ms += delta,
            FocusState::Unknown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(ms: u64) -> Millis {
        Millis::from_millis(ms)
    }

    #[test]
    fn first_observation_attributes_nothing() {
        let mut tracker = FocusTracker::new(2500, AlertMode::Popup);
        let obs = tracker.observe(true, at(10_000));
        assert_eq!(obs.state, FocusState::Focused);
        assert!(obs.changed);
        assert_eq!(tracker.totals().tracked_ms(), 0);
    }

    #[test]
    fn unknown_state_accumulates_nothing() {
        let mut tracker = FocusTracker::started_at(2500, AlertMode::Popup, at(0));
        tracker.observe(false, at(5_000));
        let totals = tracker.totals();
        assert_eq!(totals.focused_ms, 0);
        assert_eq!(totals.unfocused_ms, 0);
    }

    #[test]
    fn break_scenario_with_half_second_polling() {
        let mut tracker = FocusTracker::new(2500, AlertMode::Both);
        let mut alerts = Vec::new();

        tracker.observe(true, at(0));
        for t in (1000..4000).step_by(500) {
            let obs = tracker.observe(false, at(t));
            if obs.alert.is_some() {
                alerts.push(t);
            }
        }
        let last = tracker.observe(true, at(4000));

        assert_eq!(alerts, vec![3500]);
        assert!(last.alert.is_none());
        let totals = tracker.totals();
        assert_eq!(totals.breaks_count, 1);
        assert_eq!(totals.unfocused_ms, 3000);
        assert_eq!(totals.focused_ms, 1000);
    }

    #[test]
    fn sparse_break_scenario_counts_break_without_alert() {
        let mut tracker = FocusTracker::new(2500, AlertMode::Popup);
        tracker.observe(true, at(0));
        tracker.observe(false, at(1000));
        let obs = tracker.observe(true, at(4000));
        assert!(obs.alert.is_none());
        let totals = tracker.totals();
        assert_eq!(totals.breaks_count, 1);
        assert_eq!(totals.unfocused_ms, 3000);
        assert_eq!(totals.focused_ms, 1000);
    }

    #[test]
    fn alert_threshold_is_inclusive() {
        let mut exact = FocusTracker::new(2500, AlertMode::Sound);
        exact.observe(false, at(1000));
        assert_eq!(exact.observe(false, at(3500)).alert, Some(AlertMode::Sound));

        let mut short = FocusTracker::new(2500, AlertMode::Sound);
        short.observe(false, at(1000));
        assert_eq!(short.observe(false, at(3499)).alert, None);
    }

    #[test]
    fn only_one_alert_per_run() {
        let mut tracker = FocusTracker::new(1000, AlertMode::Popup);
        tracker.observe(false, at(0));
        let fired: usize = (1..20)
            .map(|i| tracker.observe(false, at(i * 500)))
            .filter(|o| o.alert.is_some())
            .count();
        assert_eq!(fired, 1);

        // A new run re-arms the alert.
        tracker.observe(true, at(10_000));
        tracker.observe(false, at(10_500));
        assert!(tracker.observe(false, at(11_500)).alert.is_some());
    }

    #[test]
    fn unknown_to_focused_is_not_a_break() {
        let mut tracker = FocusTracker::new(2500, AlertMode::Popup);
        tracker.observe(true, at(0));
        tracker.observe(true, at(500));
        assert_eq!(tracker.totals().breaks_count, 0);
    }

    #[test]
    fn close_folds_open_interval_once() {
        let mut tracker = FocusTracker::new(2500, AlertMode::Popup);
        tracker.observe(true, at(0));
        let totals = tracker.close(at(1500));
        assert_eq!(totals.focused_ms, 1500);
        assert_eq!(tracker.close(at(1500)).focused_ms, 1500);
    }

    #[test]
    fn close_without_observations_is_zero() {
        let mut tracker = FocusTracker::new(2500, AlertMode::Popup);
        assert_eq!(tracker.close(at(9_000)), FocusTotals::default());
    }

    #[test]
    fn backwards_clock_attributes_nothing() {
        let mut tracker = FocusTracker::new(2500, AlertMode::Popup);
        tracker.observe(true, at(5_000));
        tracker.observe(true, at(4_000));
        assert_eq!(tracker.totals().focused_ms, 0);
    }

    // =========================================================================
    // Property-Based Tests
    // =========================================================================

    fn observations_strategy() -> impl Strategy<Value = Vec<(u64, bool)>> {
        prop::collection::vec((0u64..2_000, any::<bool>()), 0..60)
    }

    proptest! {
        /// Tracked time equals the sum of inter-observation deltas that follow a
        /// known state; nothing before the first observation is counted.
        #[test]
        fn totals_equal_attributed_deltas(steps in observations_strategy()) {
            let mut tracker = FocusTracker::new(2500, AlertMode::Popup);
            let mut now = 1_000_000u64;
            let mut expected = 0u64;
            let mut prev_known = false;

            for (i, (gap, focused)) in steps.iter().enumerate() {
                if i > 0 {
                    now += gap;
                    if prev_known {
                        expected += gap;
                    }
                }
                tracker.observe(*focused, Millis::from_millis(now));
                prev_known = true;
            }

            prop_assert_eq!(tracker.totals().tracked_ms(), expected);
        }

        /// Breaks equal the number of unfocused -> focused adjacencies.
        #[test]
        fn breaks_count_matches_transitions(steps in observations_strategy()) {
            let mut tracker = FocusTracker::new(2500, AlertMode::Popup);
            let mut now = 0u64;
            for (gap, focused) in &steps {
                now += gap;
                tracker.observe(*focused, Millis::from_millis(now));
            }

            let expected = steps
                .windows(2)
                .filter(|w| !w[0].1 && w[1].1)
                .count() as u32;
            prop_assert_eq!(tracker.totals().breaks_count, expected);
        }

        /// At most one alert per unfocused run, never before the threshold.
        #[test]
        fn alerts_are_single_and_late_enough(
            steps in observations_strategy(),
            threshold in 0u64..5_000,
        ) {
            let mut tracker = FocusTracker::new(threshold, AlertMode::Popup);
            let mut now = 0u64;
            let mut run_start: Option<u64> = None;
            let mut alerts_in_run = 0;

            for (gap, focused) in &steps {
                now += gap;
                let obs = tracker.observe(*focused, Millis::from_millis(now));
                if *focused {
                    run_start = None;
                    alerts_in_run = 0;
                } else if run_start.is_none() {
                    run_start = Some(now);
                }
                if obs.alert.is_some() {
                    alerts_in_run += 1;
                    let start = run_start.unwrap();
                    prop_assert!(now - start >= threshold);
                }
                prop_assert!(alerts_in_run <= 1);
            }
        }
    }
}
