// End-of-session summary: rounds the accumulated totals and renders the summary line.
// See DESIGN.md: Session Summary Finalization

use serde::{Deserialize, Serialize};

use crate::focus::FocusTotals;
use crate::types::{round_to_u64, SessionId};

/// Finalized record shown to the user and posted to end-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub total_seconds: u64,
    pub focused_seconds: u64,
    pub unfocused_seconds: u64,
    pub breaks_count: u32,
    pub focus_percent: u64,
    pub ended_early: bool,
}

impl SessionSummary {
    /// Each of the three second counts is rounded independently from milliseconds,
    /// so `focused + unfocused` may differ from `total` by one.
    pub fn from_totals(session_id: SessionId, totals: FocusTotals, ended_early: bool) -> Self {
        let total_seconds = round_to_u64(totals.tracked_ms() as f64 / 1000.0);
        let focused_seconds = round_to_u64(totals.focused_ms as f64 / 1000.0);
        let unfocused_seconds = round_to_u64(totals.unfocused_ms as f64 / 1000.0);
        let focus_percent = if total_seconds > 0 {
            round_to_u64(focused_seconds as f64 / total_seconds as f64 * 100.0)
        } else {
            0
        };

        SessionSummary {
            session_id,
            total_seconds,
            focused_seconds,
            unfocused_seconds,
            breaks_count: totals.breaks_count,
            focus_percent,
            ended_early,
        }
    }

    pub fn text(&self) -> String {
        let prefix = if self.ended_early {
            "Session ended early. "
        } else {
            "Session completed. "
        };
        format!(
            "{}Total time: {} seconds. Focused: {} seconds. Unfocused: {} seconds. \
             Focus percentage: {}%. Breaks: {}.",
            prefix,
            self.total_seconds,
            self.focused_seconds,
            self.unfocused_seconds,
            self.focus_percent,
            self.breaks_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(focused_ms: u64, unfocused_ms: u64, breaks_count: u32) -> FocusTotals {
        FocusTotals {
            focused_ms,
            unfocused_ms,
            breaks_count,
        }
    }

    #[test]
    fn zero_time_has_zero_percent() {
        let summary = SessionSummary::from_totals(SessionId::new(1), totals(0, 0, 0), true);
        assert_eq!(summary.total_seconds, 0);
        assert_eq!(summary.focus_percent, 0);
    }

    #[test]
    fn percent_uses_rounded_seconds() {
        let summary = SessionSummary::from_totals(SessionId::new(7), totals(240_000, 60_000, 3), false);
        assert_eq!(summary.total_seconds, 300);
        assert_eq!(summary.focused_seconds, 240);
        assert_eq!(summary.unfocused_seconds, 60);
        assert_eq!(summary.focus_percent, 80);
        assert_eq!(summary.breaks_count, 3);
    }

    #[test]
    fn independent_rounding_can_disagree_by_one() {
        // 1.5s + 1.5s = 3s total, but each part rounds up to 2s.
        let summary = SessionSummary::from_totals(SessionId::new(1), totals(1_500, 1_500, 0), false);
        assert_eq!(summary.total_seconds, 3);
        assert_eq!(summary.focused_seconds + summary.unfocused_seconds, 4);
        assert_eq!(summary.focus_percent, 67);
    }

    #[test]
    fn summary_text_reflects_how_session_ended() {
        let early = SessionSummary::from_totals(SessionId::new(1), totals(1_000, 0, 0), true);
        assert_eq!(
            early.text(),
            "Session ended early. Total time: 1 seconds. Focused: 1 seconds. \
             Unfocused: 0 seconds. Focus percentage: 100%. Breaks: 0."
        );
        let done = SessionSummary { ended_early: false, ..early };
        assert!(done.text().starts_with("Session completed. "));
    }
}
