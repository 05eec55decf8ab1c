// History viewer: range filtering, summary statistics, and the chart series for past sessions.
// Records arrive pre-loaded from the server; nothing here mutates them.
// See DESIGN.md: History Filter & Statistics

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use wasm_bindgen::prelude::*;

use crate::error::EngineError;
use crate::types::Millis;

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// One past session as supplied by the server. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
    /// `None` when absent or not a number.
    #[serde(default, deserialize_with = "lenient_number")]
    pub focus_percent: Option<f64>,
    /// `None` when absent, not a number, or not positive.
    #[serde(default, deserialize_with = "lenient_positive")]
    pub duration_minutes: Option<f64>,
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(serde_json::Value::deserialize(d)?
        .as_f64()
        .filter(|v| v.is_finite()))
}

fn lenient_positive<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(lenient_number(d)?.filter(|v| *v > 0.0))
}

impl SessionRecord {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    pub fn short_date(&self) -> String {
        format_date_short(self.created_at.as_deref())
    }
}

/// Parse a session timestamp: RFC 3339, naive ISO datetime (taken as UTC), or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `YYYY-MM-DD` in UTC; the raw value when it cannot be parsed.
pub fn format_date_short(raw: Option<&str>) -> String {
    match raw.and_then(parse_timestamp) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => raw.unwrap_or_default().to_string(),
    }
}

/// `Math.round` semantics (halves round towards positive infinity).
fn js_round(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRange {
    All,
    Last7Days,
    Last30Days,
}

impl HistoryRange {
    /// Map a filter button key. `"all"` and `"7"` are explicit; anything else is 30 days.
    pub fn from_key(key: &str) -> HistoryRange {
        match key.trim() {
            "all" => HistoryRange::All,
            "7" => HistoryRange::Last7Days,
            _ => HistoryRange::Last30Days,
        }
    }

    pub fn days(&self) -> Option<u64> {
        match self {
            HistoryRange::All => None,
            HistoryRange::Last7Days => Some(7),
            HistoryRange::Last30Days => Some(30),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryRange::All => "all loaded sessions",
            HistoryRange::Last7Days => "last 7 days",
            HistoryRange::Last30Days => "last 30 days",
        }
    }
}

/// Records inside `range` as of `now`. Unparseable timestamps only survive `All`.
pub fn filter_sessions(records: &[SessionRecord], range: HistoryRange, now: Millis) -> Vec<SessionRecord> {
    let Some(days) = range.days() else {
        return records.to_vec();
    };
    let cutoff_ms = now.minus(days * MS_PER_DAY).as_millis() as i64;

    records
        .iter()
        .filter(|record| {
            record
                .timestamp()
                .is_some_and(|ts| ts.timestamp_millis() >= cutoff_ms)
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryStats {
    pub average_focus: Option<i64>,
    pub best: Option<SessionRecord>,
}

impl HistoryStats {
    pub fn is_empty(&self) -> bool {
        self.average_focus.is_none() && self.best.is_none()
    }
}

/// Mean focus (rounded) and the best session over records with a valid focus percentage.
/// Ties for best keep the first occurrence.
pub fn compute_stats(records: &[SessionRecord]) -> HistoryStats {
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut best: Option<(&SessionRecord, f64)> = None;

    for record in records {
        let Some(fp) = record.focus_percent else {
            continue;
        };
        sum += fp;
        count += 1;
        if best.map_or(true, |(_, best_fp)| fp > best_fp) {
            best = Some((record, fp));
        }
    }

    if count == 0 {
        return HistoryStats::default();
    }

    HistoryStats {
        average_focus: Some(js_round(sum / count as f64)),
        best: best.map(|(record, _)| record.clone()),
    }
}

/// One point of the focus line chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// 1-based position, oldest first.
    pub index: usize,
    pub date: String,
    /// Missing values plot as 0.
    pub focus_percent: f64,
    pub duration_minutes: Option<f64>,
}

impl SeriesPoint {
    pub fn tooltip(&self) -> String {
        let duration = self
            .duration_minutes
            .map(|d| format!(", {} min", d))
            .unwrap_or_default();
        format!(
            "Session on {}: {} percent{}",
            self.date, self.focus_percent, duration
        )
    }
}

/// Oldest-first chart points. Records without a parseable timestamp come first, in input order.
pub fn build_series(records: &[SessionRecord]) -> Vec<SeriesPoint> {
    let mut ordered: Vec<(Option<i64>, &SessionRecord)> = records
        .iter()
        .map(|record| (record.timestamp().map(|ts| ts.timestamp_millis()), record))
        .collect();
    ordered.sort_by_key(|(ts, _)| *ts);

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (_, record))| SeriesPoint {
            index: i + 1,
            date: record.short_date(),
            focus_percent: record.focus_percent.unwrap_or(0.0),
            duration_minutes: record.duration_minutes,
        })
        .collect()
}

/// Everything the history page renders for one range selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryView {
    pub range: HistoryRange,
    pub session_count: usize,
    pub range_text: String,
    pub average_text: String,
    pub best_text: String,
    pub stats: HistoryStats,
    pub series: Vec<SeriesPoint>,
    pub tooltips: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryViewer {
    records: Vec<SessionRecord>,
}

impl HistoryViewer {
    pub fn new(records: Vec<SessionRecord>) -> Self {
        HistoryViewer { records }
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let records: Vec<SessionRecord> = serde_json::from_str(json)?;
        Ok(HistoryViewer::new(records))
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }

    pub fn apply(&self, range: HistoryRange, now: Millis) -> HistoryView {
        let filtered = filter_sessions(&self.records, range, now);
        let series = build_series(&filtered);
        let tooltips = series.iter().map(SeriesPoint::tooltip).collect();

        if filtered.is_empty() {
            return HistoryView {
                range,
                session_count: 0,
                range_text: format!(
                    "Showing stats for: {} (no sessions in this range)",
                    range.label()
                ),
                average_text: "Average focus: n/a".to_string(),
                best_text: "Best session: n/a".to_string(),
                stats: HistoryStats::default(),
                series,
                tooltips,
            };
        }

        let stats = compute_stats(&filtered);
        let average_text = match stats.average_focus {
            Some(avg) => format!("Average focus: {} percent", avg),
            None => "Average focus: n/a".to_string(),
        };
        let best_text = match &stats.best {
            Some(best) => format!(
                "Best session: {} percent on {} (duration {} min)",
                best.focus_percent.unwrap_or(0.0),
                best.short_date(),
                best.duration_minutes
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "?".to_string())
            ),
            None => "Best session: n/a".to_string(),
        };

        HistoryView {
            range,
            session_count: filtered.len(),
            range_text: format!(
                "Showing stats for: {} ({} sessions)",
                range.label(),
                filtered.len()
            ),
            average_text,
            best_text,
            stats,
            series,
            tooltips,
        }
    }
}

/// WASM-exposed history viewer.
///
/// Constructed once from the server-rendered `sessionsData` array; each filter
/// button click is a single `apply_range` call returning the full view as JSON.
#[wasm_bindgen]
pub struct WasmHistoryViewer {
    inner: HistoryViewer,
}

#[wasm_bindgen]
impl WasmHistoryViewer {
    /// Create a viewer from a JSON array of session records.
    #[wasm_bindgen(constructor)]
    pub fn new(sessions_json: &str) -> Result<WasmHistoryViewer, JsValue> {
        let inner = HistoryViewer::from_json(sessions_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid sessions data: {}", e)))?;
        Ok(WasmHistoryViewer { inner })
    }

    /// Number of loaded records.
    #[wasm_bindgen]
    pub fn len(&self) -> usize {
        self.inner.records().len()
    }

    #[wasm_bindgen]
    pub fn is_empty(&self) -> bool {
        self.inner.records().is_empty()
    }

    /// Filter by range key (`"all"`, `"7"`, `"30"`) as of `now_ms` and return the view JSON.
    #[wasm_bindgen]
    pub fn apply_range(&self, range_key: &str, now_ms: f64) -> Result<String, JsValue> {
        let view = self
            .inner
            .apply(HistoryRange::from_key(range_key), Millis::from_js(now_ms));
        serde_json::to_string(&view)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
