use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use eventdesk_core::{ItemId, ItemKind};
use serde::{Deserialize, Serialize};

use crate::frequency::Frequency;

/// How a scheduler pass treats cursors and eligibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    /// Cursor-driven: each window is delivered once, then the cursor advances.
    #[default]
    Normal,
    /// Re-deliver the most recent complete period for every item, ignoring
    /// publish gates and cursors. Never writes the cursor.
    ForceReplay,
}

/// What the sender is asked to report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportScope {
    Window,
    Replay,
}

impl From<SchedulerMode> for ReportScope {
    fn from(mode: SchedulerMode) -> Self {
        match mode {
            SchedulerMode::Normal => ReportScope::Window,
            SchedulerMode::ForceReplay => ReportScope::Replay,
        }
    }
}

/// Why an item was not delivered this pass. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotDue,
    NotYetOpen,
    Closed,
    FrequencyNone,
    /// Another scheduler invocation holds the item's lease.
    Locked,
    DeadlineReached,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::NotDue => "Not due yet",
            SkipReason::NotYetOpen => "Not yet open",
            SkipReason::Closed => "Closed",
            SkipReason::FrequencyNone => "Frequency set to 'none'",
            SkipReason::Locked => "Locked by another run",
            SkipReason::DeadlineReached => "Run deadline reached",
        };
        f.write_str(s)
    }
}

/// Half-open reporting period `[start_ms, end_ms)` in UTC epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start_ms: i64,
    pub end_ms: i64,
    /// Human label, e.g. `2025-02-01 to 2025-02-28`.
    pub label: String,
    /// Stable bucket id for display and dedup, e.g. `2025-02`, `2025-W11`.
    pub period_id: String,
}

impl Window {
    pub fn start_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.start_ms).single()
    }

    pub fn end_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.end_ms).single()
    }
}

/// Result of asking the window calculator whether an item is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowDecision {
    Due(Window),
    Skip(SkipReason),
}

/// Payload handed to the sender for one item and one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub kind: ItemKind,
    pub id: ItemId,
    pub label: String,
    pub scope: ReportScope,
    pub window: Window,
    /// Configured report recipients; the sender may add its own.
    #[serde(default)]
    pub chair_emails: Vec<String>,
}

/// Recipient summary returned by a successful delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub count: u32,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

/// One operator-facing audit line per item per pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEntry {
    pub id: ItemId,
    pub label: String,
    pub kind: ItemKind,
    pub freq: Option<Frequency>,
    pub period_id: Option<String>,
    pub ok: bool,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub count: u32,
    pub to: Vec<String>,
    pub bcc: Vec<String>,
    pub error: Option<String>,
    pub window_start_utc: Option<String>,
    pub window_end_utc: Option<String>,
    pub window_label: Option<String>,
}

impl RunEntry {
    pub fn new(id: ItemId, label: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            freq: None,
            period_id: None,
            ok: false,
            skipped: false,
            skip_reason: None,
            count: 0,
            to: Vec::new(),
            bcc: Vec::new(),
            error: None,
            window_start_utc: None,
            window_end_utc: None,
            window_label: None,
        }
    }

    pub fn skip(mut self, reason: SkipReason) -> Self {
        self.skipped = true;
        self.skip_reason = Some(reason.to_string());
        self
    }

    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.ok = false;
        self.error = Some(error.into());
        self
    }

    pub fn with_window(mut self, window: &Window) -> Self {
        self.period_id = Some(window.period_id.clone());
        self.window_label = Some(window.label.clone());
        self.window_start_utc = window
            .start_utc()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true));
        self.window_end_utc = window
            .end_utc()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true));
        self
    }

    pub fn delivered(mut self, receipt: DeliveryReceipt) -> Self {
        self.ok = true;
        self.count = receipt.count;
        self.to = receipt.to;
        self.bcc = receipt.bcc;
        self
    }
}

/// Aggregate result of one scheduler pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub sent: u32,
    pub skipped: u32,
    pub errors: u32,
    pub items_log: Vec<RunEntry>,
}

impl RunSummary {
    /// Count the entry under exactly one of sent / skipped / errors.
    pub fn record(&mut self, entry: RunEntry) {
        if entry.skipped {
            self.skipped += 1;
        } else if entry.ok && entry.error.is_none() {
            self.sent += 1;
        } else {
            self.errors += 1;
        }
        self.items_log.push(entry);
    }
}
