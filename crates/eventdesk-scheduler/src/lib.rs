//! `eventdesk-scheduler`: cron-triggered report delivery with durable cursors.
//!
//! # Overview
//!
//! An external trigger calls [`engine::Scheduler::run`]. The scheduler walks
//! every catalog item once, computes the next due calendar window from the
//! item's persisted cursor, delivers the report through the retrying
//! [`sender::ReportSender`], and only then advances the cursor. Windows are
//! derived from the cursor rather than from wall-clock time, so a failed
//! delivery is simply recomputed and retried on the next pass.
//!
//! # Frequencies
//!
//! | Frequency  | Window                                                  |
//! |------------|---------------------------------------------------------|
//! | `daily`    | `[cursor or yesterday, today)`, at most once per UTC day |
//! | `weekly`   | `[cursor or previous Monday, this Monday)`              |
//! | `biweekly` | month halves: days 1-15 and 16-end, due once closed      |
//! | `monthly`  | `[cursor or previous month, this month)`                |
//! | `none`     | never sent automatically                                |

pub mod catalog;
pub mod cursor;
pub mod db;
pub mod engine;
pub mod error;
pub mod frequency;
pub mod memory;
pub mod retry;
pub mod sender;
pub mod sqlite;
pub mod types;
pub mod window;

pub use catalog::{ItemCatalog, ItemConfigStore};
pub use cursor::{Cursor, CursorStore};
pub use engine::{Scheduler, SchedulerBuilder};
pub use error::{DeliveryError, Result, SchedulerError};
pub use frequency::{normalize_frequency, Frequency};
pub use memory::MemoryCursorStore;
pub use retry::{DeliveryRetrier, RetryOutcome};
pub use sender::{ReportSender, WebhookSender};
pub use sqlite::{SqliteCatalog, SqliteCursorStore};
pub use types::{
    DeliveryReceipt, DeliveryRequest, ReportScope, RunEntry, RunSummary, SchedulerMode,
    SkipReason, Window, WindowDecision,
};
