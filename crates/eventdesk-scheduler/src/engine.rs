use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use eventdesk_core::config::{SchedulerConfig, DEFAULT_LEASE_TTL_SECS, DEFAULT_RUN_DEADLINE_SECS};
use eventdesk_core::{CatalogItem, ItemConfig, ItemId};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    catalog::{ItemCatalog, ItemConfigStore},
    cursor::{lease_key, Cursor, CursorStore},
    error::{Result, SchedulerError},
    frequency::{normalize_frequency, Frequency},
    retry::{DeliveryRetrier, RetryOutcome},
    sender::ReportSender,
    types::{DeliveryRequest, RunEntry, RunSummary, SchedulerMode, SkipReason, WindowDecision},
    window::{compute_window, replay_window},
};

/// Assembles a [`Scheduler`] from its collaborators.
///
/// Catalog sources are consulted in the order they were added.
pub struct SchedulerBuilder {
    catalogs: Vec<Arc<dyn ItemCatalog>>,
    config_store: Option<Arc<dyn ItemConfigStore>>,
    cursor_store: Option<Arc<dyn CursorStore>>,
    sender: Option<Arc<dyn ReportSender>>,
    retrier: DeliveryRetrier,
    lease_ttl: Duration,
    run_deadline: Option<Duration>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self {
            catalogs: Vec::new(),
            config_store: None,
            cursor_store: None,
            sender: None,
            retrier: DeliveryRetrier::default(),
            lease_ttl: Duration::from_secs(DEFAULT_LEASE_TTL_SECS),
            run_deadline: Some(Duration::from_secs(DEFAULT_RUN_DEADLINE_SECS)),
        }
    }
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(mut self, catalog: Arc<dyn ItemCatalog>) -> Self {
        self.catalogs.push(catalog);
        self
    }

    pub fn config_store(mut self, store: Arc<dyn ItemConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn cursor_store(mut self, store: Arc<dyn CursorStore>) -> Self {
        self.cursor_store = Some(store);
        self
    }

    pub fn sender(mut self, sender: Arc<dyn ReportSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn retrier(mut self, retrier: DeliveryRetrier) -> Self {
        self.retrier = retrier;
        self
    }

    pub fn lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Whole-pass budget; `None` lets a pass run unbounded.
    pub fn run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.run_deadline = deadline;
        self
    }

    /// Apply retry schedule, lease TTL and deadline from `[scheduler]`.
    pub fn with_config(self, config: &SchedulerConfig) -> Self {
        self.retrier(DeliveryRetrier::from_millis(&config.retry_delays_ms))
            .lease_ttl(Duration::from_secs(config.lease_ttl_secs))
            .run_deadline(Some(Duration::from_secs(config.run_deadline_secs)))
    }

    /// Fails when a required collaborator is missing. This is the only
    /// fatal condition; everything after is isolated per item.
    pub fn build(self) -> Result<Scheduler> {
        let sender = self
            .sender
            .ok_or(SchedulerError::MissingCollaborator("sender"))?;
        let cursors = self
            .cursor_store
            .ok_or(SchedulerError::MissingCollaborator("cursor store"))?;
        let config_store = self
            .config_store
            .ok_or(SchedulerError::MissingCollaborator("item config store"))?;
        if self.catalogs.is_empty() {
            return Err(SchedulerError::MissingCollaborator("item catalog"));
        }
        Ok(Scheduler {
            catalogs: self.catalogs,
            config_store,
            cursors,
            sender,
            retrier: self.retrier,
            lease_ttl: self.lease_ttl,
            run_deadline: self.run_deadline,
        })
    }
}

/// Drives one report pass over the whole catalog per invocation.
///
/// Items are processed sequentially. Each item is guarded by a lease in the
/// cursor store, so overlapping passes never deliver the same window twice.
pub struct Scheduler {
    catalogs: Vec<Arc<dyn ItemCatalog>>,
    config_store: Arc<dyn ItemConfigStore>,
    cursors: Arc<dyn CursorStore>,
    sender: Arc<dyn ReportSender>,
    retrier: DeliveryRetrier,
    lease_ttl: Duration,
    run_deadline: Option<Duration>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Run one pass using the current wall-clock time.
    pub async fn run_now(&self, mode: SchedulerMode) -> RunSummary {
        self.run(Utc::now(), mode).await
    }

    /// Run one pass as of `now`.
    ///
    /// Never fails as a whole: per-item failures are recorded in the
    /// returned summary and the pass moves on.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, now: DateTime<Utc>, mode: SchedulerMode) -> RunSummary {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        let deadline = self.run_deadline.map(|d| Instant::now() + d);
        info!(%now, ?mode, "report pass starting");

        let mut summary = RunSummary::default();
        let items = self.collect_items(&mut summary).await;

        for item in items {
            let entry = match deadline {
                Some(at) if Instant::now() >= at => {
                    RunEntry::new(item.id.clone(), item.label.clone(), item.kind)
                        .skip(SkipReason::DeadlineReached)
                }
                _ => self.process_isolated(&item, now, mode, &run_id, deadline).await,
            };
            log_entry(&entry);
            summary.record(entry);
        }

        info!(
            sent = summary.sent,
            skipped = summary.skipped,
            errors = summary.errors,
            "report pass finished"
        );
        summary
    }

    /// Merge all catalog sources, keeping the first occurrence of each id
    /// and dropping archived or inactive items.
    async fn collect_items(&self, summary: &mut RunSummary) -> Vec<CatalogItem> {
        let mut seen: HashSet<ItemId> = HashSet::new();
        let mut items = Vec::new();

        for catalog in &self.catalogs {
            match catalog.list_items().await {
                Ok(listed) => {
                    for item in listed {
                        if !seen.insert(item.id.clone()) {
                            debug!(item_id = %item.id, source = catalog.source_name(), "duplicate item ignored");
                            continue;
                        }
                        if item.is_reportable() {
                            items.push(item);
                        }
                    }
                }
                Err(e) => {
                    error!(source = catalog.source_name(), error = %e, "catalog source failed");
                    summary.errors += 1;
                }
            }
        }
        items
    }

    /// Process one item, turning a panic in any collaborator into a failed
    /// entry so the rest of the pass still runs.
    async fn process_isolated(
        &self,
        item: &CatalogItem,
        now: DateTime<Utc>,
        mode: SchedulerMode,
        run_id: &str,
        deadline: Option<Instant>,
    ) -> RunEntry {
        let processed = AssertUnwindSafe(self.process_item(item, now, mode, run_id, deadline))
            .catch_unwind()
            .await;
        match processed {
            Ok(entry) => entry,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(item_id = %item.id, panic = %msg, "report item panicked");
                self.release_lease(&item.id, run_id).await;
                RunEntry::new(item.id.clone(), item.label.clone(), item.kind)
                    .fail(format!("panic: {msg}"))
            }
        }
    }

    async fn process_item(
        &self,
        item: &CatalogItem,
        now: DateTime<Utc>,
        mode: SchedulerMode,
        run_id: &str,
        deadline: Option<Instant>,
    ) -> RunEntry {
        let config = match self.config_store.load_config(&item.id).await {
            Ok(config) => config,
            Err(e) => {
                return RunEntry::new(item.id.clone(), item.label.clone(), item.kind)
                    .fail(format!("config load failed: {e}"))
            }
        };

        let label = config
            .label
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| item.label.clone());
        let freq = normalize_frequency(&config.frequency);
        let mut entry = RunEntry::new(item.id.clone(), label.clone(), item.kind);
        entry.freq = Some(freq);

        if mode == SchedulerMode::Normal {
            if config.publish_start.is_some_and(|start| now < start) {
                return entry.skip(SkipReason::NotYetOpen);
            }
            if config.publish_end.is_some_and(|end| now >= end) {
                return entry.skip(SkipReason::Closed);
            }
        }
        if freq == Frequency::None {
            return entry.skip(SkipReason::FrequencyNone);
        }

        match self
            .cursors
            .set_if_absent(&lease_key(&item.id), run_id, self.lease_ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => return entry.skip(SkipReason::Locked),
            Err(e) => return entry.fail(format!("lease acquire failed: {e}")),
        }

        let entry = self
            .deliver_leased(entry, item, &config, label, freq, now, mode, deadline)
            .await;
        self.release_lease(&item.id, run_id).await;
        entry
    }

    #[allow(clippy::too_many_arguments)]
    async fn deliver_leased(
        &self,
        entry: RunEntry,
        item: &CatalogItem,
        config: &ItemConfig,
        label: String,
        freq: Frequency,
        now: DateTime<Utc>,
        mode: SchedulerMode,
        deadline: Option<Instant>,
    ) -> RunEntry {
        let decision = match mode {
            SchedulerMode::Normal => match Cursor::load(self.cursors.as_ref(), &item.id).await {
                Ok(cursor) => compute_window(freq, now, &cursor),
                Err(e) => return entry.fail(format!("cursor load failed: {e}")),
            },
            SchedulerMode::ForceReplay => replay_window(freq, now),
        };
        let window = match decision {
            WindowDecision::Due(window) => window,
            WindowDecision::Skip(reason) => return entry.skip(reason),
        };

        let entry = entry.with_window(&window);
        let request = DeliveryRequest {
            kind: item.kind,
            id: item.id.clone(),
            label,
            scope: mode.into(),
            window,
            chair_emails: config.chair_emails.clone(),
        };

        let sender = self.sender.as_ref();
        let req = &request;
        let delivery = self.retrier.run(move |attempt| {
            debug!(item_id = %req.id, attempt, "delivering report");
            sender.send(req)
        });
        // The deadline bounds the delivery only, never the cursor commit.
        let outcome = match deadline {
            Some(at) => match tokio::time::timeout_at(at, delivery).await {
                Ok(outcome) => outcome,
                Err(_) => return entry.fail("run deadline reached during delivery"),
            },
            None => delivery.await,
        };

        match outcome {
            RetryOutcome::Delivered { result, .. } => {
                let entry = entry.delivered(result);
                if mode == SchedulerMode::ForceReplay {
                    return entry;
                }
                match Cursor::commit(self.cursors.as_ref(), &item.id, request.window.end_ms, now)
                    .await
                {
                    Ok(()) => entry,
                    Err(e) => {
                        // The window end is written last, so it has not
                        // advanced and the next pass sends this window again.
                        error!(item_id = %item.id, error = %e, "cursor commit failed after delivery");
                        entry.fail(format!("delivered but cursor commit failed: {e}"))
                    }
                }
            }
            RetryOutcome::Exhausted { attempts, error } => {
                entry.fail(format!("{error} (after {attempts} attempt(s))"))
            }
        }
    }

    async fn release_lease(&self, id: &ItemId, run_id: &str) {
        if let Err(e) = self.cursors.delete_if_equals(&lease_key(id), run_id).await {
            // The lease expires on its own after the TTL.
            warn!(item_id = %id, error = %e, "failed to release lease");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn log_entry(entry: &RunEntry) {
    let freq = entry.freq.map(|f| f.as_str()).unwrap_or("-");
    let period_id = entry.period_id.as_deref().unwrap_or("-");
    if let Some(err) = &entry.error {
        warn!(
            item_id = %entry.id,
            kind = %entry.kind,
            freq,
            period_id,
            error = %err,
            "report item failed"
        );
    } else if entry.skipped {
        info!(
            item_id = %entry.id,
            kind = %entry.kind,
            freq,
            reason = entry.skip_reason.as_deref().unwrap_or(""),
            "report item skipped"
        );
    } else {
        info!(
            item_id = %entry.id,
            kind = %entry.kind,
            freq,
            period_id,
            window = entry.window_label.as_deref().unwrap_or(""),
            count = entry.count,
            "report delivered"
        );
    }
}
