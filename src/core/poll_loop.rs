use crate::core::differ;
use crate::core::dispatcher::NotificationDispatcher;
use crate::core::message::MessageFormatter;
use crate::domain::model::{NotifiedSet, Snapshot};
use crate::domain::ports::{Clock, SiteAdapter, SnapshotStore};
use crate::utils::error::Result;
use chrono::{Days, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Diffing,
    Dispatching,
    Persisting,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    FetchFailed,
    NoNewSlots,
    Notified { count: usize },
    DispatchFailed { count: usize },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub scan_days: u32,
    /// 0 = 不限次數
    pub max_cycles: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            scan_days: 3,
            max_cycles: 0,
        }
    }
}

fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// 等到收到停止訊號；發送端被丟棄代表永遠不會停止
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// 單一場地的輪詢迴圈：抓取 → 比對 → 通知 → 保存，一輪做完才開始下一輪
pub struct PollLoop<A: SiteAdapter, S: SnapshotStore> {
    facility: String,
    adapter: A,
    store: S,
    dispatcher: NotificationDispatcher,
    formatter: MessageFormatter,
    clock: Arc<dyn Clock>,
    settings: PollSettings,
    notified: NotifiedSet,
    state: PollState,
    loaded: bool,
}

impl<A: SiteAdapter, S: SnapshotStore> PollLoop<A, S> {
    pub fn new(
        adapter: A,
        store: S,
        dispatcher: NotificationDispatcher,
        formatter: MessageFormatter,
        clock: Arc<dyn Clock>,
        settings: PollSettings,
    ) -> Self {
        Self {
            facility: formatter.facility().to_string(),
            adapter,
            store,
            dispatcher,
            formatter,
            clock,
            settings,
            notified: NotifiedSet::new(),
            state: PollState::Idle,
            loaded: false,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn notified(&self) -> &NotifiedSet {
        &self.notified
    }

    /// 讀取保存的狀態；讀不到就從空集合開始（寧可重複通知，也不漏通知）
    pub async fn load_state(&mut self) {
        match self.store.load().await {
            Ok(notified) => {
                tracing::info!(
                    facility = %self.facility,
                    "Loaded {} previously notified slots",
                    notified.len()
                );
                self.notified = notified;
            }
            Err(e) => {
                tracing::warn!(
                    facility = %self.facility,
                    error = %e,
                    "Could not load saved state, starting with an empty notified set"
                );
                self.notified = NotifiedSet::new();
            }
        }
        self.loaded = true;
    }

    fn scan_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        (0..self.settings.scan_days)
            .filter_map(|offset| today.checked_add_days(Days::new(u64::from(offset))))
            .collect()
    }

    async fn fetch_snapshot(&self, dates: &[NaiveDate]) -> Result<Snapshot> {
        self.adapter.begin_cycle().await?;

        let mut snapshot = Snapshot::new();
        for date in dates {
            let labels = self.adapter.fetch_slots(*date).await?;
            let kept = snapshot.insert_raw(*date, labels.as_slice());
            tracing::debug!(
                facility = %self.facility,
                date = %date,
                "Fetched {} labels, kept {} slots",
                labels.len(),
                kept
            );
        }
        Ok(snapshot)
    }

    pub async fn run_cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> CycleOutcome {
        if is_cancelled(shutdown) {
            self.state = PollState::Stopped;
            return CycleOutcome::Cancelled;
        }
        if !self.loaded {
            self.load_state().await;
        }

        self.state = PollState::Fetching;
        let today = self.clock.today();
        let pruned = self.notified.prune_before(today);
        if pruned > 0 {
            tracing::debug!(facility = %self.facility, "Pruned {} expired slots", pruned);
        }

        let dates = self.scan_dates(today);
        let fetched = tokio::select! {
            result = self.fetch_snapshot(&dates) => result,
            _ = wait_for_shutdown(shutdown) => {
                self.state = PollState::Stopped;
                return CycleOutcome::Cancelled;
            }
        };

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    facility = %self.facility,
                    error = %e,
                    category = ?e.category(),
                    "Fetch failed, skipping this cycle"
                );
                self.state = PollState::Idle;
                return CycleOutcome::FetchFailed;
            }
        };

        if is_cancelled(shutdown) {
            self.state = PollState::Stopped;
            return CycleOutcome::Cancelled;
        }

        self.state = PollState::Diffing;
        let diff = differ::diff(&snapshot, &self.notified);
        if !diff.no_longer_listed.is_empty() {
            tracing::info!(
                facility = %self.facility,
                "{} previously notified slots are no longer listed",
                diff.no_longer_listed.len()
            );
        }

        // 從這裡開始一定要走到保存，已送出的通知才不會遺失紀錄
        let outcome = if diff.is_empty() {
            tracing::info!(
                facility = %self.facility,
                "Found {} slots but no new ones since last notification",
                snapshot.slot_count()
            );
            CycleOutcome::NoNewSlots
        } else {
            self.state = PollState::Dispatching;
            let count = diff.new_count();
            tracing::info!(facility = %self.facility, "🎾 {} new slots detected", count);

            let now = self.clock.now();
            let report = self.dispatcher.dispatch(&self.formatter, &diff.new_slots, now).await;
            if report.any_succeeded() {
                self.notified.mark_all(diff.keys_to_mark, now);
                CycleOutcome::Notified { count }
            } else {
                tracing::error!(
                    facility = %self.facility,
                    "All notification channels failed; {} slots will be retried next cycle",
                    count
                );
                CycleOutcome::DispatchFailed { count }
            }
        };

        self.state = PollState::Persisting;
        if let Err(e) = self.store.save(&self.notified, &snapshot).await {
            tracing::warn!(
                facility = %self.facility,
                error = %e,
                "Could not save state; in-memory state stays authoritative"
            );
        }

        self.state = PollState::Idle;
        outcome
    }

    /// 執行到收到停止訊號或達到 `max_cycles`，回傳完成的輪數
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        tracing::info!(
            facility = %self.facility,
            "Monitoring {} days every {:?}",
            self.settings.scan_days,
            self.settings.interval
        );

        let mut cycles = 0;
        loop {
            if self.run_cycle(&mut shutdown).await == CycleOutcome::Cancelled {
                break;
            }
            cycles += 1;

            if self.settings.max_cycles > 0 && cycles >= self.settings.max_cycles {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        self.state = PollState::Stopped;
        tracing::info!(facility = %self.facility, "Stopped after {} cycles", cycles);
        cycles
    }
}
