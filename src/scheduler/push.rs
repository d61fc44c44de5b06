// file: src/scheduler/push.rs
// description: minute-granularity push scheduler with once-per-day gating
// reference: https://docs.rs/tokio-util/latest/tokio_util/sync/struct.CancellationToken.html

use super::window::TimeWindow;
use crate::cache::local_date;
use crate::config::PushWindowConfig;
use crate::database::PushRecordStore;
use crate::error::Result;
use crate::models::PushRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};

pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// The work released when the gate opens. Returns the number of items sent.
#[async_trait]
pub trait PushTask: Send + Sync {
    async fn execute(&self) -> Result<usize>;

    /// Channel names recorded alongside each attempt.
    fn notifiers(&self) -> Vec<String> {
        Vec::new()
    }
}

/// What a single gate check decided.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Disabled,
    OutsideWindow,
    AlreadyPushedToday,
    Executed(PushRecord),
}

struct RunHandle {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct SchedulerState {
    config: PushWindowConfig,
    parent: Option<CancellationToken>,
    run: Option<RunHandle>,
    next_generation: u64,
}

struct Inner {
    // Held for the whole gate check and task run, so reload and stop
    // serialize with ticks.
    state: Mutex<SchedulerState>,
    task: Arc<dyn PushTask>,
    records: Arc<PushRecordStore>,
    span: Span,
}

#[derive(Clone)]
pub struct PushScheduler {
    inner: Arc<Inner>,
}

impl PushScheduler {
    pub fn new(
        config: PushWindowConfig,
        task: Arc<dyn PushTask>,
        records: Arc<PushRecordStore>,
    ) -> Self {
        Self::with_span(config, task, records, Span::none())
    }

    pub fn with_span(
        config: PushWindowConfig,
        task: Arc<dyn PushTask>,
        records: Arc<PushRecordStore>,
        span: Span,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState {
                    config,
                    parent: None,
                    run: None,
                    next_generation: 0,
                }),
                task,
                records,
                span,
            }),
        }
    }

    /// Starts the tick loop unless already running or the window is
    /// disabled. Returns whether a loop is running afterwards.
    pub async fn start(&self, parent: &CancellationToken) -> bool {
        let mut state = self.inner.state.lock().await;
        state.parent = Some(parent.clone());

        if state.is_running() {
            info!(parent: &self.inner.span, "Scheduler is already running");
            return true;
        }
        if !state.config.enabled {
            info!(parent: &self.inner.span, "Push window is disabled, scheduler will not start");
            return false;
        }

        self.spawn_loop(&mut state);
        true
    }

    pub async fn stop(&self) {
        let run = {
            let mut state = self.inner.state.lock().await;
            state.run.take()
        };

        if let Some(run) = run {
            run.token.cancel();
            if let Err(e) = run.handle.await {
                warn!(parent: &self.inner.span, "Scheduler loop ended abnormally: {}", e);
            }
            info!(parent: &self.inner.span, "Scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.is_running()
    }

    pub async fn config(&self) -> PushWindowConfig {
        self.inner.state.lock().await.config.clone()
    }

    /// Swaps in new parameters. A changed window or enablement restarts the
    /// loop; anything else is applied in place.
    pub async fn reload_config(&self, config: PushWindowConfig) {
        let mut state = self.inner.state.lock().await;
        let span = &self.inner.span;

        if state.config.same_schedule(&config) {
            debug!(parent: span, "Scheduler schedule unchanged, no restart needed");
            state.config = config;
            return;
        }

        info!(
            parent: span,
            "Scheduler configuration changed (enabled: {} -> {}, window: {}-{} -> {}-{})",
            state.config.enabled,
            config.enabled,
            state.config.start,
            state.config.end,
            config.start,
            config.end
        );
        state.config = config;

        if let Some(run) = state.run.take() {
            // The old loop cannot be mid-task while we hold the lock.
            run.token.cancel();
        }

        if !state.config.enabled {
            info!(parent: span, "Scheduler stopped (push window disabled)");
        } else if state.parent.is_some() {
            self.spawn_loop(&mut state);
        }
    }

    pub async fn check_and_run(&self) -> GateOutcome {
        self.check_and_run_at(Utc::now()).await
    }

    /// One gate evaluation against `now`, running the task if the gate opens.
    pub async fn check_and_run_at(&self, now: DateTime<Utc>) -> GateOutcome {
        let state = self.inner.state.lock().await;
        self.inner.gate(&state.config, now).await
    }

    fn spawn_loop(&self, state: &mut SchedulerState) {
        let Some(token) = state.parent.as_ref().map(CancellationToken::child_token) else {
            return;
        };

        let generation = state.next_generation;
        state.next_generation += 1;

        info!(
            parent: &self.inner.span,
            "Scheduler started with time window: {} - {}", state.config.start, state.config.end
        );

        let inner = Arc::clone(&self.inner);
        let loop_token = token.clone();
        let span = self.inner.span.clone();
        let handle = tokio::spawn(
            async move { inner.run_loop(loop_token, generation).await }.instrument(span),
        );

        state.run = Some(RunHandle {
            generation,
            token,
            handle,
        });
    }
}

impl SchedulerState {
    fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| !run.token.is_cancelled() && !run.handle.is_finished())
    }
}

impl Inner {
    async fn run_loop(self: Arc<Self>, token: CancellationToken, generation: u64) {
        // The first tick completes immediately, so an already open window
        // is checked on start.
        let mut ticker = interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    let state = self.state.lock().await;
                    if token.is_cancelled() {
                        break;
                    }
                    self.gate(&state.config, Utc::now()).await;
                }
            }
        }

        let mut state = self.state.lock().await;
        if state.run.as_ref().map(|run| run.generation) == Some(generation) {
            state.run = None;
        }
        debug!(generation, "Scheduler loop exited");
    }

    async fn gate(&self, config: &PushWindowConfig, now: DateTime<Utc>) -> GateOutcome {
        match self.evaluate(config, now) {
            Some(outcome) => outcome,
            None => GateOutcome::Executed(self.execute(config, now).await),
        }
    }

    /// Decides whether the gate stays shut. `None` means run the task.
    fn evaluate(&self, config: &PushWindowConfig, now: DateTime<Utc>) -> Option<GateOutcome> {
        let _enter = self.span.enter();

        if !config.enabled {
            return Some(GateOutcome::Disabled);
        }

        let window = match TimeWindow::parse(&config.start, &config.end) {
            Ok(window) => window,
            Err(e) => {
                warn!("Push window treated as closed: {}", e);
                return Some(GateOutcome::OutsideWindow);
            }
        };
        if !window.contains_at(now) {
            return Some(GateOutcome::OutsideWindow);
        }

        if config.once_per_day {
            match self.records.last_success_time() {
                Ok(Some(last)) if local_date(last) == local_date(now) => {
                    info!("Already pushed today, skipping");
                    return Some(GateOutcome::AlreadyPushedToday);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Could not read last push time, skipping this tick: {}", e);
                    return Some(GateOutcome::AlreadyPushedToday);
                }
            }
        }

        info!("Time window {} matched, executing task", window);
        None
    }

    async fn execute(&self, config: &PushWindowConfig, now: DateTime<Utc>) -> PushRecord {
        let id = self.records.next_id(now);
        let started = Instant::now();
        let result = self.task.execute().instrument(self.span.clone()).await;
        let duration = started.elapsed().as_millis() as u64;
        self.record(config, id, now, result, duration)
    }

    fn record(
        &self,
        config: &PushWindowConfig,
        id: String,
        now: DateTime<Utc>,
        result: Result<usize>,
        duration: u64,
    ) -> PushRecord {
        let _enter = self.span.enter();
        let mut record = match result {
            Ok(count) => {
                info!("Push task completed: {} items in {}ms", count, duration);
                PushRecord::success(id, now, count, duration)
            }
            Err(e) => {
                error!("Push task failed: {}", e);
                PushRecord::failed(id, now, e.to_string(), duration)
            }
        };
        record.notifiers = self.task.notifiers();

        if let Err(e) = self.records.save(&record) {
            error!("Failed to save push record {}: {}", record.id, e);
        }

        if config.push_record_retention_days > 0 {
            if let Err(e) = self
                .records
                .delete_older_than_at(config.push_record_retention_days, now)
            {
                warn!("Failed to prune push records: {}", e);
            }
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Store;
    use crate::error::PipelineError;
    use crate::models::PushStatus;
    use chrono::{Local, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PushTask for CountingTask {
        async fn execute(&self) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PipelineError::Crawl("upstream unavailable".to_string()))
            } else {
                Ok(7)
            }
        }

        fn notifiers(&self) -> Vec<String> {
            vec!["Feishu".to_string()]
        }
    }

    fn window(start: &str, end: &str, once_per_day: bool) -> PushWindowConfig {
        PushWindowConfig {
            enabled: true,
            start: start.to_string(),
            end: end.to_string(),
            once_per_day,
            push_record_retention_days: 30,
        }
    }

    fn scheduler(config: PushWindowConfig, fail: bool) -> (PushScheduler, Arc<CountingTask>) {
        let task = Arc::new(CountingTask {
            calls: AtomicUsize::new(0),
            fail,
        });
        let records = Arc::new(PushRecordStore::new(&Store::temporary().unwrap()).unwrap());
        let scheduler = PushScheduler::new(config, task.clone(), records);
        (scheduler, task)
    }

    fn local(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 10, d, h, m, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_gate_respects_midnight_window() {
        let (scheduler, task) = scheduler(window("22:00", "02:00", false), false);

        assert_eq!(
            scheduler.check_and_run_at(local(18, 3, 0)).await,
            GateOutcome::OutsideWindow
        );
        assert!(matches!(
            scheduler.check_and_run_at(local(18, 23, 30)).await,
            GateOutcome::Executed(_)
        ));
        assert!(matches!(
            scheduler.check_and_run_at(local(19, 1, 0)).await,
            GateOutcome::Executed(_)
        ));
        assert_eq!(task.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_once_per_day_skips_second_run() {
        let (scheduler, task) = scheduler(window("00:00", "23:59", true), false);

        let first = scheduler.check_and_run_at(local(18, 9, 0)).await;
        let GateOutcome::Executed(record) = first else {
            panic!("expected the first check to execute");
        };
        assert_eq!(record.status, PushStatus::Success);
        assert_eq!(record.item_count, 7);
        assert_eq!(record.notifiers, vec!["Feishu".to_string()]);

        assert_eq!(
            scheduler.check_and_run_at(local(18, 15, 0)).await,
            GateOutcome::AlreadyPushedToday
        );
        assert!(matches!(
            scheduler.check_and_run_at(local(19, 9, 0)).await,
            GateOutcome::Executed(_)
        ));
        assert_eq!(task.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_task_is_recorded_and_does_not_satisfy_day() {
        let (scheduler, task) = scheduler(window("00:00", "23:59", true), true);

        let GateOutcome::Executed(record) = scheduler.check_and_run_at(local(18, 9, 0)).await
        else {
            panic!("expected execution");
        };
        assert_eq!(record.status, PushStatus::Failed);
        assert!(
            record
                .error_msg
                .as_deref()
                .is_some_and(|m| m.contains("upstream unavailable"))
        );

        assert!(matches!(
            scheduler.check_and_run_at(local(18, 9, 1)).await,
            GateOutcome::Executed(_)
        ));
        assert_eq!(task.calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.inner.records.count(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_window_fails_closed() {
        let (scheduler, task) = scheduler(window("8am", "22:00", false), false);
        assert_eq!(
            scheduler.check_and_run_at(local(18, 12, 0)).await,
            GateOutcome::OutsideWindow
        );
        assert_eq!(task.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_not_start() {
        let mut config = window("00:00", "23:59", false);
        config.enabled = false;
        let (scheduler, _) = scheduler(config, false);
        let token = CancellationToken::new();

        assert!(!scheduler.start(&token).await);
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test]
    async fn test_start_checks_immediately_then_stops() {
        let (scheduler, task) = scheduler(window("00:00", "23:59", false), false);
        let token = CancellationToken::new();

        assert!(scheduler.start(&token).await);
        assert!(scheduler.start(&token).await);

        for _ in 0..100 {
            if task.calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(task.calls.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_running().await);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_loop() {
        let (scheduler, _) = scheduler(window("00:00", "00:00", false), false);
        let token = CancellationToken::new();
        assert!(scheduler.start(&token).await);

        token.cancel();
        for _ in 0..100 {
            if !scheduler.is_running().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test]
    async fn test_reload_applies_retention_in_place_and_restarts_on_window_change() {
        let (scheduler, _) = scheduler(window("00:00", "00:00", false), false);
        let token = CancellationToken::new();
        scheduler.start(&token).await;

        let mut retention_only = scheduler.config().await;
        retention_only.push_record_retention_days = 3;
        scheduler.reload_config(retention_only).await;
        assert_eq!(scheduler.config().await.push_record_retention_days, 3);
        assert!(scheduler.is_running().await);

        scheduler.reload_config(window("01:00", "02:00", false)).await;
        assert!(scheduler.is_running().await);

        let mut disabled = window("01:00", "02:00", false);
        disabled.enabled = false;
        scheduler.reload_config(disabled).await;
        assert!(!scheduler.is_running().await);

        scheduler.reload_config(window("03:00", "04:00", false)).await;
        assert!(scheduler.is_running().await);
        scheduler.stop().await;
    }
}
