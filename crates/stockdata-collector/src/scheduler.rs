//! 세션 스케줄러.
//!
//! 단일 루프가 최소 1초 간격으로 거래 캘린더를 확인하고, 도래한 트리거의
//! 작업을 워커 풀에 넣습니다. 수집 자체는 워커에서 실행되므로 느린 수집이
//! 다음 트리거 인식을 지연시키지 않습니다.
//!
//! 상태 전이:
//! - `Idle → Running` (`start`)
//! - `Running → Dispatching → Running` (트리거 발화)
//! - `Running → Stopping → Idle` (`stop`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stockdata_core::{collection_span, CollectionConfig, DataKind, SchedulerConfig, TimeWindow};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::calendar::{TradingCalendar, TriggerName};
use crate::config::CollectorConfig;
use crate::coordinator::{CollectionCoordinator, CollectionReport, CollectionStatus};
use crate::pool::WorkerPool;
use crate::task::{build_task_table, ScheduledTask, SymbolSet, TaskKind, TaskStep};
use crate::{CollectorError, Result};

/// 스케줄러 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Dispatching,
    Stopping,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Dispatching => "dispatching",
            SchedulerState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// 현재 시각 공급자.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동으로 움직이는 시계 (테스트/재현용).
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let now = self.now() + by;
        self.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// 다음 발화 예정 트리거.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextTrigger {
    pub trigger: TriggerName,
    pub at: DateTime<Utc>,
}

/// 트리거별 마지막 실행 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRun {
    pub finished_at: DateTime<Utc>,
    pub status: CollectionStatus,
    pub successful_collections: usize,
    pub total_records: usize,
}

/// 완료된 트리거 작업 집계.
#[derive(Debug, Default)]
struct TaskStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    last_runs: Mutex<BTreeMap<TriggerName, LastRun>>,
}

impl TaskStats {
    /// `Failed`/`Skipped` 리포트는 실패로 셉니다.
    fn record(&self, trigger: TriggerName, report: &CollectionReport, finished_at: DateTime<Utc>) {
        match report.collection_status {
            CollectionStatus::Failed | CollectionStatus::Skipped => {
                self.failed.fetch_add(1, Ordering::AcqRel);
            }
            CollectionStatus::Complete | CollectionStatus::Partial => {
                self.completed.fetch_add(1, Ordering::AcqRel);
            }
        }

        let run = LastRun {
            finished_at,
            status: report.collection_status,
            successful_collections: report.successful_collections,
            total_records: report.total_records,
        };
        match self.last_runs.lock() {
            Ok(mut guard) => guard.insert(trigger, run),
            Err(poisoned) => poisoned.into_inner().insert(trigger, run),
        };
    }

    fn last_runs(&self) -> BTreeMap<TriggerName, LastRun> {
        match self.last_runs.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// 읽기 전용 상태 조회 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub now: DateTime<Utc>,
    pub is_trading_day: bool,
    pub is_trading_time: bool,
    pub next_triggers: Vec<NextTrigger>,
    pub workers: usize,
    pub queued_tasks: usize,
    pub active_tasks: usize,
    /// 시작 이후 워커 풀에 넣은 트리거 작업 수
    pub dispatched_tasks: usize,
    /// 실제 데이터를 수집하고 끝난 트리거 작업 수
    pub completed_tasks: usize,
    /// 실제 데이터 없이 끝난 트리거 작업 수
    pub failed_tasks: usize,
    pub last_runs: BTreeMap<TriggerName, LastRun>,
    pub connectivity: BTreeMap<DataKind, bool>,
}

struct SchedulerInner {
    coordinator: Arc<CollectionCoordinator>,
    pool: Arc<WorkerPool>,
    calendar: Arc<TradingCalendar>,
    tasks: Arc<Vec<ScheduledTask>>,
    watchlist: Arc<Vec<String>>,
    collection: CollectionConfig,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<SchedulerState>,
    dispatched: AtomicUsize,
    stats: Arc<TaskStats>,
}

impl SchedulerInner {
    fn state(&self) -> SchedulerState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, next: SchedulerState) {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = *guard;
        if current != next {
            tracing::debug!(from = %current, to = %next, "스케줄러 상태 전이");
            *guard = next;
        }
    }

    /// 현재 상태가 `from`일 때만 `to`로 바꿉니다.
    fn transition(&self, from: SchedulerState, to: SchedulerState) -> bool {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard == from {
            tracing::debug!(from = %from, to = %to, "스케줄러 상태 전이");
            *guard = to;
            true
        } else {
            false
        }
    }

    fn resolve_symbols(&self, set: &SymbolSet) -> Vec<String> {
        match set {
            SymbolSet::Watchlist => self.watchlist.as_ref().clone(),
            SymbolSet::Explicit(symbols) => symbols.clone(),
        }
    }

    /// 트리거 작업을 워커 풀에 넣습니다.
    fn dispatch(&self, trigger: TriggerName, scheduled_at: DateTime<Utc>) {
        if !self.transition(SchedulerState::Running, SchedulerState::Dispatching) {
            return;
        }

        tracing::info!(trigger = %trigger, scheduled_at = %scheduled_at, "트리거 발화");

        match self.tasks.iter().find(|t| t.trigger == trigger).cloned() {
            Some(task) => {
                let symbols = self.resolve_symbols(&task.symbols);
                if symbols.is_empty() {
                    tracing::warn!(trigger = %trigger, "대상 심볼이 없어 작업을 건너뜁니다");
                } else {
                    let coordinator = self.coordinator.clone();
                    let calendar = self.calendar.clone();
                    let clock = self.clock.clone();
                    let stats = self.stats.clone();
                    let span = collection_span!("scheduled", Uuid::new_v4(), trigger);
                    let job = async move {
                        let report =
                            execute_task(&coordinator, &calendar, &task, &symbols, clock.now()).await;
                        tracing::info!(
                            trigger = %trigger,
                            successful_collections = report.successful_collections,
                            total_records = report.total_records,
                            status = report.collection_status.as_str(),
                            "트리거 작업 완료"
                        );
                        stats.record(trigger, &report, clock.now());
                    };
                    let submitted = self.pool.submit(job.instrument(span));
                    match submitted {
                        Ok(()) => {
                            self.dispatched.fetch_add(1, Ordering::AcqRel);
                            tracing::debug!(
                                trigger = %trigger,
                                queued = self.pool.queued(),
                                active = self.pool.active(),
                                "트리거 작업 대기열 추가"
                            );
                        }
                        Err(e) => tracing::error!(trigger = %trigger, error = %e, "트리거 작업 제출 실패"),
                    }
                }
            }
            None => tracing::warn!(trigger = %trigger, "트리거에 연결된 작업이 없습니다"),
        }

        self.transition(SchedulerState::Dispatching, SchedulerState::Running);
    }
}

/// 작업의 각 단계를 순서대로 실행하고 결과를 하나의 리포트로 합칩니다.
async fn execute_task(
    coordinator: &CollectionCoordinator,
    calendar: &TradingCalendar,
    task: &ScheduledTask,
    symbols: &[String],
    now: DateTime<Utc>,
) -> CollectionReport {
    let mut reports = Vec::with_capacity(task.steps.len());
    for step in &task.steps {
        match step {
            TaskStep::Collect {
                kinds,
                frequencies,
                window,
            } => {
                let window = window.resolve(calendar, now);
                let frequencies: Vec<String> =
                    frequencies.iter().map(|f| f.as_str().to_string()).collect();
                let report = coordinator
                    .collect_kinds(kinds, symbols, window.as_ref(), &frequencies)
                    .await;
                reports.push(report);
            }
            TaskStep::RealtimeOverview => {
                let (report, overview) = coordinator.collect_realtime_overview(symbols).await;
                if let Some(overview) = overview {
                    overview.log();
                }
                reports.push(report);
            }
        }
    }

    match reports.len() {
        0 => CollectionReport::empty(),
        1 => reports.remove(0),
        _ => {
            let merged = CollectionReport::merged(Uuid::new_v4(), &reports);
            coordinator.store_report(&merged).await;
            merged
        }
    }
}

/// 거래 캘린더 기반 세션 스케줄러.
pub struct SessionScheduler {
    inner: Arc<SchedulerInner>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionScheduler {
    /// 스케줄러를 생성합니다. 작업 표는 여기서 한 번 만들어집니다.
    pub fn new(
        coordinator: Arc<CollectionCoordinator>,
        pool: Arc<WorkerPool>,
        calendar: TradingCalendar,
        config: &CollectorConfig,
    ) -> Self {
        let tasks = build_task_table(&config.collection);
        let watchlist: Vec<String> = config.watchlist.iter().map(|s| s.to_string()).collect();

        Self {
            inner: Arc::new(SchedulerInner {
                coordinator,
                pool,
                calendar: Arc::new(calendar),
                tasks: Arc::new(tasks),
                watchlist: Arc::new(watchlist),
                collection: config.collection.clone(),
                config: config.scheduler.clone(),
                clock: Arc::new(SystemClock),
                state: Mutex::new(SchedulerState::Idle),
                dispatched: AtomicUsize::new(0),
                stats: Arc::new(TaskStats::default()),
            }),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// 시계를 교체합니다. `start` 전에 호출해야 합니다.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.clock = clock;
        }
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.state()
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.inner.calendar
    }

    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.inner.tasks
    }

    /// 종료 요청 토큰.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 트리거 인식 루프를 시작합니다.
    pub fn start(&self) -> Result<()> {
        if self.inner.pool.is_closed() {
            return Err(CollectorError::Scheduler("워커 풀이 이미 종료되었습니다".into()));
        }
        if !self.inner.transition(SchedulerState::Idle, SchedulerState::Running) {
            return Err(CollectorError::Scheduler(format!(
                "스케줄러를 시작할 수 없는 상태: {}",
                self.inner.state()
            )));
        }

        let inner = self.inner.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.poll_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_check = inner.clock.now();

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        tracing::info!("트리거 루프 종료");
                        break;
                    }

                    _ = ticker.tick() => {
                        let now = inner.clock.now();
                        for (trigger, at) in inner.calendar.due_triggers(last_check, now) {
                            inner.dispatch(trigger, at);
                        }
                        last_check = last_check.max(now);
                    }
                }
            }
        });

        let mut guard = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(handle);

        tracing::info!(
            triggers = self.inner.tasks.len(),
            workers = self.inner.pool.size(),
            poll_interval_secs = self.inner.config.poll_interval().as_secs(),
            "스케줄러 시작"
        );
        Ok(())
    }

    /// 새 트리거를 막고, 진행 중인 작업을 기다린 뒤 워커 풀과 수집기 연결을 해제합니다.
    ///
    /// 대기 시간 안에 모든 작업이 끝났으면 `true`를 반환합니다.
    pub async fn stop(&self) -> bool {
        tracing::info!(state = %self.inner.state(), "스케줄러 종료 요청");
        self.inner.set_state(SchedulerState::Stopping);

        self.cancel.cancel();
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "트리거 루프 종료 대기 실패");
            }
        }
        tracing::info!("새 트리거 수신 중단");

        let drained = self.inner.pool.shutdown(self.inner.config.drain_timeout()).await;
        tracing::info!(drained, "워커 풀 해제");

        self.inner.coordinator.close().await;
        tracing::info!("수집기 연결 해제");

        self.inner.set_state(SchedulerState::Idle);
        tracing::info!("스케줄러 종료 완료");
        drained
    }

    /// 캘린더 밖에서 수동 작업을 실행합니다.
    ///
    /// 심볼을 생략하면 관심 종목을 사용하고, 기간을 생략하면 종류별 기본 기간을
    /// 사용합니다. 대상 심볼이 없으면 빈 리포트를 반환합니다.
    pub async fn run_task(
        &self,
        kind: TaskKind,
        symbols: Option<Vec<String>>,
        window: Option<TimeWindow>,
        frequency: Option<String>,
    ) -> CollectionReport {
        let symbols = symbols.unwrap_or_else(|| self.inner.watchlist.as_ref().clone());
        if symbols.is_empty() {
            tracing::warn!(kind = ?kind, "수동 작업 대상 심볼이 없습니다");
            return CollectionReport::empty();
        }

        let now = self.inner.clock.now();
        let window = window.or_else(|| {
            kind.default_window(&self.inner.collection)
                .resolve(&self.inner.calendar, now)
        });
        let frequencies: Vec<String> = match kind {
            TaskKind::Bar => vec![frequency.unwrap_or_else(|| self.inner.collection.default_frequency.clone())],
            _ => frequency.into_iter().collect(),
        };
        let kinds = kind.kinds();

        tracing::info!(kind = ?kind, symbols = symbols.len(), "수동 작업 실행");

        let coordinator = self.inner.coordinator.clone();
        let submitted = self.inner.pool.submit_with_result(async move {
            coordinator
                .collect_kinds(&kinds, &symbols, window.as_ref(), &frequencies)
                .await
        });

        match submitted {
            Ok(rx) => match rx.await {
                Ok(report) => report,
                Err(_) => {
                    tracing::error!(kind = ?kind, "수동 작업이 완료되지 않았습니다");
                    CollectionReport::empty()
                }
            },
            Err(e) => {
                tracing::error!(kind = ?kind, error = %e, "수동 작업 제출 실패");
                CollectionReport::empty()
            }
        }
    }

    /// 현재 상태와 다음 트리거 시각.
    pub fn status(&self) -> SchedulerStatus {
        let inner = &self.inner;
        let now = inner.clock.now();
        let today = inner.calendar.local_date(now);

        SchedulerStatus {
            state: inner.state(),
            now,
            is_trading_day: inner.calendar.is_trading_day(today),
            is_trading_time: inner.calendar.is_trading_time(now),
            next_triggers: inner
                .calendar
                .next_fire_times(now)
                .into_iter()
                .map(|(trigger, at)| NextTrigger { trigger, at })
                .collect(),
            workers: inner.pool.size(),
            queued_tasks: inner.pool.queued(),
            active_tasks: inner.pool.active(),
            dispatched_tasks: inner.dispatched.load(Ordering::Acquire),
            completed_tasks: inner.stats.completed.load(Ordering::Acquire),
            failed_tasks: inner.stats.failed.load(Ordering::Acquire),
            last_runs: inner.stats.last_runs(),
            connectivity: inner.coordinator.connectivity(),
        }
    }
}
