//! 트리거별 정적 작업 정의.
//!
//! 작업 표는 스케줄러 시작 시 한 번 만들어지며 이후 변경되지 않습니다.
//! 트리거가 발화할 때마다 표에서 작업을 다시 읽어 실행합니다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use stockdata_core::{CollectionConfig, DataKind, Frequency, TimeWindow};

use crate::calendar::{TradingCalendar, TriggerName};

/// 작업 대상 심볼 집합.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSet {
    /// 설정된 관심 종목
    Watchlist,
    /// 지정 목록
    Explicit(Vec<String>),
}

/// 조회 기간 규칙. 실행 시점에 구체적인 기간으로 바뀝니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPreset {
    /// 기간 없음 (수집기 기본값)
    Default,
    /// 오늘 장 시작부터 지금까지
    TodaySession,
    /// 최근 N일
    LastDays(i64),
}

impl WindowPreset {
    pub fn resolve(&self, calendar: &TradingCalendar, now: DateTime<Utc>) -> Option<TimeWindow> {
        match self {
            WindowPreset::Default => None,
            WindowPreset::TodaySession => {
                let open = calendar
                    .session_open(calendar.local_date(now))
                    .unwrap_or(now - Duration::hours(6));
                Some(TimeWindow::between(open.min(now), now))
            }
            WindowPreset::LastDays(days) => Some(TimeWindow::last_days(now, *days)),
        }
    }
}

/// 작업 단계.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStep {
    /// 지정 종류 수집
    Collect {
        kinds: Vec<DataKind>,
        frequencies: Vec<Frequency>,
        window: WindowPreset,
    },
    /// 실시간 스냅샷 수집 후 시장 개요 기록
    RealtimeOverview,
}

impl TaskStep {
    fn collect(kind: DataKind, window: WindowPreset) -> Self {
        TaskStep::Collect {
            kinds: vec![kind],
            frequencies: Vec::new(),
            window,
        }
    }

    fn bars(frequencies: &[Frequency], window: WindowPreset) -> Self {
        TaskStep::Collect {
            kinds: vec![DataKind::Bar],
            frequencies: frequencies.to_vec(),
            window,
        }
    }
}

/// 트리거 1개에 묶인 작업.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub trigger: TriggerName,
    pub symbols: SymbolSet,
    pub steps: Vec<TaskStep>,
}

impl ScheduledTask {
    /// 작업이 다루는 데이터 종류 (중복 제거, 첫 등장 순서).
    pub fn kinds(&self) -> Vec<DataKind> {
        let mut kinds = Vec::new();
        for step in &self.steps {
            let step_kinds: &[DataKind] = match step {
                TaskStep::Collect { kinds, .. } => kinds,
                TaskStep::RealtimeOverview => &[DataKind::Realtime],
            };
            for kind in step_kinds {
                if !kinds.contains(kind) {
                    kinds.push(*kind);
                }
            }
        }
        kinds
    }
}

/// 트리거 작업 표를 생성합니다.
pub fn build_task_table(collection: &CollectionConfig) -> Vec<ScheduledTask> {
    use Frequency::*;

    let task = |trigger, steps| ScheduledTask {
        trigger,
        symbols: SymbolSet::Watchlist,
        steps,
    };

    vec![
        task(
            TriggerName::PreMarket,
            vec![
                TaskStep::collect(DataKind::Fundamentals, WindowPreset::Default),
                TaskStep::bars(&[D1, H1], WindowPreset::Default),
            ],
        ),
        task(
            TriggerName::MarketOpen,
            vec![TaskStep::collect(DataKind::Realtime, WindowPreset::Default)],
        ),
        task(TriggerName::Midday, vec![TaskStep::RealtimeOverview]),
        task(
            TriggerName::MarketClose,
            vec![
                TaskStep::collect(DataKind::Realtime, WindowPreset::Default),
                TaskStep::bars(&[M1, M5, M15, M30, H1], WindowPreset::TodaySession),
            ],
        ),
        task(
            TriggerName::PostMarket,
            vec![TaskStep::collect(DataKind::Tick, WindowPreset::TodaySession)],
        ),
        task(
            TriggerName::DailyFundamentals,
            vec![TaskStep::collect(
                DataKind::Fundamentals,
                WindowPreset::LastDays(collection.fundamentals_lookback_days),
            )],
        ),
        task(
            TriggerName::WeeklyBackfill,
            vec![
                TaskStep::collect(
                    DataKind::Tick,
                    WindowPreset::LastDays(collection.backfill_tick_days),
                ),
                TaskStep::bars(&[D1, H1], WindowPreset::LastDays(collection.backfill_bar_days)),
            ],
        ),
    ]
}

/// 수동 작업 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Tick,
    Bar,
    Fundamentals,
    Realtime,
    /// 네 종류 전체
    All,
}

impl TaskKind {
    /// 실행할 데이터 종류.
    pub fn kinds(&self) -> Vec<DataKind> {
        match self {
            TaskKind::Tick => vec![DataKind::Tick],
            TaskKind::Bar => vec![DataKind::Bar],
            TaskKind::Fundamentals => vec![DataKind::Fundamentals],
            TaskKind::Realtime => vec![DataKind::Realtime],
            TaskKind::All => DataKind::ALL.to_vec(),
        }
    }

    /// 기간이 주어지지 않았을 때의 기본 기간.
    ///
    /// `All`은 종류별 수집기 기본값을 따르도록 기간을 지정하지 않습니다.
    pub fn default_window(&self, collection: &CollectionConfig) -> WindowPreset {
        match self {
            TaskKind::Tick => WindowPreset::LastDays(collection.tick_lookback_days),
            TaskKind::Bar => WindowPreset::LastDays(collection.bar_lookback_days),
            TaskKind::Fundamentals => WindowPreset::LastDays(collection.fundamentals_lookback_days),
            TaskKind::Realtime | TaskKind::All => WindowPreset::Default,
        }
    }
}

impl From<DataKind> for TaskKind {
    fn from(kind: DataKind) -> Self {
        match kind {
            DataKind::Tick => TaskKind::Tick,
            DataKind::Bar => TaskKind::Bar,
            DataKind::Fundamentals => TaskKind::Fundamentals,
            DataKind::Realtime => TaskKind::Realtime,
        }
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(TaskKind::All);
        }
        s.parse::<DataKind>()
            .map(TaskKind::from)
            .map_err(|_| format!("Unknown task kind: {}", s))
    }
}
