//! StockData 시장 데이터 수집기.
//!
//! 거래 세션 캘린더에 따라 틱/K선/재무/실시간 수집기를 실행하고
//! 심볼 단위 실패를 격리한 채 하나의 수집 리포트를 만듭니다:
//! - 재시도와 합성 데이터 대체 (`retry`)
//! - 데이터 종류별 수집기 (`collectors`)
//! - 수집 조정과 리포트 집계 (`coordinator`)
//! - 트리거 캘린더와 워커 풀 기반 스케줄러 (`calendar`, `pool`, `scheduler`)

pub mod calendar;
pub mod collectors;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod overview;
pub mod pool;
pub mod provider;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod storage;
pub mod task;

pub use calendar::{TradingCalendar, TriggerName};
pub use config::CollectorConfig;
pub use context::CollectorContext;
pub use coordinator::{CollectionCoordinator, CollectionReport, CollectionStatus};
pub use error::{CollectorError, Result};
pub use overview::MarketOverview;
pub use pool::WorkerPool;
pub use retry::RetryableOperation;
pub use scheduler::{LastRun, SchedulerState, SchedulerStatus, SessionScheduler};
pub use stats::KindSummary;
pub use task::TaskKind;
