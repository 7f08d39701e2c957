//! 수집 실행 컨텍스트.
//!
//! 프로세스 시작 시 한 번 생성되어 조정자, 워커 풀, 스케줄러를 소유합니다.
//! 모든 진입점은 이 컨텍스트를 인자로 받으며 전역 상태를 사용하지 않습니다.

use std::sync::Arc;
use stockdata_core::MarketDataProvider;

use crate::calendar::TradingCalendar;
use crate::config::CollectorConfig;
use crate::coordinator::CollectionCoordinator;
use crate::pool::WorkerPool;
use crate::provider::HttpMarketDataProvider;
use crate::scheduler::{Clock, SessionScheduler};
use crate::storage::{NullSink, PgDocumentSink, StorageSink};
use crate::Result;

/// 조정자, 워커 풀, 스케줄러의 소유자.
pub struct CollectorContext {
    config: CollectorConfig,
    provider: Arc<dyn MarketDataProvider>,
    coordinator: Arc<CollectionCoordinator>,
    pool: Arc<WorkerPool>,
    scheduler: SessionScheduler,
}

impl CollectorContext {
    /// 설정에 따라 HTTP 제공자와 저장소를 만들고 컨텍스트를 구성합니다.
    ///
    /// `DATABASE_URL`이 없으면 레코드를 저장하지 않습니다.
    pub async fn from_config(config: CollectorConfig) -> Result<Self> {
        let provider: Arc<dyn MarketDataProvider> =
            Arc::new(HttpMarketDataProvider::new(&config.provider)?);

        let sink: Arc<dyn StorageSink> = if config.storage.database_url.is_some() {
            Arc::new(PgDocumentSink::connect(&config.storage).await?)
        } else {
            tracing::info!("DATABASE_URL 미설정, 수집 결과를 저장하지 않습니다");
            Arc::new(NullSink)
        };

        Self::build(config, provider, sink, None).await
    }

    /// 주어진 제공자/저장소로 컨텍스트를 구성합니다.
    pub async fn build(
        config: CollectorConfig,
        provider: Arc<dyn MarketDataProvider>,
        sink: Arc<dyn StorageSink>,
        clock: Option<Arc<dyn Clock>>,
    ) -> Result<Self> {
        let calendar = TradingCalendar::from_config(&config.session)?;
        let coordinator = Arc::new(CollectionCoordinator::connect(provider.clone(), &config, sink).await?);
        let pool = Arc::new(WorkerPool::new(config.scheduler.worker_count));

        let mut scheduler = SessionScheduler::new(coordinator.clone(), pool.clone(), calendar, &config);
        if let Some(clock) = clock {
            scheduler = scheduler.with_clock(clock);
        }

        tracing::info!(
            provider = provider.name(),
            workers = pool.size(),
            watchlist = config.watchlist.len(),
            "수집 컨텍스트 생성"
        );

        Ok(Self {
            config,
            provider,
            coordinator,
            pool,
            scheduler,
        })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn MarketDataProvider {
        self.provider.as_ref()
    }

    pub fn coordinator(&self) -> &CollectionCoordinator {
        &self.coordinator
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn scheduler(&self) -> &SessionScheduler {
        &self.scheduler
    }

    /// 스케줄러를 멈추고 워커 풀과 수집기 연결을 해제합니다.
    pub async fn shutdown(self) -> bool {
        self.scheduler.stop().await
    }
}
