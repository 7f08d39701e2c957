//! 수집 조정자.
//!
//! 틱/K선/재무/실시간 수집기를 고정 순서로 실행하고, 결과를 하나의
//! `CollectionReport`로 합칩니다. 특정 수집기가 없거나 모든 심볼이 실패해도
//! 나머지 수집은 계속되며 리포트는 항상 생성됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use stockdata_core::{
    collection_span, CollectedPayload, DataKind, FetchError, FetchResult, MarketDataProvider,
    RealtimeRecord, Symbol, TimeWindow,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::collectors::{
    BarCollector, CollectorBase, FundamentalsCollector, RealtimeCollector, TickCollector,
};
use crate::config::CollectorConfig;
use crate::overview::MarketOverview;
use crate::stats::KindSummary;
use crate::storage::{IntoDocuments, NullSink, StorageSink};
use crate::Result;

/// 수집 실행 상태 요약.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    /// 요청한 모든 종류에서 실제 데이터를 수집함
    Complete,
    /// 일부 종류만 실제 데이터를 수집함
    Partial,
    /// 실제 데이터를 하나도 수집하지 못함
    Failed,
    /// 수집할 심볼이 없어 실행하지 않음
    Skipped,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Complete => "complete",
            CollectionStatus::Partial => "partial",
            CollectionStatus::Failed => "failed",
            CollectionStatus::Skipped => "skipped",
        }
    }
}

/// 수집 실행 1회의 집계 결과.
///
/// 생성 이후 변경되지 않으며, 수집을 요청한 호출자가 소유합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// 요청 심볼
    pub symbols: Vec<String>,
    /// 데이터 종류별 통계
    pub kinds: BTreeMap<DataKind, KindSummary>,
    /// 실제 레코드를 하나 이상 수집한 데이터 종류 수
    pub successful_collections: usize,
    /// 실제 레코드 총 수 (합성 제외)
    pub total_records: usize,
    pub collection_status: CollectionStatus,
}

impl CollectionReport {
    /// 종류별 통계로 리포트를 생성합니다.
    pub fn new(run_id: Uuid, symbols: Vec<String>, kinds: BTreeMap<DataKind, KindSummary>) -> Self {
        let successful_collections = kinds.values().filter(|s| s.has_genuine_records()).count();
        let total_records = kinds.values().map(|s| s.records).sum();
        let collection_status = if symbols.is_empty() {
            CollectionStatus::Skipped
        } else if successful_collections == kinds.len() && !kinds.is_empty() {
            CollectionStatus::Complete
        } else if successful_collections > 0 {
            CollectionStatus::Partial
        } else {
            CollectionStatus::Failed
        };

        Self {
            run_id,
            timestamp: Utc::now(),
            symbols,
            kinds,
            successful_collections,
            total_records,
            collection_status,
        }
    }

    /// 심볼이 없어 실행하지 않은 빈 리포트.
    pub fn empty() -> Self {
        Self::new(Uuid::new_v4(), Vec::new(), BTreeMap::new())
    }

    /// 종류별 통계 조회.
    pub fn summary(&self, kind: DataKind) -> Option<&KindSummary> {
        self.kinds.get(&kind)
    }

    /// 모든 종류의 실패 수 합계.
    pub fn total_failed(&self) -> usize {
        self.kinds.values().map(|s| s.failed).sum()
    }

    /// 다른 리포트의 통계를 합친 새 리포트를 만듭니다 (여러 단계로 구성된 작업용).
    pub fn merged(run_id: Uuid, reports: &[CollectionReport]) -> Self {
        let mut symbols: Vec<String> = Vec::new();
        let mut kinds: BTreeMap<DataKind, KindSummary> = BTreeMap::new();
        for report in reports {
            for symbol in &report.symbols {
                if !symbols.contains(symbol) {
                    symbols.push(symbol.clone());
                }
            }
            for (kind, summary) in &report.kinds {
                kinds.entry(*kind).or_default().merge(summary);
            }
        }
        Self::new(run_id, symbols, kinds)
    }
}

/// 틱/K선/재무/실시간 수집기를 조합하는 조정자.
pub struct CollectionCoordinator {
    tick: Option<TickCollector>,
    bar: Option<BarCollector>,
    fundamentals: Option<FundamentalsCollector>,
    realtime: Option<RealtimeCollector>,
    sink: Arc<dyn StorageSink>,
    default_frequency: String,
}

impl CollectionCoordinator {
    /// 수집기가 하나도 없는 조정자. `with_*`로 수집기를 추가합니다.
    pub fn new(sink: Arc<dyn StorageSink>) -> Self {
        Self {
            tick: None,
            bar: None,
            fundamentals: None,
            realtime: None,
            sink,
            default_frequency: "1d".to_string(),
        }
    }

    /// 하나의 제공자로 네 수집기를 모두 연결합니다.
    pub async fn connect(
        provider: Arc<dyn MarketDataProvider>,
        config: &CollectorConfig,
        sink: Arc<dyn StorageSink>,
    ) -> Result<Self> {
        let tz = config.session.tz()?;
        let policy = config.retry;
        let collection = &config.collection;

        let tick = TickCollector::new(
            CollectorBase::connect(DataKind::Tick, provider.clone(), policy).await,
        );
        let bar = BarCollector::new(
            CollectorBase::connect(DataKind::Bar, provider.clone(), policy).await,
            tz,
            collection.bar_lookback_days,
        );
        let fundamentals = FundamentalsCollector::new(
            CollectorBase::connect(DataKind::Fundamentals, provider.clone(), policy).await,
            tz,
            collection.fundamentals_lookback_days,
        );
        let realtime = RealtimeCollector::new(
            CollectorBase::connect(DataKind::Realtime, provider, policy).await,
        );

        Ok(Self::new(sink)
            .with_tick(tick)
            .with_bar(bar)
            .with_fundamentals(fundamentals)
            .with_realtime(realtime)
            .with_default_frequency(collection.default_frequency.clone()))
    }

    pub fn with_tick(mut self, collector: TickCollector) -> Self {
        self.tick = Some(collector);
        self
    }

    pub fn with_bar(mut self, collector: BarCollector) -> Self {
        self.bar = Some(collector);
        self
    }

    pub fn with_fundamentals(mut self, collector: FundamentalsCollector) -> Self {
        self.fundamentals = Some(collector);
        self
    }

    pub fn with_realtime(mut self, collector: RealtimeCollector) -> Self {
        self.realtime = Some(collector);
        self
    }

    /// `collect_all`에서 사용하는 K선 주기.
    pub fn with_default_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.default_frequency = frequency.into();
        self
    }

    /// 저장소 없이 생성할 때 사용하는 기본 저장소.
    pub fn null_sink() -> Arc<dyn StorageSink> {
        Arc::new(NullSink)
    }

    /// 종류별 연결 상태.
    pub fn connectivity(&self) -> BTreeMap<DataKind, bool> {
        let mut map = BTreeMap::new();
        map.insert(DataKind::Tick, self.tick.as_ref().is_some_and(|c| c.base().is_connected()));
        map.insert(DataKind::Bar, self.bar.as_ref().is_some_and(|c| c.base().is_connected()));
        map.insert(
            DataKind::Fundamentals,
            self.fundamentals.as_ref().is_some_and(|c| c.base().is_connected()),
        );
        map.insert(
            DataKind::Realtime,
            self.realtime.as_ref().is_some_and(|c| c.base().is_connected()),
        );
        map
    }

    /// 네 종류를 고정 순서(틱 → K선 → 재무 → 실시간)로 모두 수집합니다.
    pub async fn collect_all(&self, symbols: &[String], window: Option<&TimeWindow>) -> CollectionReport {
        let frequencies = [self.default_frequency.clone()];
        self.collect_kinds(&DataKind::ALL, symbols, window, &frequencies)
            .await
    }

    /// 지정한 종류만 수집합니다. K선은 `frequencies`의 각 주기로 수집합니다.
    pub async fn collect_kinds(
        &self,
        kinds: &[DataKind],
        symbols: &[String],
        window: Option<&TimeWindow>,
        frequencies: &[String],
    ) -> CollectionReport {
        if symbols.is_empty() {
            tracing::warn!("수집할 심볼이 없습니다");
            return CollectionReport::empty();
        }

        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, symbols = symbols.len(), kinds = kinds.len(), "수집 시작");

        let mut summaries = BTreeMap::new();
        for &kind in kinds {
            let summary = self
                .run_kind(kind, run_id, symbols, window, frequencies)
                .instrument(collection_span!(kind, run_id))
                .await;
            summaries.insert(kind, summary);
        }

        let report = CollectionReport::new(run_id, symbols.to_vec(), summaries);
        tracing::info!(
            run_id = %run_id,
            successful_collections = report.successful_collections,
            total_records = report.total_records,
            status = report.collection_status.as_str(),
            "수집 종료"
        );

        self.store_report(&report).await;
        report
    }

    /// 실시간 스냅샷을 수집하고 시장 개요를 함께 반환합니다.
    pub async fn collect_realtime_overview(
        &self,
        symbols: &[String],
    ) -> (CollectionReport, Option<MarketOverview>) {
        if symbols.is_empty() {
            tracing::warn!("수집할 심볼이 없습니다");
            return (CollectionReport::empty(), None);
        }

        let run_id = Uuid::new_v4();
        let span = collection_span!(DataKind::Realtime, run_id);
        let (summary, overview) = async {
            match &self.realtime {
                Some(collector) => {
                    let started = Instant::now();
                    let results = collector.collect(symbols, None).await;
                    let records: Vec<RealtimeRecord> = results
                        .iter()
                        .filter_map(|r| r.outcome.record())
                        .filter(|r| !r.is_synthetic())
                        .cloned()
                        .collect();
                    let overview = MarketOverview::from_records(&records);
                    let summary = self.finish(DataKind::Realtime, run_id, &results, started).await;
                    (summary, Some(overview))
                }
                None => (self.unavailable(DataKind::Realtime, symbols), None),
            }
        }
        .instrument(span)
        .await;

        let mut kinds = BTreeMap::new();
        kinds.insert(DataKind::Realtime, summary);
        let report = CollectionReport::new(run_id, symbols.to_vec(), kinds);
        self.store_report(&report).await;
        (report, overview)
    }

    /// 리포트를 저장소에 넘깁니다. 저장 실패는 로그로만 남깁니다.
    pub async fn store_report(&self, report: &CollectionReport) {
        if let Err(e) = self.sink.store_report(report).await {
            tracing::warn!(sink = self.sink.name(), run_id = %report.run_id, error = %e, "리포트 저장 실패");
        }
    }

    /// 모든 수집기의 연결을 해제하고 저장소를 닫습니다.
    pub async fn close(&self) {
        if let Some(c) = &self.tick {
            c.base().close();
        }
        if let Some(c) = &self.bar {
            c.base().close();
        }
        if let Some(c) = &self.fundamentals {
            c.base().close();
        }
        if let Some(c) = &self.realtime {
            c.base().close();
        }
        self.sink.close().await;
    }

    async fn run_kind(
        &self,
        kind: DataKind,
        run_id: Uuid,
        symbols: &[String],
        window: Option<&TimeWindow>,
        frequencies: &[String],
    ) -> KindSummary {
        let started = Instant::now();
        match kind {
            DataKind::Tick => match &self.tick {
                Some(c) => {
                    let results = c.collect(symbols, window).await;
                    self.finish(kind, run_id, &results, started).await
                }
                None => self.unavailable(kind, symbols),
            },
            DataKind::Bar => match &self.bar {
                Some(c) => {
                    let frequencies: Vec<String> = if frequencies.is_empty() {
                        vec![self.default_frequency.clone()]
                    } else {
                        frequencies.to_vec()
                    };
                    let batches = c.collect_frequencies(symbols, window, &frequencies).await;
                    for (_, results) in &batches {
                        self.persist(kind, run_id, results).await;
                    }
                    let mut summary = KindSummary::from_frequency_batches(&batches);
                    for (frequency, per_frequency) in &summary.frequencies {
                        tracing::debug!(
                            frequency = %frequency,
                            succeeded = per_frequency.succeeded,
                            records = per_frequency.records,
                            "K선 주기 수집 완료"
                        );
                    }
                    summary.elapsed = started.elapsed();
                    summary.log_summary(kind);
                    summary
                }
                None => self.unavailable(kind, symbols),
            },
            DataKind::Fundamentals => match &self.fundamentals {
                Some(c) => {
                    let results = c.collect(symbols, window).await;
                    self.finish(kind, run_id, &results, started).await
                }
                None => self.unavailable(kind, symbols),
            },
            DataKind::Realtime => match &self.realtime {
                Some(c) => {
                    let results = c.collect(symbols, window).await;
                    self.finish(kind, run_id, &results, started).await
                }
                None => self.unavailable(kind, symbols),
            },
        }
    }

    async fn finish<T>(
        &self,
        kind: DataKind,
        run_id: Uuid,
        results: &[FetchResult<T>],
        started: Instant,
    ) -> KindSummary
    where
        T: CollectedPayload + IntoDocuments,
    {
        self.persist(kind, run_id, results).await;
        let mut summary = KindSummary::from_results(results);
        summary.elapsed = started.elapsed();
        summary.log_summary(kind);
        summary
    }

    async fn persist<T: IntoDocuments>(&self, kind: DataKind, run_id: Uuid, results: &[FetchResult<T>]) {
        let documents: Vec<_> = results
            .iter()
            .filter_map(|r| r.outcome.record())
            .flat_map(|record| record.documents(kind))
            .collect();
        if !documents.is_empty() {
            if let Err(e) = self.sink.store_records(run_id, documents).await {
                tracing::warn!(kind = %kind, sink = self.sink.name(), error = %e, "레코드 저장 실패");
            }
        }
    }

    fn unavailable(&self, kind: DataKind, symbols: &[String]) -> KindSummary {
        tracing::error!(kind = %kind, "수집기가 구성되지 않음");
        let summary = KindSummary::all_failed(
            symbols.len(),
            FetchError::CollectorUnavailable(kind).to_string(),
        );
        summary.log_summary(kind);
        summary
    }
}

/// 시장별 종목 목록을 조회해 정규 형식이면서 해당 거래소에 속한 심볼만 남깁니다.
pub async fn sync_symbol_list(provider: &dyn MarketDataProvider, market: &str) -> Result<Vec<Symbol>> {
    let market = market.trim().to_uppercase();
    let listed = provider.fetch_symbol_list(&market).await?;
    let total = listed.len();

    let mut symbols: Vec<Symbol> = Vec::with_capacity(total);
    for raw in &listed {
        match Symbol::parse(raw) {
            Ok(symbol) if symbol.exchange() == market => {
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
            Ok(_) => tracing::debug!(market = %market, symbol = %raw, "다른 거래소 종목 제외"),
            Err(e) => tracing::debug!(market = %market, symbol = %raw, error = %e, "형식이 맞지 않는 종목 제외"),
        }
    }

    if symbols.len() < total {
        tracing::warn!(market = %market, dropped = total - symbols.len(), "종목 목록 일부 제외");
    }
    tracing::info!(market = %market, count = symbols.len(), "종목 목록 조회 완료");
    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(succeeded: usize, failed: usize, records: usize) -> KindSummary {
        KindSummary {
            total: succeeded + failed,
            succeeded,
            failed,
            records,
            ..Default::default()
        }
    }

    #[test]
    fn test_report_status_derivation() {
        let symbols = vec!["SHSE.600000".to_string()];

        let mut kinds = BTreeMap::new();
        kinds.insert(DataKind::Tick, summary(1, 0, 1));
        kinds.insert(DataKind::Bar, summary(1, 0, 20));
        let report = CollectionReport::new(Uuid::new_v4(), symbols.clone(), kinds.clone());
        assert_eq!(report.successful_collections, 2);
        assert_eq!(report.total_records, 21);
        assert_eq!(report.collection_status, CollectionStatus::Complete);

        kinds.insert(DataKind::Fundamentals, summary(0, 1, 0));
        let report = CollectionReport::new(Uuid::new_v4(), symbols.clone(), kinds);
        assert_eq!(report.collection_status, CollectionStatus::Partial);
        assert_eq!(report.total_failed(), 1);

        let mut failed = BTreeMap::new();
        failed.insert(DataKind::Tick, summary(0, 1, 0));
        let report = CollectionReport::new(Uuid::new_v4(), symbols, failed);
        assert_eq!(report.collection_status, CollectionStatus::Failed);
    }

    #[test]
    fn test_empty_report() {
        let report = CollectionReport::empty();
        assert_eq!(report.collection_status, CollectionStatus::Skipped);
        assert_eq!(report.successful_collections, 0);
        assert!(report.kinds.is_empty());
    }

    #[test]
    fn test_merged_report() {
        let mut first = BTreeMap::new();
        first.insert(DataKind::Tick, summary(2, 0, 2));
        let mut second = BTreeMap::new();
        second.insert(DataKind::Tick, summary(1, 1, 1));
        second.insert(DataKind::Bar, summary(2, 0, 10));

        let symbols = vec!["SHSE.600000".to_string(), "SZSE.000001".to_string()];
        let reports = [
            CollectionReport::new(Uuid::new_v4(), symbols.clone(), first),
            CollectionReport::new(Uuid::new_v4(), symbols.clone(), second),
        ];

        let merged = CollectionReport::merged(Uuid::new_v4(), &reports);
        assert_eq!(merged.symbols, symbols);
        assert_eq!(merged.summary(DataKind::Tick).unwrap().succeeded, 3);
        assert_eq!(merged.summary(DataKind::Tick).unwrap().failed, 1);
        assert_eq!(merged.total_records, 13);
        assert_eq!(merged.successful_collections, 2);
    }

    #[test]
    fn test_report_json_keys() {
        let mut kinds = BTreeMap::new();
        kinds.insert(DataKind::Fundamentals, summary(1, 1, 1));
        let report = CollectionReport::new(Uuid::new_v4(), vec!["SHSE.600000".into()], kinds);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kinds"]["fundamentals"]["failed"], 1);
        assert_eq!(json["collection_status"], "partial");
    }
}
