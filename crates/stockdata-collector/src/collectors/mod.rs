//! 데이터 종류별 수집기.
//!
//! 모든 수집기는 `CollectorBase`를 공유합니다:
//! - 생성 시 한 번 결정되는 연결 플래그
//! - 심볼 형식 검증 (잘못된 심볼은 제공자에 전달하지 않음)
//! - 서로 다른 심볼 호출 사이의 대기 (요청 한도 대응)
//!
//! 수집기는 입력 심볼마다 정확히 하나의 `FetchResult`를 반환합니다.

mod bar;
mod fundamentals;
mod realtime;
mod tick;

pub use bar::BarCollector;
pub use fundamentals::FundamentalsCollector;
pub use realtime::RealtimeCollector;
pub use tick::TickCollector;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use stockdata_core::{
    DataKind, FetchError, FetchResult, MarketDataProvider, QuoteLevel, QuoteLevelPayload,
    RetryPolicy, Symbol,
};

use crate::retry::RetryableOperation;

/// 수집기 공통 상태.
pub struct CollectorBase {
    kind: DataKind,
    provider: Arc<dyn MarketDataProvider>,
    retry: RetryableOperation,
    connected: AtomicBool,
}

impl CollectorBase {
    /// 제공자 연결을 확인하고 수집기 상태를 생성합니다.
    ///
    /// 연결 확인에 실패해도 에러를 반환하지 않으며, 연결 플래그만 내려갑니다.
    pub async fn connect(
        kind: DataKind,
        provider: Arc<dyn MarketDataProvider>,
        policy: RetryPolicy,
    ) -> Self {
        let connected = match provider.check_connection().await {
            Ok(()) => {
                tracing::info!(kind = %kind, provider = provider.name(), "수집기 연결 성공");
                true
            }
            Err(e) => {
                tracing::error!(
                    kind = %kind,
                    provider = provider.name(),
                    error = %e,
                    "수집기 연결 실패"
                );
                false
            }
        };

        Self {
            kind,
            provider,
            retry: RetryableOperation::new(policy),
            connected: AtomicBool::new(connected),
        }
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// 연결을 해제합니다. 이후 수집 요청은 모두 `NotConnected`로 실패합니다.
    pub fn close(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::info!(kind = %self.kind, "수집기 연결 종료");
        }
    }

    pub fn provider(&self) -> &dyn MarketDataProvider {
        self.provider.as_ref()
    }

    pub fn retry(&self) -> &RetryableOperation {
        &self.retry
    }

    /// 심볼 목록을 순서대로 수집합니다.
    ///
    /// `fetch_one`은 검증된 심볼에 대해서만 호출되며, 두 번째 호출부터
    /// 호출 전에 `inter_symbol_delay`만큼 대기합니다.
    pub async fn collect_each<T, F, Fut>(&self, symbols: &[String], mut fetch_one: F) -> Vec<FetchResult<T>>
    where
        F: FnMut(Symbol) -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        if !self.is_connected() {
            tracing::error!(kind = %self.kind, symbols = symbols.len(), "수집기 미연결, 요청 거부");
            return symbols
                .iter()
                .map(|s| FetchResult::rejected(s.as_str(), FetchError::NotConnected(self.kind)))
                .collect();
        }

        let delay = self.retry.policy().inter_symbol_delay();
        let mut results = Vec::with_capacity(symbols.len());
        let mut called = false;

        for (idx, raw) in symbols.iter().enumerate() {
            let symbol = match Symbol::parse(raw) {
                Ok(symbol) => symbol,
                Err(e) => {
                    tracing::warn!(kind = %self.kind, symbol = %raw, error = %e, "잘못된 심볼, 건너뜀");
                    results.push(FetchResult::rejected(
                        raw.as_str(),
                        FetchError::InvalidSymbol(raw.clone()),
                    ));
                    continue;
                }
            };

            if called && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            called = true;

            tracing::debug!(
                kind = %self.kind,
                symbol = %symbol,
                progress = format!("{}/{}", idx + 1, symbols.len()),
                "수집 시작"
            );
            results.push(fetch_one(symbol).await);
        }

        results
    }
}

/// 누락된 수치를 0으로 채웁니다.
pub(crate) fn or_zero(value: Option<Decimal>) -> Decimal {
    value.unwrap_or(Decimal::ZERO)
}

/// 호가 페이로드를 레코드로 변환합니다.
pub(crate) fn map_quote_levels(levels: &[QuoteLevelPayload], depth: usize) -> Vec<QuoteLevel> {
    levels
        .iter()
        .take(depth)
        .map(|level| QuoteLevel {
            bid_price: or_zero(level.bid_p),
            bid_volume: level.bid_v.unwrap_or(0),
            ask_price: or_zero(level.ask_p),
            ask_volume: level.ask_v.unwrap_or(0),
        })
        .collect()
}
