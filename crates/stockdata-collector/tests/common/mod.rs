//! 통합 테스트용 가짜 제공자와 설정.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Shanghai;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use stockdata_collector::CollectorConfig;
use stockdata_core::{
    normalize_symbol, BarPayload, Frequency, FundamentalsPayload, MarketDataProvider,
    ProviderError, QuoteLevelPayload, QuotePayload, RetryPolicy, Symbol, SymbolMeta,
};

/// K선 요청 기록.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRequest {
    pub symbol: String,
    pub frequency: Frequency,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// 호출 횟수와 동시 실행 수를 기록하는 가짜 제공자.
#[derive(Default)]
pub struct FakeProvider {
    pub meta_calls: AtomicUsize,
    pub quote_calls: AtomicUsize,
    pub bar_calls: AtomicUsize,
    pub fundamentals_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<String>>,
    bar_requests: Mutex<Vec<BarRequest>>,
    latency: Duration,
    disconnected: bool,
    quote_error: Option<ProviderError>,
    bars_error: Option<ProviderError>,
    fundamentals_error: Option<ProviderError>,
    symbol_list: Option<Vec<String>>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeProvider {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.disconnected = true;
        self
    }

    pub fn with_quote_error(mut self, err: ProviderError) -> Self {
        self.quote_error = Some(err);
        self
    }

    pub fn with_bars_error(mut self, err: ProviderError) -> Self {
        self.bars_error = Some(err);
        self
    }

    pub fn with_fundamentals_error(mut self, err: ProviderError) -> Self {
        self.fundamentals_error = Some(err);
        self
    }

    pub fn with_symbol_list(mut self, list: &[&str]) -> Self {
        self.symbol_list = Some(list.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn total_calls(&self) -> usize {
        self.meta_calls.load(Ordering::SeqCst)
            + self.quote_calls.load(Ordering::SeqCst)
            + self.bar_calls.load(Ordering::SeqCst)
            + self.fundamentals_calls.load(Ordering::SeqCst)
    }

    /// 동시에 실행된 제공자 호출의 최댓값.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// 제공자에 전달된 심볼 (중복 포함).
    pub fn seen_symbols(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn bar_requests(&self) -> Vec<BarRequest> {
        self.bar_requests.lock().unwrap().clone()
    }

    async fn enter(&self, counter: &AtomicUsize, symbol: &str) -> InFlight<'_> {
        counter.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(symbol.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        guard
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn check_connection(&self) -> Result<(), ProviderError> {
        if self.disconnected {
            Err(ProviderError::Network("connection refused".into()))
        } else {
            Ok(())
        }
    }

    async fn lookup_symbol_meta(&self, symbol: &Symbol) -> Result<Option<SymbolMeta>, ProviderError> {
        let _guard = self.enter(&self.meta_calls, symbol.as_str()).await;
        Ok(Some(SymbolMeta {
            symbol: symbol.to_string(),
            sec_name: Some(format!("{} name", symbol.code())),
            exchange: Some(symbol.exchange().to_string()),
            sec_type: Some("CS".into()),
        }))
    }

    async fn fetch_realtime_quote(&self, symbol: &Symbol) -> Result<Option<QuotePayload>, ProviderError> {
        let _guard = self.enter(&self.quote_calls, symbol.as_str()).await;
        if let Some(err) = &self.quote_error {
            return Err(err.clone());
        }
        Ok(Some(QuotePayload {
            open: Some(dec!(10.0)),
            high: Some(dec!(10.8)),
            low: Some(dec!(9.9)),
            price: Some(dec!(10.5)),
            pre_close: Some(dec!(10.0)),
            cum_volume: Some(1_000),
            cum_amount: Some(dec!(10500)),
            quotes: vec![QuoteLevelPayload {
                bid_p: Some(dec!(10.4)),
                bid_v: Some(300),
                ask_p: Some(dec!(10.5)),
                ask_v: Some(100),
            }],
            ..Default::default()
        }))
    }

    async fn fetch_historical_bars(
        &self,
        symbol: &Symbol,
        frequency: Frequency,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BarPayload>, ProviderError> {
        let _guard = self.enter(&self.bar_calls, symbol.as_str()).await;
        self.bar_requests.lock().unwrap().push(BarRequest {
            symbol: symbol.to_string(),
            frequency,
            start,
            end,
        });
        if let Some(err) = &self.bars_error {
            return Err(err.clone());
        }
        Ok(vec![
            BarPayload {
                open: Some(dec!(10)),
                close: Some(dec!(10.2)),
                bob: Some(start),
                eob: Some(start + chrono::Duration::hours(1)),
                ..Default::default()
            },
            BarPayload {
                open: Some(dec!(10.2)),
                close: Some(dec!(10.4)),
                bob: Some(start + chrono::Duration::hours(1)),
                eob: Some(start + chrono::Duration::hours(2)),
                ..Default::default()
            },
        ])
    }

    async fn fetch_fundamentals(
        &self,
        symbol: &Symbol,
        _start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<FundamentalsPayload>, ProviderError> {
        let _guard = self.enter(&self.fundamentals_calls, symbol.as_str()).await;
        if let Some(err) = &self.fundamentals_error {
            return Err(err.clone());
        }
        Ok(Some(FundamentalsPayload {
            rpt_date: Some(end),
            revenue: Some(dec!(1000000)),
            net_profit: Some(dec!(120000)),
            ..Default::default()
        }))
    }

    async fn fetch_symbol_list(&self, _market: &str) -> Result<Vec<String>, ProviderError> {
        Ok(self
            .symbol_list
            .clone()
            .unwrap_or_else(|| vec!["EX.AAA".into(), "EX.BBB".into()]))
    }
}

/// 대기 시간을 줄인 테스트 설정.
pub fn test_config(allow_synthetic_fallback: bool) -> CollectorConfig {
    CollectorConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            retry_delay_ms: 10,
            inter_symbol_delay_ms: 0,
            allow_synthetic_fallback,
        },
        watchlist: vec![
            normalize_symbol("SHSE.600000").unwrap(),
            normalize_symbol("000001.SZ").unwrap(),
        ],
        ..Default::default()
    }
}

pub fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// 상하이 현지 시각.
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Shanghai
        .with_ymd_and_hms(y, m, d, h, min, s)
        .unwrap()
        .with_timezone(&Utc)
}
