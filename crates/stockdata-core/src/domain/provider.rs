//! 시장 데이터 제공자 추상화.
//!
//! 원격 시장 데이터 서비스(심볼 조회, 시세/K선/재무/종목 목록)에 대한
//! 제공자 중립적인 인터페이스와 응답 페이로드를 정의합니다.
//! 페이로드의 숫자 필드는 모두 선택값이며, 누락 시 수집기가 0으로 채웁니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Frequency, Symbol};

// =============================================================================
// 에러 타입
// =============================================================================

/// 재시도해도 해결되지 않는 제공자 에러 메시지 시그니처 (소문자 비교).
pub const PERMANENT_ERROR_SIGNATURES: &[&str] = &[
    "market closed",
    "not in trading",
    "suspended",
    "unknown symbol",
    "获取orgcode错误",
    "停牌",
];

/// 시장 데이터 제공자 에러.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("요청 타임아웃: {0}")]
    Timeout(String),

    /// 요청 한도 초과
    #[error("요청 한도 초과: {0}")]
    RateLimited(String),

    /// 휴장
    #[error("휴장: {0}")]
    MarketClosed(String),

    /// 거래 정지
    #[error("거래 정지: {0}")]
    SymbolSuspended(String),

    /// 존재하지 않는 심볼
    #[error("알 수 없는 심볼: {0}")]
    UnknownSymbol(String),

    /// 응답 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 제공자 API 에러
    #[error("API 에러 {code:?}: {message}")]
    Api {
        /// 제공자 에러 코드
        code: Option<i32>,
        /// 에러 메시지
        message: String,
    },
}

impl ProviderError {
    /// 재시도해도 해결되지 않는 에러인지 확인합니다.
    ///
    /// 휴장/거래정지/미존재 심볼이거나, 메시지가
    /// [`PERMANENT_ERROR_SIGNATURES`] 중 하나와 일치하면 영구 에러입니다.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProviderError::MarketClosed(_)
            | ProviderError::SymbolSuspended(_)
            | ProviderError::UnknownSymbol(_) => true,
            ProviderError::Api { message, .. } => matches_permanent_signature(message),
            _ => false,
        }
    }
}

/// 메시지가 영구 에러 시그니처를 포함하는지 확인합니다.
pub fn matches_permanent_signature(message: &str) -> bool {
    let lower = message.to_lowercase();
    PERMANENT_ERROR_SIGNATURES
        .iter()
        .any(|signature| lower.contains(signature))
}

// =============================================================================
// 응답 페이로드
// =============================================================================

/// 종목 메타 정보.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolMeta {
    /// 제공자 심볼
    pub symbol: String,
    /// 종목명
    pub sec_name: Option<String>,
    /// 거래소
    pub exchange: Option<String>,
    /// 증권 유형 (예: CS)
    pub sec_type: Option<String>,
}

/// 호가 1단계.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteLevelPayload {
    /// 매수 호가
    pub bid_p: Option<Decimal>,
    /// 매수 잔량
    pub bid_v: Option<i64>,
    /// 매도 호가
    pub ask_p: Option<Decimal>,
    /// 매도 잔량
    pub ask_v: Option<i64>,
}

/// 실시간 시세 응답.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotePayload {
    /// 시가
    pub open: Option<Decimal>,
    /// 고가
    pub high: Option<Decimal>,
    /// 저가
    pub low: Option<Decimal>,
    /// 현재가
    pub price: Option<Decimal>,
    /// 전일 종가
    pub pre_close: Option<Decimal>,
    /// 누적 거래량
    pub cum_volume: Option<i64>,
    /// 누적 거래대금
    pub cum_amount: Option<Decimal>,
    /// 최근 체결량
    pub last_volume: Option<i64>,
    /// 최근 체결대금
    pub last_amount: Option<Decimal>,
    /// 호가 (1~5단계)
    pub quotes: Vec<QuoteLevelPayload>,
    /// 제공자 타임스탬프
    pub created_at: Option<DateTime<Utc>>,
}

/// K선 응답 1건.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarPayload {
    /// 시가
    pub open: Option<Decimal>,
    /// 고가
    pub high: Option<Decimal>,
    /// 저가
    pub low: Option<Decimal>,
    /// 종가
    pub close: Option<Decimal>,
    /// 거래량
    pub volume: Option<i64>,
    /// 거래대금
    pub amount: Option<Decimal>,
    /// 봉 시작 시각
    pub bob: Option<DateTime<Utc>>,
    /// 봉 종료 시각
    pub eob: Option<DateTime<Utc>>,
}

/// 재무 데이터 응답 (재무상태표/손익계산서/현금흐름표 요약).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalsPayload {
    /// 보고 기준일
    pub rpt_date: Option<NaiveDate>,
    /// 공시일
    pub pub_date: Option<NaiveDate>,
    /// 총자산
    pub total_assets: Option<Decimal>,
    /// 총부채
    pub total_liabilities: Option<Decimal>,
    /// 자본총계
    pub total_equity: Option<Decimal>,
    /// 매출액
    pub revenue: Option<Decimal>,
    /// 순이익
    pub net_profit: Option<Decimal>,
    /// 영업활동 현금흐름
    pub operating_cash_flow: Option<Decimal>,
    /// 주당순이익
    pub eps: Option<Decimal>,
    /// 자기자본이익률
    pub roe: Option<Decimal>,
}

// =============================================================================
// MarketDataProvider Trait
// =============================================================================

/// 시장 데이터 제공자 trait.
///
/// 각 메서드는 원격 호출 1회에 대응합니다. 재시도와 대체 데이터 처리는
/// 호출하는 쪽(수집기)의 책임이며, 구현체는 에러를 그대로 반환해야 합니다.
///
/// # 구현 예시
///
/// ```ignore
/// pub struct MyProvider {
///     client: reqwest::Client,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn name(&self) -> &str {
///         "my-provider"
///     }
///
///     async fn lookup_symbol_meta(&self, symbol: &Symbol) -> Result<Option<SymbolMeta>, ProviderError> {
///         // API 호출 및 변환
///     }
///
///     // ... 나머지 메서드 구현
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 제공자 이름 (로깅용).
    fn name(&self) -> &str;

    /// 연결 확인.
    ///
    /// 수집기 생성 시 한 번 호출되어 연결 플래그를 결정합니다.
    async fn check_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// 종목 메타 정보 조회. 종목이 없으면 `None`.
    async fn lookup_symbol_meta(&self, symbol: &Symbol)
        -> Result<Option<SymbolMeta>, ProviderError>;

    /// 실시간 시세 조회. 시세가 없으면 `None`.
    async fn fetch_realtime_quote(&self, symbol: &Symbol)
        -> Result<Option<QuotePayload>, ProviderError>;

    /// 과거 K선 조회.
    async fn fetch_historical_bars(
        &self,
        symbol: &Symbol,
        frequency: Frequency,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BarPayload>, ProviderError>;

    /// 재무 데이터 조회. 기간 내 보고서가 없으면 `None`.
    async fn fetch_fundamentals(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<FundamentalsPayload>, ProviderError>;

    /// 시장(거래소)별 종목 목록 조회.
    async fn fetch_symbol_list(&self, market: &str) -> Result<Vec<String>, ProviderError>;
}
