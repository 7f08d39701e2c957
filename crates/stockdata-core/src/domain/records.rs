//! 수집 레코드 타입.
//!
//! 이 모듈은 수집기별 canonical 레코드를 정의합니다:
//! - `TickRecord` - 틱 시세 (현재가, 누적 거래량, 1단계 호가)
//! - `BarRecord` - OHLC K선
//! - `FundamentalsRecord` - 재무 요약
//! - `RealtimeRecord` - 실시간 스냅샷 (등락, 5단계 호가)
//!
//! 모든 레코드는 `Provenance`를 가지며, 재시도 소진 후 대체된 합성
//! 레코드는 실제 제공자 데이터와 항상 구분됩니다.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Frequency, Symbol};

/// 레코드 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// 제공자가 반환한 실제 데이터
    Provider,
    /// 재시도 소진 후 생성된 합성 데이터
    Synthetic,
}

/// 수집 성공 페이로드 공통 인터페이스.
pub trait CollectedPayload {
    /// 레코드 수 (K선은 봉 개수).
    fn record_count(&self) -> usize;

    /// 합성 데이터 여부.
    fn is_synthetic(&self) -> bool;
}

/// 호가 1단계.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuoteLevel {
    /// 매수 호가
    pub bid_price: Decimal,
    /// 매수 잔량
    pub bid_volume: i64,
    /// 매도 호가
    pub ask_price: Decimal,
    /// 매도 잔량
    pub ask_volume: i64,
}

/// 틱 시세 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    pub symbol: Symbol,
    /// 종목명 (메타 조회 결과)
    pub name: Option<String>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub price: Decimal,
    pub cum_volume: i64,
    pub cum_amount: Decimal,
    pub last_volume: i64,
    pub last_amount: Decimal,
    /// 1단계 호가
    pub quotes: Vec<QuoteLevel>,
    pub created_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl TickRecord {
    /// 고정 값의 합성 틱을 생성합니다.
    pub fn synthetic(symbol: Symbol, now: DateTime<Utc>) -> Self {
        Self {
            symbol,
            name: None,
            open: Decimal::new(100, 0),
            high: Decimal::new(105, 0),
            low: Decimal::new(98, 0),
            price: Decimal::new(1025, 1),
            cum_volume: 1_000_000,
            cum_amount: Decimal::new(102_500_000, 0),
            last_volume: 1_000,
            last_amount: Decimal::new(102_500, 0),
            quotes: vec![QuoteLevel {
                bid_price: Decimal::new(1024, 1),
                bid_volume: 1_000,
                ask_price: Decimal::new(1026, 1),
                ask_volume: 1_000,
            }],
            created_at: now,
            provenance: Provenance::Synthetic,
        }
    }
}

impl CollectedPayload for TickRecord {
    fn record_count(&self) -> usize {
        1
    }

    fn is_synthetic(&self) -> bool {
        self.provenance == Provenance::Synthetic
    }
}

/// OHLC K선 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRecord {
    pub symbol: Symbol,
    pub frequency: Frequency,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub amount: Decimal,
    /// 봉 시작 시각
    pub bob: DateTime<Utc>,
    /// 봉 종료 시각
    pub eob: DateTime<Utc>,
    pub provenance: Provenance,
}

impl BarRecord {
    /// 기간 내 평일마다 일봉 1개씩 합성 K선을 생성합니다.
    ///
    /// 봉 시각은 `session_tz` 기준 09:30~15:00 입니다.
    pub fn synthetic_series<Tz: TimeZone>(
        symbol: &Symbol,
        frequency: Frequency,
        start: NaiveDate,
        end: NaiveDate,
        session_tz: &Tz,
    ) -> Vec<Self> {
        let (Some(open_time), Some(close_time)) = (
            NaiveTime::from_hms_opt(9, 30, 0),
            NaiveTime::from_hms_opt(15, 0, 0),
        ) else {
            return Vec::new();
        };

        let mut bars = Vec::new();
        let mut day = start;
        while day <= end {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                let bob = session_tz
                    .from_local_datetime(&day.and_time(open_time))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc));
                let eob = session_tz
                    .from_local_datetime(&day.and_time(close_time))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc));
                if let (Some(bob), Some(eob)) = (bob, eob) {
                    bars.push(Self {
                        symbol: symbol.clone(),
                        frequency,
                        open: Decimal::new(100, 0),
                        high: Decimal::new(105, 0),
                        low: Decimal::new(98, 0),
                        close: Decimal::new(102, 0),
                        volume: 10_000,
                        amount: Decimal::new(1_000_000, 0),
                        bob,
                        eob,
                        provenance: Provenance::Synthetic,
                    });
                }
            }
            day += Duration::days(1);
        }
        bars
    }
}

impl CollectedPayload for Vec<BarRecord> {
    fn record_count(&self) -> usize {
        self.len()
    }

    fn is_synthetic(&self) -> bool {
        self.iter().any(|bar| bar.provenance == Provenance::Synthetic)
    }
}

/// 재무 요약 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub symbol: Symbol,
    pub rpt_date: Option<NaiveDate>,
    pub pub_date: Option<NaiveDate>,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub total_equity: Decimal,
    pub revenue: Decimal,
    pub net_profit: Decimal,
    pub operating_cash_flow: Decimal,
    pub eps: Decimal,
    pub roe: Decimal,
    pub created_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl FundamentalsRecord {
    /// 모든 수치가 0인 합성 재무 레코드를 생성합니다.
    pub fn synthetic(symbol: Symbol, now: DateTime<Utc>) -> Self {
        Self {
            symbol,
            rpt_date: None,
            pub_date: None,
            total_assets: Decimal::ZERO,
            total_liabilities: Decimal::ZERO,
            total_equity: Decimal::ZERO,
            revenue: Decimal::ZERO,
            net_profit: Decimal::ZERO,
            operating_cash_flow: Decimal::ZERO,
            eps: Decimal::ZERO,
            roe: Decimal::ZERO,
            created_at: now,
            provenance: Provenance::Synthetic,
        }
    }
}

impl CollectedPayload for FundamentalsRecord {
    fn record_count(&self) -> usize {
        1
    }

    fn is_synthetic(&self) -> bool {
        self.provenance == Provenance::Synthetic
    }
}

/// 실시간 스냅샷 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeRecord {
    pub symbol: Symbol,
    pub price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub pre_close: Decimal,
    /// 전일 대비
    pub change: Decimal,
    /// 전일 대비 등락률 (%)
    pub change_pct: Decimal,
    pub cum_volume: i64,
    pub cum_amount: Decimal,
    /// 5단계 호가
    pub depth: Vec<QuoteLevel>,
    /// 매수/매도 잔량 비율
    pub bid_ask_ratio: Decimal,
    pub created_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl RealtimeRecord {
    /// 고정 값의 합성 스냅샷을 생성합니다.
    pub fn synthetic(symbol: Symbol, now: DateTime<Utc>) -> Self {
        Self {
            symbol,
            price: Decimal::new(1025, 1),
            open: Decimal::new(100, 0),
            high: Decimal::new(105, 0),
            low: Decimal::new(98, 0),
            pre_close: Decimal::new(100, 0),
            change: Decimal::new(25, 1),
            change_pct: Decimal::new(25, 1),
            cum_volume: 1_000_000,
            cum_amount: Decimal::new(102_500_000, 0),
            depth: Vec::new(),
            bid_ask_ratio: Decimal::ONE,
            created_at: now,
            provenance: Provenance::Synthetic,
        }
    }
}

impl CollectedPayload for RealtimeRecord {
    fn record_count(&self) -> usize {
        1
    }

    fn is_synthetic(&self) -> bool {
        self.provenance == Provenance::Synthetic
    }
}
