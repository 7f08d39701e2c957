//! 수집 요청 및 결과 타입.
//!
//! 심볼 단위 수집은 예외가 아니라 데이터로 결과를 표현합니다:
//! - `FetchRequest` - 심볼 1개, 데이터 종류 1개에 대한 불변 요청
//! - `FetchOutcome` - `Success` / `EmptyResult` / `Failed`
//! - `FetchError` - 심볼 단위 에러 분류
//! - `FetchResult` - 심볼 문자열과 시도 횟수가 붙은 결과

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::provider::ProviderError;
use crate::types::{Frequency, Symbol};

/// 수집 데이터 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// 틱(체결) 시세
    Tick,
    /// OHLC K선
    Bar,
    /// 재무 데이터
    Fundamentals,
    /// 실시간 스냅샷
    Realtime,
}

impl DataKind {
    /// 전체 수집 시 실행 순서.
    pub const ALL: [DataKind; 4] = [
        DataKind::Tick,
        DataKind::Bar,
        DataKind::Fundamentals,
        DataKind::Realtime,
    ];

    /// 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Tick => "tick",
            DataKind::Bar => "bar",
            DataKind::Fundamentals => "fundamentals",
            DataKind::Realtime => "realtime",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tick" => Ok(DataKind::Tick),
            "bar" => Ok(DataKind::Bar),
            "fundamentals" => Ok(DataKind::Fundamentals),
            "realtime" => Ok(DataKind::Realtime),
            _ => Err(format!("Unknown data kind: {}", s)),
        }
    }
}

/// 조회 기간 (시작/종료 모두 선택).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeWindow {
    /// 시작 시각
    pub start: Option<DateTime<Utc>>,
    /// 종료 시각
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// 시작/종료가 모두 지정된 기간.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// `now` 기준 최근 `days`일.
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
        Self::between(now - Duration::days(days), now)
    }

    /// 비어 있는 값을 채워 (start, end)를 반환합니다.
    ///
    /// 종료가 없으면 `now`, 시작이 없으면 종료 기준 `default_lookback_days`일 전.
    pub fn resolve(
        &self,
        now: DateTime<Utc>,
        default_lookback_days: i64,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.end.unwrap_or(now);
        let start = self
            .start
            .unwrap_or(end - Duration::days(default_lookback_days));
        (start, end)
    }
}

/// 심볼 1개에 대한 수집 요청.
///
/// 호출마다 심볼별로 생성되며 생성 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// canonical 심볼
    pub symbol: Symbol,
    /// 데이터 종류
    pub kind: DataKind,
    /// 조회 기간
    pub window: Option<TimeWindow>,
    /// K선 주기 (Bar 전용)
    pub frequency: Option<Frequency>,
}

impl FetchRequest {
    /// 기간/주기 없는 요청을 생성합니다.
    pub fn new(symbol: Symbol, kind: DataKind) -> Self {
        Self {
            symbol,
            kind,
            window: None,
            frequency: None,
        }
    }

    /// 조회 기간을 설정합니다.
    pub fn with_window(mut self, window: Option<TimeWindow>) -> Self {
        self.window = window;
        self
    }

    /// K선 주기를 설정합니다.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }
}

/// 심볼 단위 수집 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    /// 잘못된 심볼 (제공자에 전달되지 않음)
    #[error("잘못된 심볼: {0}")]
    InvalidSymbol(String),

    /// 일시적 제공자 에러 (네트워크/타임아웃/요청 한도) - 재시도 대상
    #[error("일시적 제공자 에러: {0}")]
    ProviderTransient(String),

    /// 영구적 제공자 에러 (휴장/거래정지/미존재 심볼) - 재시도하지 않음
    #[error("영구적 제공자 에러: {0}")]
    ProviderPermanent(String),

    /// 모든 재시도 소진
    #[error("{attempts}회 시도 후 실패: {last_error}")]
    AllRetriesExhausted {
        /// 총 시도 횟수
        attempts: u32,
        /// 마지막 에러 메시지
        last_error: String,
    },

    /// 수집기 미연결
    #[error("{0} 수집기가 연결되지 않음")]
    NotConnected(DataKind),

    /// 수집기 미구성
    #[error("{0} 수집기를 사용할 수 없음")]
    CollectorUnavailable(DataKind),
}

impl FetchError {
    /// 제공자 에러를 심볼 단위 에러로 분류합니다.
    pub fn from_provider(err: &ProviderError) -> Self {
        if err.is_permanent() {
            FetchError::ProviderPermanent(err.to_string())
        } else {
            FetchError::ProviderTransient(err.to_string())
        }
    }

    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::ProviderTransient(_))
    }
}

/// 심볼 단위 수집 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome<T> {
    /// 성공 (레코드에는 출처 태그가 포함됨)
    Success { record: T },
    /// 제공자가 아무 데이터도 반환하지 않음
    EmptyResult,
    /// 실패
    Failed {
        /// 실패 원인
        error: FetchError,
        /// 재시도 한도를 소진했는지 여부
        retries_exhausted: bool,
    },
}

impl<T> FetchOutcome<T> {
    /// 성공 결과를 생성합니다.
    pub fn success(record: T) -> Self {
        FetchOutcome::Success { record }
    }

    /// 재시도 소진이 아닌 실패 결과를 생성합니다.
    pub fn failed(error: FetchError) -> Self {
        FetchOutcome::Failed {
            error,
            retries_exhausted: false,
        }
    }

    /// 성공 여부.
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// 실패 여부.
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed { .. })
    }

    /// 성공 레코드 참조.
    pub fn record(&self) -> Option<&T> {
        match self {
            FetchOutcome::Success { record } => Some(record),
            _ => None,
        }
    }

    /// 실패 에러 참조.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// 성공 레코드를 꺼냅니다.
    pub fn into_record(self) -> Option<T> {
        match self {
            FetchOutcome::Success { record } => Some(record),
            _ => None,
        }
    }
}

/// 심볼 문자열과 제공자 호출 횟수가 붙은 결과.
///
/// 수집기는 입력 심볼마다 정확히 하나의 `FetchResult`를 반환합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult<T> {
    /// 입력 심볼 (잘못된 형식이어도 그대로 보존)
    pub symbol: String,
    /// 제공자 호출 횟수 (검증 실패/미연결 시 0)
    pub attempts: u32,
    /// 결과
    pub outcome: FetchOutcome<T>,
}

impl<T> FetchResult<T> {
    /// 제공자를 호출하지 않은 실패 결과.
    pub fn rejected(symbol: impl Into<String>, error: FetchError) -> Self {
        Self {
            symbol: symbol.into(),
            attempts: 0,
            outcome: FetchOutcome::failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_data_kind_from_str() {
        assert_eq!("tick".parse::<DataKind>().unwrap(), DataKind::Tick);
        assert_eq!("BAR".parse::<DataKind>().unwrap(), DataKind::Bar);
        assert_eq!(
            "fundamentals".parse::<DataKind>().unwrap(),
            DataKind::Fundamentals
        );
        assert!("all".parse::<DataKind>().is_err());
    }

    #[test]
    fn test_window_resolve() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        let (start, end) = TimeWindow::default().resolve(now, 30);
        assert_eq!(end, now);
        assert_eq!(start, now - Duration::days(30));

        let fixed_end = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let window = TimeWindow {
            start: None,
            end: Some(fixed_end),
        };
        let (start, end) = window.resolve(now, 1);
        assert_eq!(end, fixed_end);
        assert_eq!(start, fixed_end - Duration::days(1));
    }

    #[test]
    fn test_fetch_error_classification() {
        let transient = FetchError::from_provider(&ProviderError::Timeout("5s".into()));
        assert!(transient.is_retryable());

        let permanent = FetchError::from_provider(&ProviderError::MarketClosed("closed".into()));
        assert!(matches!(permanent, FetchError::ProviderPermanent(_)));
        assert!(!permanent.is_retryable());
    }

    #[test]
    fn test_outcome_accessors() {
        let ok: FetchOutcome<u32> = FetchOutcome::success(7);
        assert!(ok.is_success());
        assert_eq!(ok.record(), Some(&7));

        let failed: FetchOutcome<u32> = FetchOutcome::failed(FetchError::InvalidSymbol("BAD".into()));
        assert!(failed.is_failed());
        assert!(failed.record().is_none());
        assert_eq!(
            failed.error(),
            Some(&FetchError::InvalidSymbol("BAD".into()))
        );
    }
}
