//! 에러 타입 정의.
//!
//! 심볼 단위 수집 실패는 `FetchOutcome`으로 데이터화되므로 여기에 포함되지
//! 않습니다. 이 타입은 초기화, 저장소, 스케줄러 수준의 실패만 표현합니다.

use stockdata_core::{CoreError, ProviderError};
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 저장소 에러
    #[error("Storage error: {0}")]
    Storage(String),

    /// 제공자 초기화/조회 에러
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// 스케줄러 상태 에러
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<sqlx::Error> for CollectorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<config::ConfigError> for CollectorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<CoreError> for CollectorError {
    fn from(err: CoreError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
