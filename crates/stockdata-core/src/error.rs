//! 수집 시스템의 공통 에러 타입.
//!
//! 심볼 단위 수집 에러는 [`crate::FetchError`]로 데이터화되며,
//! 이 모듈의 에러는 설정/초기화 단계에서만 사용됩니다.

use thiserror::Error;

use crate::types::SymbolError;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 심볼 에러
    #[error("심볼 에러: {0}")]
    Symbol(#[from] SymbolError),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_error_conversion() {
        let err: CoreError = SymbolError::Malformed("BAD".into()).into();
        assert!(matches!(err, CoreError::Symbol(_)));
        assert!(err.to_string().contains("BAD"));
    }
}
