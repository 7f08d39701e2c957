//! # StockData Core
//!
//! 시장 데이터 수집 시스템의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 수집기 전반에서 사용되는 기본 타입을 제공합니다:
//! - 거래소 접두어 심볼 (`EXCH.CODE`) 및 정규화
//! - K선 주기(frequency) 화이트리스트
//! - 틱/K선/재무/실시간 레코드와 출처(provenance) 태그
//! - 수집 요청/결과 타입과 에러 분류
//! - 시장 데이터 제공자 trait
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
