//! 시장 데이터 수집을 위한 도메인 모델.

mod fetch;
mod provider;
mod records;

pub use fetch::*;
pub use provider::*;
pub use records::*;
