//! 시장 데이터 제공자 구현.

pub mod http;

pub use http::HttpMarketDataProvider;
