//! JSON over HTTP 시장 데이터 제공자.
//!
//! # 엔드포인트
//!
//! | 메서드 | 경로 |
//! |--------|------|
//! | 연결 확인 | `GET /health` |
//! | 종목 메타 | `GET /symbols/{symbol}` |
//! | 실시간 시세 | `GET /quote?symbol=` |
//! | 과거 K선 | `GET /bars?symbol=&frequency=&start=&end=` (RFC 3339) |
//! | 재무 | `GET /fundamentals?symbol=&start=&end=` (YYYY-MM-DD) |
//! | 종목 목록 | `GET /markets/{market}/symbols` |
//!
//! 404와 `null` 본문은 "데이터 없음"으로 처리합니다. 에러 응답 본문이
//! `{"code": .., "message": ..}` 형식이면 메시지로 영구 에러 여부를 판단합니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use stockdata_core::{
    BarPayload, Frequency, FundamentalsPayload, MarketDataProvider, ProviderConfig, ProviderError,
    QuotePayload, Symbol, SymbolMeta,
};

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<i32>,
    message: String,
}

/// HTTP 시장 데이터 제공자.
#[derive(Debug, Clone)]
pub struct HttpMarketDataProvider {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpMarketDataProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "제공자 요청");

        let mut request = self.client.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }

        serde_json::from_slice::<Option<T>>(&body)
            .map_err(|e| ProviderError::Parse(format!("{}: {}", path, e)))
    }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else if err.is_decode() {
        ProviderError::Parse(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited(status.to_string());
    }

    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(api) => ProviderError::Api {
            code: api.code,
            message: api.message,
        },
        Err(_) => ProviderError::Api {
            code: Some(i32::from(status.as_u16())),
            message: String::from_utf8_lossy(body).trim().to_string(),
        },
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn check_connection(&self) -> Result<(), ProviderError> {
        self.get::<serde_json::Value>("/health", &[])
            .await?
            .map(|_| ())
            .ok_or_else(|| ProviderError::Network(format!("{}/health 응답 없음", self.base_url)))
    }

    async fn lookup_symbol_meta(&self, symbol: &Symbol) -> Result<Option<SymbolMeta>, ProviderError> {
        self.get(&format!("/symbols/{}", symbol), &[]).await
    }

    async fn fetch_realtime_quote(&self, symbol: &Symbol) -> Result<Option<QuotePayload>, ProviderError> {
        self.get("/quote", &[("symbol", symbol.to_string())]).await
    }

    async fn fetch_historical_bars(
        &self,
        symbol: &Symbol,
        frequency: Frequency,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BarPayload>, ProviderError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("frequency", frequency.as_str().to_string()),
            ("start", rfc3339(start)),
            ("end", rfc3339(end)),
        ];
        Ok(self.get::<Vec<BarPayload>>("/bars", &query).await?.unwrap_or_default())
    }

    async fn fetch_fundamentals(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<FundamentalsPayload>, ProviderError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("start", start.format("%Y-%m-%d").to_string()),
            ("end", end.format("%Y-%m-%d").to_string()),
        ];
        self.get("/fundamentals", &query).await
    }

    async fn fetch_symbol_list(&self, market: &str) -> Result<Vec<String>, ProviderError> {
        Ok(self
            .get::<Vec<String>>(&format!("/markets/{}/symbols", market), &[])
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn provider(url: &str) -> HttpMarketDataProvider {
        let config = ProviderConfig {
            base_url: format!("{}/", url),
            token: Some("secret".into()),
            ..Default::default()
        };
        HttpMarketDataProvider::new(&config).unwrap()
    }

    fn symbol() -> Symbol {
        Symbol::parse("SHSE.600519").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_quote() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::UrlEncoded("symbol".into(), "SHSE.600519".into()))
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"price": "1688.5", "pre_close": "1670", "cum_volume": 1200}"#)
            .create_async()
            .await;

        let quote = provider(&server.url())
            .fetch_realtime_quote(&symbol())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(quote.price, Some(dec!(1688.5)));
        assert_eq!(quote.cum_volume, Some(1200));
        assert!(quote.open.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/symbols/SHSE.600519")
            .with_status(404)
            .create_async()
            .await;

        let meta = provider(&server.url()).lookup_symbol_meta(&symbol()).await.unwrap();
        assert!(meta.is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let err = provider(&server.url())
            .fetch_realtime_quote(&symbol())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited(_)));
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_market_closed_body_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/bars")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("frequency".into(), "1h".into()),
                Matcher::UrlEncoded("start".into(), "2024-06-03T01:30:00Z".into()),
            ]))
            .with_status(400)
            .with_body(r#"{"code": 1020, "message": "market closed"}"#)
            .create_async()
            .await;

        let start = Utc.with_ymd_and_hms(2024, 6, 3, 1, 30, 0).unwrap();
        let err = provider(&server.url())
            .fetch_historical_bars(&symbol(), Frequency::H1, start, start + chrono::Duration::hours(6))
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_server_error_without_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/markets/SHSE/symbols")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let err = provider(&server.url()).fetch_symbol_list("SHSE").await.unwrap_err();
        match err {
            ProviderError::Api { code, message } => {
                assert_eq!(code, Some(503));
                assert_eq!(message, "unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fundamentals")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let err = provider(&server.url())
            .fetch_fundamentals(&symbol(), day, day)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        let err = HttpMarketDataProvider::new(&config)
            .unwrap()
            .check_connection()
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }
}
