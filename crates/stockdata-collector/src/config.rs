//! 환경변수 기반 설정 모듈.
//!
//! `STOCKDATA_CONFIG`가 지정되면 해당 TOML 파일을 먼저 읽고
//! (`STOCKDATA__SECTION__KEY` 오버라이드 포함), 이후 평면 환경변수
//! (`RETRY_MAX_ATTEMPTS`, `WORKER_COUNT`, `WATCHLIST` 등)를 적용합니다.

use chrono::NaiveDate;
use stockdata_core::{
    normalize_symbol, AppConfig, CollectionConfig, LoggingConfig, ProviderConfig, RetryPolicy,
    SchedulerConfig, SessionConfig, StorageConfig, Symbol,
};

use crate::Result;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 재시도 정책
    pub retry: RetryPolicy,
    /// 스케줄러 설정
    pub scheduler: SchedulerConfig,
    /// 거래 세션 설정
    pub session: SessionConfig,
    /// 수동 수집 기본값
    pub collection: CollectionConfig,
    /// 제공자 설정
    pub provider: ProviderConfig,
    /// 저장소 설정
    pub storage: StorageConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 정규화된 관심 종목 (중복 제거, 입력 순서 유지)
    pub watchlist: Vec<Symbol>,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut app = match std::env::var("STOCKDATA_CONFIG") {
            Ok(path) => {
                tracing::debug!(path = %path, "설정 파일 로드");
                AppConfig::load(&path)?
            }
            Err(_) => AppConfig::from_env()?,
        };

        apply_env_overrides(&mut app);
        Self::from_app(app)
    }

    /// 로드된 설정을 검증하고 관심 종목을 정규화합니다.
    pub fn from_app(app: AppConfig) -> Result<Self> {
        app.validate()?;

        let watchlist = normalize_watchlist(&app.watchlist.symbols);
        if watchlist.is_empty() {
            tracing::warn!("관심 종목이 비어 있습니다");
        }

        Ok(Self {
            retry: app.retry,
            scheduler: app.scheduler,
            session: app.session,
            collection: app.collection,
            provider: app.provider,
            storage: app.storage,
            logging: app.logging,
            watchlist,
        })
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let app = AppConfig::default();
        Self {
            watchlist: normalize_watchlist(&app.watchlist.symbols),
            retry: app.retry,
            scheduler: app.scheduler,
            session: app.session,
            collection: app.collection,
            provider: app.provider,
            storage: app.storage,
            logging: app.logging,
        }
    }
}

/// 관심 종목을 canonical 형식으로 정규화합니다.
///
/// 정규화할 수 없는 항목은 경고 후 제외합니다.
pub fn normalize_watchlist(raw: &[String]) -> Vec<Symbol> {
    let mut symbols: Vec<Symbol> = Vec::with_capacity(raw.len());
    for entry in raw {
        match normalize_symbol(entry) {
            Ok(symbol) => {
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
            Err(e) => {
                tracing::warn!(symbol = %entry, error = %e, "관심 종목 정규화 실패, 제외");
            }
        }
    }
    symbols
}

fn apply_env_overrides(app: &mut AppConfig) {
    let retry = &mut app.retry;
    retry.max_attempts = env_var_parse("RETRY_MAX_ATTEMPTS", retry.max_attempts);
    retry.retry_delay_ms = env_var_parse("RETRY_DELAY_MS", retry.retry_delay_ms);
    retry.inter_symbol_delay_ms = env_var_parse("INTER_SYMBOL_DELAY_MS", retry.inter_symbol_delay_ms);
    retry.allow_synthetic_fallback =
        env_var_bool("SYNTHETIC_FALLBACK", retry.allow_synthetic_fallback);

    let scheduler = &mut app.scheduler;
    scheduler.worker_count = env_var_parse("WORKER_COUNT", scheduler.worker_count);
    scheduler.poll_interval_secs = env_var_parse("POLL_INTERVAL_SECS", scheduler.poll_interval_secs);
    scheduler.drain_timeout_secs = env_var_parse("DRAIN_TIMEOUT_SECS", scheduler.drain_timeout_secs);

    if let Ok(tz) = std::env::var("TIMEZONE") {
        app.session.timezone = tz;
    }
    if let Some(holidays) = env_var_list("HOLIDAYS") {
        app.session.holidays = holidays
            .iter()
            .filter_map(|d| match NaiveDate::parse_from_str(d, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    tracing::warn!(value = %d, "잘못된 휴장일 형식, 무시");
                    None
                }
            })
            .collect();
    }
    if let Some(symbols) = env_var_list("WATCHLIST") {
        app.watchlist.symbols = symbols;
    }

    if let Ok(url) = std::env::var("PROVIDER_BASE_URL") {
        app.provider.base_url = url;
    }
    if let Ok(token) = std::env::var("PROVIDER_TOKEN") {
        app.provider.token = Some(token);
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        app.storage.database_url = Some(url);
    }
    if let Ok(format) = std::env::var("LOG_FORMAT") {
        app.logging.format = format;
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// 쉼표로 구분된 환경변수 목록
fn env_var_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
