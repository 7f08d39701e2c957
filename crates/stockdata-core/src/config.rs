//! 설정 관리.
//!
//! 이 모듈은 수집 시스템의 설정을 정의하고 관리합니다.
//! 로드 순서는 기본값 → TOML 파일 → `STOCKDATA__SECTION__KEY` 환경 변수입니다.

use chrono::{NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 재시도 정책
    pub retry: RetryPolicy,
    /// 스케줄러 설정
    pub scheduler: SchedulerConfig,
    /// 거래 세션 설정
    pub session: SessionConfig,
    /// 관심 종목
    pub watchlist: WatchlistConfig,
    /// 수동 수집 기본값
    pub collection: CollectionConfig,
    /// 시장 데이터 제공자 설정
    pub provider: ProviderConfig,
    /// 저장소 설정
    pub storage: StorageConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 재시도 정책.
///
/// 런타임에는 읽기 전용이며, 동시 실행되는 수집 간에 값으로 복사되어 공유됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 재시도 간 대기 (밀리초)
    pub retry_delay_ms: u64,
    /// 서로 다른 심볼 호출 사이 대기 (밀리초, 요청 한도 대응용)
    pub inter_symbol_delay_ms: u64,
    /// 재시도 소진 시 합성 데이터로 대체할지 여부
    pub allow_synthetic_fallback: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
            inter_symbol_delay_ms: 100,
            allow_synthetic_fallback: false,
        }
    }
}

impl RetryPolicy {
    /// 실제 시도 횟수. 0으로 설정되어도 최소 1회는 시도합니다.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// 재시도 간 대기 시간.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// 심볼 간 대기 시간.
    pub fn inter_symbol_delay(&self) -> Duration {
        Duration::from_millis(self.inter_symbol_delay_ms)
    }
}

/// 스케줄러 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 워커 풀 크기
    pub worker_count: usize,
    /// 트리거 확인 주기 (초, 최소 1초)
    pub poll_interval_secs: u64,
    /// 종료 시 진행 중인 작업 대기 한도 (초)
    pub drain_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            poll_interval_secs: 1,
            drain_timeout_secs: 30,
        }
    }
}

impl SchedulerConfig {
    /// 트리거 확인 주기. 1초보다 짧을 수 없습니다.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// 종료 대기 한도.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// 거래 세션 설정.
///
/// 시각은 모두 `HH:MM` 형식의 거래소 현지 시각입니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// IANA 시간대 이름
    pub timezone: String,
    /// 오전장 시작
    pub morning_open: String,
    /// 오전장 종료
    pub morning_close: String,
    /// 오후장 시작
    pub afternoon_open: String,
    /// 오후장 종료
    pub afternoon_close: String,
    /// 휴장일 (YYYY-MM-DD)
    pub holidays: Vec<NaiveDate>,
    /// 트리거 시각
    pub triggers: TriggerTimes,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Shanghai".to_string(),
            morning_open: "09:30".to_string(),
            morning_close: "11:30".to_string(),
            afternoon_open: "13:00".to_string(),
            afternoon_close: "15:00".to_string(),
            holidays: Vec::new(),
            triggers: TriggerTimes::default(),
        }
    }
}

impl SessionConfig {
    /// 시간대를 파싱합니다.
    pub fn tz(&self) -> CoreResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| CoreError::Config(format!("잘못된 시간대 '{}': {}", self.timezone, e)))
    }
}

/// 트리거별 현지 시각.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TriggerTimes {
    pub pre_market: String,
    pub market_open: String,
    pub midday: String,
    pub market_close: String,
    pub post_market: String,
    pub daily_fundamentals: String,
    pub weekly_backfill: String,
    /// 주간 백필 요일 (예: "sun")
    pub weekly_backfill_day: String,
}

impl Default for TriggerTimes {
    fn default() -> Self {
        Self {
            pre_market: "09:15".to_string(),
            market_open: "09:30".to_string(),
            midday: "13:00".to_string(),
            market_close: "15:00".to_string(),
            post_market: "15:30".to_string(),
            daily_fundamentals: "20:00".to_string(),
            weekly_backfill: "02:00".to_string(),
            weekly_backfill_day: "sun".to_string(),
        }
    }
}

impl TriggerTimes {
    /// 주간 백필 요일을 파싱합니다.
    pub fn backfill_weekday(&self) -> CoreResult<Weekday> {
        self.weekly_backfill_day.parse::<Weekday>().map_err(|_| {
            CoreError::Config(format!("잘못된 요일: {}", self.weekly_backfill_day))
        })
    }
}

/// `HH:MM` 또는 `HH:MM:SS` 형식의 시각을 파싱합니다.
pub fn parse_clock(value: &str) -> CoreResult<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| CoreError::Config(format!("잘못된 시각: {}", value)))
}

/// 관심 종목 설정.
///
/// 설정 파일에는 느슨한 형식(`600000.SH`, `000001`)도 허용되며,
/// 로드 시점에 한 번 canonical 형식으로 정규화됩니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchlistConfig {
    pub symbols: Vec<String>,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            symbols: [
                "SZSE.000001",
                "SZSE.000002",
                "SHSE.600000",
                "SHSE.600036",
                "SHSE.600519",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// 수동 수집 기본 기간 및 주기.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// 틱 기본 조회 기간 (일)
    pub tick_lookback_days: i64,
    /// K선 기본 조회 기간 (일)
    pub bar_lookback_days: i64,
    /// 재무 기본 조회 기간 (일)
    pub fundamentals_lookback_days: i64,
    /// K선 기본 주기
    pub default_frequency: String,
    /// 주간 백필 틱 기간 (일)
    pub backfill_tick_days: i64,
    /// 주간 백필 K선 기간 (일)
    pub backfill_bar_days: i64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            tick_lookback_days: 1,
            bar_lookback_days: 30,
            fundamentals_lookback_days: 365,
            default_frequency: "1d".to_string(),
            backfill_tick_days: 7,
            backfill_bar_days: 30,
        }
    }
}

/// 시장 데이터 제공자 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// REST API 기본 URL
    pub base_url: String,
    /// API 토큰
    pub token: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            token: None,
            timeout_secs: 10,
        }
    }
}

impl ProviderConfig {
    /// 요청 타임아웃.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// 저장소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// PostgreSQL 연결 URL. 없으면 저장하지 않습니다.
    pub database_url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        Self::build(Some(path.as_ref()))
    }

    /// 환경 변수만으로 설정을 로드합니다 (파일 없음).
    pub fn from_env() -> CoreResult<Self> {
        Self::build(None)
    }

    fn build(path: Option<&Path>) -> CoreResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("STOCKDATA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("watchlist.symbols")
                    .with_list_parse_key("session.holidays")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// 설정 값의 형식을 검증합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.scheduler.worker_count == 0 {
            return Err(CoreError::Config("worker_count는 1 이상이어야 합니다".into()));
        }

        self.session.tz()?;
        let session = &self.session;
        let triggers = &session.triggers;
        for value in [
            &session.morning_open,
            &session.morning_close,
            &session.afternoon_open,
            &session.afternoon_close,
            &triggers.pre_market,
            &triggers.market_open,
            &triggers.midday,
            &triggers.market_close,
            &triggers.post_market,
            &triggers.daily_fundamentals,
            &triggers.weekly_backfill,
        ] {
            parse_clock(value)?;
        }
        triggers.backfill_weekday()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.retry_delay(), Duration::from_millis(1000));
        assert_eq!(config.retry.inter_symbol_delay(), Duration::from_millis(100));
        assert!(!config.retry.allow_synthetic_fallback);
        assert_eq!(config.scheduler.worker_count, 4);
        assert_eq!(config.watchlist.symbols.len(), 5);
        assert_eq!(config.session.tz().unwrap(), chrono_tz::Asia::Shanghai);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_poll_interval_clamped() {
        let config = SchedulerConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("09:15").unwrap(), NaiveTime::from_hms_opt(9, 15, 0).unwrap());
        assert_eq!(parse_clock("15:00:30").unwrap(), NaiveTime::from_hms_opt(15, 0, 30).unwrap());
        assert!(parse_clock("25:00").is_err());
        assert!(parse_clock("noon").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.session.timezone = "Mars/Olympus".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.triggers.weekly_backfill_day = "someday".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scheduler.worker_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("stockdata-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[retry]
max_attempts = 5
allow_synthetic_fallback = true

[scheduler]
worker_count = 2

[session]
holidays = ["2024-10-01"]

[watchlist]
symbols = ["600000.SH"]
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.retry.allow_synthetic_fallback);
        // 지정하지 않은 값은 기본값 유지
        assert_eq!(config.retry.retry_delay_ms, 1000);
        assert_eq!(config.scheduler.worker_count, 2);
        assert_eq!(
            config.session.holidays,
            vec![NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()]
        );
        assert_eq!(config.watchlist.symbols, vec!["600000.SH".to_string()]);
    }
}
