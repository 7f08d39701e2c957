//! StockData collector CLI.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use stockdata_collector::coordinator::sync_symbol_list;
use stockdata_collector::{CollectorConfig, CollectorContext, TaskKind};
use stockdata_core::{init_logging, normalize_symbol, LogConfig, TimeWindow};

#[derive(Parser)]
#[command(name = "stockdata-collector")]
#[command(about = "StockData market data collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error). 생략 시 설정값 사용
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 수동 수집 실행 후 리포트를 JSON으로 출력
    Run {
        /// tick, bar, fundamentals, realtime, all
        #[arg(long, default_value = "all")]
        kind: TaskKind,

        /// 수집할 심볼 (쉼표로 구분, 예: "600519.SH,000001")
        #[arg(long)]
        symbols: Option<String>,

        /// 시작일 (YYYY-MM-DD, 세션 시간대 기준)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// 종료일 (YYYY-MM-DD, 해당일 포함)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// K선 주기 (1m, 5m, 15m, 30m, 1h, 1d, 1w, 1M)
        #[arg(long)]
        frequency: Option<String>,
    },

    /// 데몬 모드: 세션 스케줄러 실행 (Ctrl-C로 종료)
    Daemon,

    /// 스케줄러 상태와 다음 트리거 시각 출력
    Status,

    /// 시장별 종목 목록 출력
    Symbols {
        /// 거래소 (SHSE, SZSE)
        #[arg(long)]
        market: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 설정 로드
    let config = CollectorConfig::from_env()?;

    // 로깅 초기화
    let mut log_config = LogConfig::from(&config.logging);
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    init_logging(log_config)?;

    tracing::info!("StockData Collector 시작");

    let context = CollectorContext::from_config(config).await?;

    match cli.command {
        Commands::Run {
            kind,
            symbols,
            start,
            end,
            frequency,
        } => {
            let tz = context.scheduler().calendar().timezone();
            let symbols = symbols.map(|raw| parse_symbol_args(&raw));
            let window = if start.is_some() || end.is_some() {
                Some(TimeWindow {
                    start: start.and_then(|d| local_instant(&tz, d, NaiveTime::MIN)),
                    end: end.and_then(|d| d.succ_opt()).and_then(|d| local_instant(&tz, d, NaiveTime::MIN)),
                })
            } else {
                None
            };

            let report = context.scheduler().run_task(kind, symbols, window, frequency).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Daemon => {
            context.scheduler().start()?;
            tracing::info!("=== 데몬 모드 시작 ===");

            let shutdown = context.scheduler().shutdown_token();
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("종료 신호 수신, 데몬 종료 중...");
                }
                _ = shutdown.cancelled() => {}
            }
        }
        Commands::Status => {
            let status = context.scheduler().status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Symbols { market } => {
            let symbols = sync_symbol_list(context.provider(), &market).await?;
            for symbol in &symbols {
                println!("{}", symbol);
            }
        }
    }

    let drained = context.shutdown().await;
    tracing::info!(drained, "StockData Collector 종료");

    Ok(())
}

/// CLI 심볼 인자를 정규화합니다. 정규화할 수 없는 값은 그대로 전달되어
/// 리포트에서 잘못된 심볼로 집계됩니다.
fn parse_symbol_args(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match normalize_symbol(s) {
            Ok(symbol) => symbol.to_string(),
            Err(_) => s.to_string(),
        })
        .collect()
}

fn local_instant(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
