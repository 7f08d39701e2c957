//! PostgreSQL JSONB 문서 저장소.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use stockdata_core::StorageConfig;
use uuid::Uuid;

use super::{StorageSink, StoredRecord};
use crate::coordinator::CollectionReport;
use crate::{CollectorError, Result};

const CREATE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS market_records (
    id BIGSERIAL PRIMARY KEY,
    run_id UUID NOT NULL,
    kind TEXT NOT NULL,
    symbol TEXT NOT NULL,
    provenance TEXT NOT NULL,
    document JSONB NOT NULL,
    stored_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

const CREATE_RECORDS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_market_records_symbol_kind ON market_records (symbol, kind)";

const CREATE_REPORTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS collection_reports (
    run_id UUID PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL,
    status TEXT NOT NULL,
    report JSONB NOT NULL
)"#;

/// 수집 레코드와 리포트를 JSONB 문서로 저장하는 저장소.
#[derive(Clone)]
pub struct PgDocumentSink {
    pool: PgPool,
}

impl PgDocumentSink {
    /// 데이터베이스에 연결하고 테이블을 준비합니다.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| CollectorError::Config("DATABASE_URL이 설정되지 않았습니다".into()))?;

        tracing::info!("데이터베이스 연결 중...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await?;
        tracing::info!("데이터베이스 연결 성공");

        let sink = Self::from_pool(pool);
        sink.ensure_schema().await?;
        Ok(sink)
    }

    /// 기존 연결 풀에서 생성합니다.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 테이블이 없으면 생성합니다.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in [CREATE_RECORDS_TABLE, CREATE_RECORDS_INDEX, CREATE_REPORTS_TABLE] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageSink for PgDocumentSink {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn store_records(&self, run_id: Uuid, records: Vec<StoredRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let count = records.len();
        for record in records {
            let provenance = serde_json::to_value(record.provenance)?;
            sqlx::query(
                "INSERT INTO market_records (run_id, kind, symbol, provenance, document)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(run_id)
            .bind(record.kind.as_str())
            .bind(&record.symbol)
            .bind(provenance.as_str().unwrap_or_default())
            .bind(Json(&record.document))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(run_id = %run_id, count = count, "레코드 저장 완료");
        Ok(count)
    }

    async fn store_report(&self, report: &CollectionReport) -> Result<()> {
        sqlx::query(
            "INSERT INTO collection_reports (run_id, created_at, status, report)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (run_id) DO UPDATE
             SET status = EXCLUDED.status, report = EXCLUDED.report",
        )
        .bind(report.run_id)
        .bind(report.timestamp)
        .bind(report.collection_status.as_str())
        .bind(Json(report))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL 연결 풀 종료");
    }
}
