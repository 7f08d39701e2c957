//! 수집 결과 저장소.
//!
//! 저장은 수집 결과의 정확성과 무관하며, 저장 실패는 로그로만 남고
//! 재시도 판단이나 리포트에 영향을 주지 않습니다.

mod memory;
mod postgres;

pub use memory::MemorySink;
pub use postgres::PgDocumentSink;

use async_trait::async_trait;
use serde::Serialize;
use stockdata_core::{
    BarRecord, DataKind, FundamentalsRecord, Provenance, RealtimeRecord, TickRecord,
};
use uuid::Uuid;

use crate::coordinator::CollectionReport;
use crate::Result;

/// 저장할 레코드 문서 1건.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub kind: DataKind,
    pub symbol: String,
    pub provenance: Provenance,
    pub document: serde_json::Value,
}

/// 레코드를 저장 문서로 변환합니다.
pub trait IntoDocuments {
    fn documents(&self, kind: DataKind) -> Vec<StoredRecord>;
}

fn to_document<T: Serialize>(
    kind: DataKind,
    symbol: &str,
    provenance: Provenance,
    record: &T,
) -> Option<StoredRecord> {
    match serde_json::to_value(record) {
        Ok(document) => Some(StoredRecord {
            kind,
            symbol: symbol.to_string(),
            provenance,
            document,
        }),
        Err(e) => {
            tracing::warn!(kind = %kind, symbol = %symbol, error = %e, "레코드 직렬화 실패");
            None
        }
    }
}

macro_rules! single_document {
    ($ty:ty) => {
        impl IntoDocuments for $ty {
            fn documents(&self, kind: DataKind) -> Vec<StoredRecord> {
                to_document(kind, self.symbol.as_str(), self.provenance, self)
                    .into_iter()
                    .collect()
            }
        }
    };
}

single_document!(TickRecord);
single_document!(FundamentalsRecord);
single_document!(RealtimeRecord);

impl IntoDocuments for Vec<BarRecord> {
    fn documents(&self, kind: DataKind) -> Vec<StoredRecord> {
        self.iter()
            .filter_map(|bar| to_document(kind, bar.symbol.as_str(), bar.provenance, bar))
            .collect()
    }
}

/// 저장소 trait.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// 저장소 이름 (로깅용).
    fn name(&self) -> &str;

    /// 한 수집 실행의 레코드를 저장하고 저장된 건수를 반환합니다.
    async fn store_records(&self, run_id: Uuid, records: Vec<StoredRecord>) -> Result<usize>;

    /// 수집 리포트를 저장합니다.
    async fn store_report(&self, report: &CollectionReport) -> Result<()>;

    /// 연결을 해제합니다. 종료 시 한 번 호출됩니다.
    async fn close(&self) {}
}

/// 아무것도 저장하지 않는 저장소.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl StorageSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn store_records(&self, _run_id: Uuid, records: Vec<StoredRecord>) -> Result<usize> {
        tracing::trace!(count = records.len(), "저장소 미설정, 레코드 폐기");
        Ok(0)
    }

    async fn store_report(&self, _report: &CollectionReport) -> Result<()> {
        Ok(())
    }
}
