//! 메모리 저장소 (테스트/드라이런용).

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{StorageSink, StoredRecord};
use crate::coordinator::CollectionReport;
use crate::Result;

/// 저장된 내용을 메모리에 보관하는 저장소.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Uuid, StoredRecord)>>,
    reports: Mutex<Vec<CollectionReport>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 레코드 사본.
    pub async fn records(&self) -> Vec<(Uuid, StoredRecord)> {
        self.records.lock().await.clone()
    }

    /// 저장된 리포트 사본.
    pub async fn reports(&self) -> Vec<CollectionReport> {
        self.reports.lock().await.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn store_records(&self, run_id: Uuid, records: Vec<StoredRecord>) -> Result<usize> {
        let count = records.len();
        self.records
            .lock()
            .await
            .extend(records.into_iter().map(|record| (run_id, record)));
        Ok(count)
    }

    async fn store_report(&self, report: &CollectionReport) -> Result<()> {
        self.reports.lock().await.push(report.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
