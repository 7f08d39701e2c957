//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use stockdata_core::{CollectedPayload, DataKind, FetchOutcome, FetchResult, Frequency};

/// 데이터 종류별 수집 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSummary {
    /// 요청 심볼 수
    pub total: usize,
    /// 실제 데이터 수집 성공
    pub succeeded: usize,
    /// 합성 데이터로 대체된 성공
    pub synthetic: usize,
    /// 실패
    pub failed: usize,
    /// 빈 데이터 (조회 성공, 데이터 없음)
    pub empty: usize,
    /// 수집된 실제 레코드 수 (합성 제외)
    pub records: usize,
    /// 대표 에러 메시지 (첫 번째 실패)
    pub error_sample: Option<String>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
    /// K선 주기별 통계. 종류 단위 집계는 심볼당 1건으로 줄여 계산합니다.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub frequencies: BTreeMap<Frequency, KindSummary>,
}

/// 심볼 하나의 결과 우선순위 (실제 > 합성 > 빈 결과 > 실패).
fn outcome_rank<T: CollectedPayload>(outcome: &FetchOutcome<T>) -> u8 {
    match outcome {
        FetchOutcome::Success { record } if record.record_count() == 0 => 1,
        FetchOutcome::Success { record } if record.is_synthetic() => 2,
        FetchOutcome::Success { .. } => 3,
        FetchOutcome::EmptyResult => 1,
        FetchOutcome::Failed { .. } => 0,
    }
}

impl KindSummary {
    /// 결과 목록을 통계로 집계합니다.
    pub fn from_results<T: CollectedPayload>(results: &[FetchResult<T>]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            summary.record(&result.outcome);
        }
        summary
    }

    /// 여러 주기로 수집한 결과를 집계합니다.
    ///
    /// 모든 배치는 같은 심볼 목록을 같은 순서로 수집한 결과여야 합니다. 종류 단위
    /// 통계는 심볼마다 가장 좋은 결과 1건으로 계산하므로 `total`은 요청 심볼 수와
    /// 같고, `records`는 모든 주기의 실제 레코드 합계입니다.
    pub fn from_frequency_batches<T: CollectedPayload>(
        batches: &[(Frequency, Vec<FetchResult<T>>)],
    ) -> Self {
        let total = batches.iter().map(|(_, results)| results.len()).max().unwrap_or(0);
        let mut summary = Self {
            total,
            ..Default::default()
        };

        for idx in 0..total {
            let best = batches
                .iter()
                .filter_map(|(_, results)| results.get(idx))
                .map(|result| &result.outcome)
                .max_by_key(|outcome| outcome_rank(*outcome));
            if let Some(outcome) = best {
                summary.record(outcome);
            }
        }

        for (frequency, results) in batches {
            summary
                .frequencies
                .entry(*frequency)
                .or_default()
                .merge(&Self::from_results(results));
        }
        summary.records = summary.frequencies.values().map(|s| s.records).sum();
        if summary.error_sample.is_none() {
            summary.error_sample = summary
                .frequencies
                .values()
                .find_map(|s| s.error_sample.clone());
        }
        summary
    }

    /// 결과 1건을 반영합니다. 레코드가 없는 성공은 빈 결과로 셉니다.
    pub fn record<T: CollectedPayload>(&mut self, outcome: &FetchOutcome<T>) {
        match outcome {
            FetchOutcome::Success { record } if record.record_count() == 0 => self.empty += 1,
            FetchOutcome::Success { record } if record.is_synthetic() => self.synthetic += 1,
            FetchOutcome::Success { record } => {
                self.succeeded += 1;
                self.records += record.record_count();
            }
            FetchOutcome::EmptyResult => self.empty += 1,
            FetchOutcome::Failed { error, .. } => {
                self.failed += 1;
                if self.error_sample.is_none() {
                    self.error_sample = Some(error.to_string());
                }
            }
        }
    }

    /// 다른 통계를 합칩니다 (여러 단계로 구성된 작업 등).
    pub fn merge(&mut self, other: &KindSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.synthetic += other.synthetic;
        self.failed += other.failed;
        self.empty += other.empty;
        self.records += other.records;
        self.elapsed += other.elapsed;
        if self.error_sample.is_none() {
            self.error_sample = other.error_sample.clone();
        }
        for (frequency, summary) in &other.frequencies {
            self.frequencies.entry(*frequency).or_default().merge(summary);
        }
    }

    /// 모든 심볼이 실패로 기록된 통계 (수집기 미구성 등).
    pub fn all_failed(total: usize, error: impl Into<String>) -> Self {
        Self {
            total,
            failed: total,
            error_sample: (total > 0).then(|| error.into()),
            ..Default::default()
        }
    }

    /// 실제 레코드를 하나 이상 수집했는지 여부.
    pub fn has_genuine_records(&self) -> bool {
        self.succeeded > 0
    }

    /// 성공률 계산 (%, 합성 데이터 제외)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, kind: DataKind) {
        tracing::info!(
            kind = %kind,
            total = self.total,
            succeeded = self.succeeded,
            synthetic = self.synthetic,
            failed = self.failed,
            empty = self.empty,
            records = self.records,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
        if let Some(error) = &self.error_sample {
            tracing::debug!(kind = %kind, error = %error, "대표 에러");
        }
    }
}
