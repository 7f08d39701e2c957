//! 심볼 단위 재시도 래퍼.
//!
//! 제공자 호출 1건을 `RetryPolicy`에 따라 고정 간격으로 재시도하고,
//! 모든 시도가 실패하면 `Failed` 또는 (허용된 경우) 합성 레코드를 반환합니다.
//! 심볼 간 대기는 수집기 루프의 몫이며 여기서는 다루지 않습니다.

use std::future::Future;

use stockdata_core::{
    FetchError, FetchOutcome, FetchRequest, FetchResult, ProviderError, RetryPolicy,
};

/// 재시도 가능한 제공자 호출.
///
/// 호출 간 공유 상태가 없으므로 서로 다른 심볼에 대해 동시에 실행해도 안전합니다.
#[derive(Debug, Clone, Copy)]
pub struct RetryableOperation {
    policy: RetryPolicy,
}

impl RetryableOperation {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 제공자 호출을 실행합니다.
    ///
    /// - `call`이 `Ok(Some(_))`을 반환하면 `Success`
    /// - `Ok(None)`이면 재시도 없이 `EmptyResult`
    /// - 영구 에러이면 재시도 없이 `Failed(ProviderPermanent)`
    /// - 일시 에러이면 `retry_delay`만큼 대기 후 최대 `max_attempts`회까지 재시도
    ///
    /// 마지막 시도까지 실패하면 `allow_synthetic_fallback`에 따라
    /// `synthetic()`의 결과를 성공으로 반환하거나 `AllRetriesExhausted`로 실패합니다.
    pub async fn execute<T, F, Fut, S>(
        &self,
        request: &FetchRequest,
        mut call: F,
        synthetic: S,
    ) -> FetchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ProviderError>>,
        S: FnOnce() -> T,
    {
        let max_attempts = self.policy.attempts();
        let symbol = request.symbol.as_str();
        let kind = request.kind;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match call().await {
                Ok(Some(record)) => {
                    return FetchResult {
                        symbol: symbol.to_string(),
                        attempts: attempt,
                        outcome: FetchOutcome::success(record),
                    };
                }
                Ok(None) => {
                    tracing::debug!(symbol = %symbol, kind = %kind, "데이터 없음");
                    return FetchResult {
                        symbol: symbol.to_string(),
                        attempts: attempt,
                        outcome: FetchOutcome::EmptyResult,
                    };
                }
                Err(e) if e.is_permanent() => {
                    tracing::warn!(
                        symbol = %symbol,
                        kind = %kind,
                        attempt = attempt,
                        error = %e,
                        "영구 에러, 재시도하지 않음"
                    );
                    return FetchResult {
                        symbol: symbol.to_string(),
                        attempts: attempt,
                        outcome: FetchOutcome::failed(FetchError::from_provider(&e)),
                    };
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        tracing::warn!(
                            symbol = %symbol,
                            kind = %kind,
                            attempt = attempt,
                            max_attempts = max_attempts,
                            error = %e,
                            "조회 실패, 재시도"
                        );
                        tokio::time::sleep(self.policy.retry_delay()).await;
                    }
                }
            }
        }

        tracing::error!(
            symbol = %symbol,
            kind = %kind,
            attempts = max_attempts,
            error = %last_error,
            "재시도 소진"
        );

        if self.policy.allow_synthetic_fallback {
            tracing::warn!(symbol = %symbol, kind = %kind, "합성 데이터로 대체");
            return FetchResult {
                symbol: symbol.to_string(),
                attempts: max_attempts,
                outcome: FetchOutcome::success(synthetic()),
            };
        }

        FetchResult {
            symbol: symbol.to_string(),
            attempts: max_attempts,
            outcome: FetchOutcome::Failed {
                error: FetchError::AllRetriesExhausted {
                    attempts: max_attempts,
                    last_error,
                },
                retries_exhausted: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use stockdata_core::{DataKind, Symbol};

    fn request() -> FetchRequest {
        FetchRequest::new(Symbol::parse("SHSE.600000").unwrap(), DataKind::Tick)
    }

    fn policy(max_attempts: u32, fallback: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            retry_delay_ms: 1000,
            inter_symbol_delay_ms: 100,
            allow_synthetic_fallback: fallback,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_exact_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = RetryableOperation::new(policy(3, false));

        let counter = calls.clone();
        let result: FetchResult<u32> = op
            .execute(
                &request(),
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(ProviderError::Network("connection reset".into()))
                    }
                },
                || 0,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.attempts, 3);
        assert!(matches!(
            result.outcome,
            FetchOutcome::Failed {
                error: FetchError::AllRetriesExhausted { attempts: 3, .. },
                retries_exhausted: true,
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_single_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = RetryableOperation::new(policy(3, true));

        let counter = calls.clone();
        let result: FetchResult<u32> = op
            .execute(
                &request(),
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(ProviderError::MarketClosed("lunch break".into()))
                    }
                },
                || 0,
            )
            .await;

        // 폴백이 허용되어도 영구 에러는 대체하지 않습니다.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.attempts, 1);
        assert!(matches!(
            result.outcome.error(),
            Some(FetchError::ProviderPermanent(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_second_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = RetryableOperation::new(policy(3, false));

        let counter = calls.clone();
        let result = op
            .execute(
                &request(),
                || {
                    let counter = counter.clone();
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(ProviderError::Timeout("5s".into()))
                        } else {
                            Ok(Some(42u32))
                        }
                    }
                },
                || 0,
            )
            .await;

        assert_eq!(result.attempts, 2);
        assert_eq!(result.outcome.record(), Some(&42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_after_exhaustion() {
        let op = RetryableOperation::new(policy(2, true));

        let result = op
            .execute(
                &request(),
                || async { Err::<Option<&str>, _>(ProviderError::RateLimited("429".into())) },
                || "synthetic",
            )
            .await;

        assert_eq!(result.attempts, 2);
        assert_eq!(result.outcome.record(), Some(&"synthetic"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_between_attempts_only() {
        let op = RetryableOperation::new(policy(3, false));
        let started = tokio::time::Instant::now();

        let _: FetchResult<u32> = op
            .execute(
                &request(),
                || async { Err(ProviderError::Network("down".into())) },
                || 0,
            )
            .await;

        // 3회 시도 사이 대기 2회
        let elapsed = started.elapsed();
        assert!(elapsed >= std::time::Duration::from_millis(2000));
        assert!(elapsed < std::time::Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_empty_result_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = RetryableOperation::new(policy(3, true));

        let counter = calls.clone();
        let result: FetchResult<u32> = op
            .execute(
                &request(),
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(None)
                    }
                },
                || 0,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.outcome, FetchOutcome::EmptyResult);
    }
}
