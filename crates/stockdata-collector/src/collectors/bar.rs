//! K선 수집기.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use stockdata_core::{
    BarPayload, BarRecord, DataKind, FetchOutcome, FetchRequest, FetchResult, Frequency, Provenance,
    ProviderError, Symbol, TimeWindow,
};

use super::{or_zero, CollectorBase};

/// K선 수집기.
///
/// 요청 주기 문자열은 화이트리스트로 검증하며, 알 수 없는 값은 일봉으로 대체합니다.
pub struct BarCollector {
    base: CollectorBase,
    session_tz: Tz,
    default_lookback_days: i64,
}

impl BarCollector {
    /// `default_lookback_days`는 기간 시작이 없을 때 종료 시점 기준 조회 일수입니다.
    pub fn new(base: CollectorBase, session_tz: Tz, default_lookback_days: i64) -> Self {
        debug_assert_eq!(base.kind(), DataKind::Bar);
        Self {
            base,
            session_tz,
            default_lookback_days,
        }
    }

    pub fn base(&self) -> &CollectorBase {
        &self.base
    }

    /// 단일 주기로 K선을 수집합니다.
    pub async fn collect(
        &self,
        symbols: &[String],
        window: Option<&TimeWindow>,
        frequency: &str,
    ) -> Vec<FetchResult<Vec<BarRecord>>> {
        let frequency = Frequency::resolve(frequency);
        let (start, end) = window
            .copied()
            .unwrap_or_default()
            .resolve(Utc::now(), self.default_lookback_days);

        tracing::debug!(
            frequency = %frequency,
            start = %start,
            end = %end,
            "K선 수집 범위"
        );

        self.base
            .collect_each(symbols, |symbol| self.fetch_one(symbol, frequency, start, end))
            .await
    }

    /// 여러 주기를 순서대로 수집합니다. 중복 주기는 한 번만 수집합니다.
    pub async fn collect_frequencies(
        &self,
        symbols: &[String],
        window: Option<&TimeWindow>,
        frequencies: &[String],
    ) -> Vec<(Frequency, Vec<FetchResult<Vec<BarRecord>>>)> {
        let mut resolved: Vec<Frequency> = Vec::with_capacity(frequencies.len());
        for raw in frequencies {
            let frequency = Frequency::resolve(raw);
            if !resolved.contains(&frequency) {
                resolved.push(frequency);
            }
        }

        let mut batches = Vec::with_capacity(resolved.len());
        for frequency in resolved {
            let results = self.collect(symbols, window, frequency.as_str()).await;
            batches.push((frequency, results));
        }
        batches
    }

    async fn fetch_one(
        &self,
        symbol: Symbol,
        frequency: Frequency,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> FetchResult<Vec<BarRecord>> {
        let request = FetchRequest::new(symbol, DataKind::Bar)
            .with_window(Some(TimeWindow::between(start, end)))
            .with_frequency(frequency);
        let provider = self.base.provider();
        let symbol = &request.symbol;
        let session_tz = &self.session_tz;

        let mut result = self
            .base
            .retry()
            .execute(
                &request,
                move || async move {
                    let bars = provider
                        .fetch_historical_bars(symbol, frequency, start, end)
                        .await?;
                    if bars.is_empty() {
                        return Ok(None);
                    }
                    Ok::<_, ProviderError>(Some(
                        bars.iter().map(|bar| map_bar(symbol, frequency, bar)).collect(),
                    ))
                },
                || {
                    BarRecord::synthetic_series(
                        symbol,
                        frequency,
                        start.with_timezone(session_tz).date_naive(),
                        end.with_timezone(session_tz).date_naive(),
                        session_tz,
                    )
                },
            )
            .await;

        // 거래일이 없는 구간의 대체 데이터는 빈 결과
        if matches!(&result.outcome, FetchOutcome::Success { record } if record.is_empty()) {
            tracing::debug!(symbol = %result.symbol, frequency = %frequency, "대체 K선 구간에 거래일 없음");
            result.outcome = FetchOutcome::EmptyResult;
        }
        result
    }
}

fn map_bar(symbol: &Symbol, frequency: Frequency, bar: &BarPayload) -> BarRecord {
    let bob = bar.bob.or(bar.eob).unwrap_or_else(Utc::now);
    let eob = bar.eob.unwrap_or(bob);
    BarRecord {
        symbol: symbol.clone(),
        frequency,
        open: or_zero(bar.open),
        high: or_zero(bar.high),
        low: or_zero(bar.low),
        close: or_zero(bar.close),
        volume: bar.volume.unwrap_or(0),
        amount: or_zero(bar.amount),
        bob,
        eob,
        provenance: Provenance::Provider,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_map_bar_defaults() {
        let symbol = Symbol::parse("SZSE.000001").unwrap();
        let eob = Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).unwrap();
        let payload = BarPayload {
            close: Some(dec!(10.52)),
            eob: Some(eob),
            ..Default::default()
        };

        let bar = map_bar(&symbol, Frequency::D1, &payload);
        assert_eq!(bar.close, dec!(10.52));
        assert_eq!(bar.open, Decimal::ZERO);
        assert_eq!(bar.volume, 0);
        // 시작 시각이 없으면 종료 시각을 사용
        assert_eq!(bar.bob, eob);
        assert_eq!(bar.eob, eob);
    }
}
