//! 재무 데이터 수집기.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use stockdata_core::{
    DataKind, FetchRequest, FetchResult, FundamentalsPayload, FundamentalsRecord, Provenance,
    ProviderError, Symbol, TimeWindow,
};

use super::{or_zero, CollectorBase};

/// 재무 데이터 수집기.
///
/// 기간 내 가장 최근 보고서 요약(재무상태표/손익계산서/현금흐름표)을 수집합니다.
pub struct FundamentalsCollector {
    base: CollectorBase,
    session_tz: Tz,
    default_lookback_days: i64,
}

impl FundamentalsCollector {
    pub fn new(base: CollectorBase, session_tz: Tz, default_lookback_days: i64) -> Self {
        debug_assert_eq!(base.kind(), DataKind::Fundamentals);
        Self {
            base,
            session_tz,
            default_lookback_days,
        }
    }

    pub fn base(&self) -> &CollectorBase {
        &self.base
    }

    pub async fn collect(
        &self,
        symbols: &[String],
        window: Option<&TimeWindow>,
    ) -> Vec<FetchResult<FundamentalsRecord>> {
        let window = window.copied().unwrap_or_default();
        let (start, end) = window.resolve(Utc::now(), self.default_lookback_days);
        let start_date = start.with_timezone(&self.session_tz).date_naive();
        let end_date = end.with_timezone(&self.session_tz).date_naive();

        self.base
            .collect_each(symbols, |symbol| {
                self.fetch_one(symbol, window, start_date, end_date)
            })
            .await
    }

    async fn fetch_one(
        &self,
        symbol: Symbol,
        window: TimeWindow,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FetchResult<FundamentalsRecord> {
        let request = FetchRequest::new(symbol, DataKind::Fundamentals).with_window(Some(window));
        let provider = self.base.provider();
        let symbol = &request.symbol;

        self.base
            .retry()
            .execute(
                &request,
                move || async move {
                    let payload = provider.fetch_fundamentals(symbol, start, end).await?;
                    Ok::<_, ProviderError>(payload.map(|p| map_fundamentals(symbol, &p)))
                },
                || FundamentalsRecord::synthetic(symbol.clone(), Utc::now()),
            )
            .await
    }
}

fn map_fundamentals(symbol: &Symbol, payload: &FundamentalsPayload) -> FundamentalsRecord {
    FundamentalsRecord {
        symbol: symbol.clone(),
        rpt_date: payload.rpt_date,
        pub_date: payload.pub_date,
        total_assets: or_zero(payload.total_assets),
        total_liabilities: or_zero(payload.total_liabilities),
        total_equity: or_zero(payload.total_equity),
        revenue: or_zero(payload.revenue),
        net_profit: or_zero(payload.net_profit),
        operating_cash_flow: or_zero(payload.operating_cash_flow),
        eps: or_zero(payload.eps),
        roe: or_zero(payload.roe),
        created_at: Utc::now(),
        provenance: Provenance::Provider,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_map_fundamentals_partial_payload() {
        let symbol = Symbol::parse("SHSE.600519").unwrap();
        let payload = FundamentalsPayload {
            rpt_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            net_profit: Some(dec!(24065000000)),
            eps: Some(dec!(19.16)),
            ..Default::default()
        };

        let record = map_fundamentals(&symbol, &payload);
        assert_eq!(record.eps, dec!(19.16));
        assert_eq!(record.revenue, Decimal::ZERO);
        assert_eq!(record.rpt_date, NaiveDate::from_ymd_opt(2024, 3, 31));
        assert_eq!(record.provenance, Provenance::Provider);
    }
}
