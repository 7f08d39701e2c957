//! 실시간 스냅샷 수집기.

use chrono::Utc;
use rust_decimal::Decimal;
use stockdata_core::{
    DataKind, FetchRequest, FetchResult, Provenance, ProviderError, QuotePayload, RealtimeRecord,
    Symbol, TimeWindow,
};

use super::{map_quote_levels, or_zero, CollectorBase};

/// 실시간 레코드의 호가 단계 수.
const REALTIME_DEPTH: usize = 5;

/// 실시간 스냅샷 수집기.
pub struct RealtimeCollector {
    base: CollectorBase,
}

impl RealtimeCollector {
    pub fn new(base: CollectorBase) -> Self {
        debug_assert_eq!(base.kind(), DataKind::Realtime);
        Self { base }
    }

    pub fn base(&self) -> &CollectorBase {
        &self.base
    }

    pub async fn collect(
        &self,
        symbols: &[String],
        window: Option<&TimeWindow>,
    ) -> Vec<FetchResult<RealtimeRecord>> {
        let window = window.copied();
        self.base
            .collect_each(symbols, |symbol| self.fetch_one(symbol, window))
            .await
    }

    async fn fetch_one(&self, symbol: Symbol, window: Option<TimeWindow>) -> FetchResult<RealtimeRecord> {
        let request = FetchRequest::new(symbol, DataKind::Realtime).with_window(window);
        let provider = self.base.provider();
        let symbol = &request.symbol;

        self.base
            .retry()
            .execute(
                &request,
                move || async move {
                    let quote = provider.fetch_realtime_quote(symbol).await?;
                    Ok::<_, ProviderError>(quote.map(|q| map_realtime(symbol, &q)))
                },
                || RealtimeRecord::synthetic(symbol.clone(), Utc::now()),
            )
            .await
    }
}

fn map_realtime(symbol: &Symbol, quote: &QuotePayload) -> RealtimeRecord {
    let price = or_zero(quote.price);
    let pre_close = or_zero(quote.pre_close);
    let change = if pre_close.is_zero() {
        Decimal::ZERO
    } else {
        price - pre_close
    };
    let change_pct = if pre_close.is_zero() {
        Decimal::ZERO
    } else {
        (change / pre_close * Decimal::ONE_HUNDRED).round_dp(2)
    };

    let depth = map_quote_levels(&quote.quotes, REALTIME_DEPTH);
    let bid_total = depth
        .iter()
        .fold(0i64, |acc, level| acc.saturating_add(level.bid_volume));
    let ask_total = depth
        .iter()
        .fold(0i64, |acc, level| acc.saturating_add(level.ask_volume));
    let bid_ask_ratio = if ask_total > 0 {
        (Decimal::from(bid_total) / Decimal::from(ask_total)).round_dp(4)
    } else {
        Decimal::ZERO
    };

    RealtimeRecord {
        symbol: symbol.clone(),
        price,
        open: or_zero(quote.open),
        high: or_zero(quote.high),
        low: or_zero(quote.low),
        pre_close,
        change,
        change_pct,
        cum_volume: quote.cum_volume.unwrap_or(0),
        cum_amount: or_zero(quote.cum_amount),
        depth,
        bid_ask_ratio,
        created_at: quote.created_at.unwrap_or_else(Utc::now),
        provenance: Provenance::Provider,
    }
}
