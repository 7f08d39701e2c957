//! 틱 시세 수집기.

use chrono::Utc;
use stockdata_core::{
    DataKind, FetchRequest, FetchResult, Provenance, ProviderError, QuotePayload, Symbol,
    SymbolMeta, TickRecord, TimeWindow,
};

use super::{map_quote_levels, or_zero, CollectorBase};

/// 틱 레코드의 호가 단계 수.
const TICK_QUOTE_DEPTH: usize = 1;

/// 틱 시세 수집기.
///
/// 종목 메타를 먼저 조회하여 존재하지 않는 종목은 `EmptyResult`로 처리하고,
/// 존재하면 현재 시세를 조회합니다.
pub struct TickCollector {
    base: CollectorBase,
}

impl TickCollector {
    pub fn new(base: CollectorBase) -> Self {
        debug_assert_eq!(base.kind(), DataKind::Tick);
        Self { base }
    }

    pub fn base(&self) -> &CollectorBase {
        &self.base
    }

    /// 심볼별 틱 시세를 수집합니다.
    ///
    /// 제공자는 현재 시세만 제공하므로 `window`는 요청 기록용입니다.
    pub async fn collect(
        &self,
        symbols: &[String],
        window: Option<&TimeWindow>,
    ) -> Vec<FetchResult<TickRecord>> {
        let window = window.copied();
        self.base
            .collect_each(symbols, |symbol| self.fetch_one(symbol, window))
            .await
    }

    async fn fetch_one(&self, symbol: Symbol, window: Option<TimeWindow>) -> FetchResult<TickRecord> {
        let request = FetchRequest::new(symbol, DataKind::Tick).with_window(window);
        let provider = self.base.provider();
        let symbol = &request.symbol;

        self.base
            .retry()
            .execute(
                &request,
                move || async move {
                    let Some(meta) = provider.lookup_symbol_meta(symbol).await? else {
                        return Ok(None);
                    };
                    let quote = provider.fetch_realtime_quote(symbol).await?;
                    Ok::<_, ProviderError>(quote.map(|quote| map_tick(symbol, &meta, &quote)))
                },
                || TickRecord::synthetic(symbol.clone(), Utc::now()),
            )
            .await
    }
}

fn map_tick(symbol: &Symbol, meta: &SymbolMeta, quote: &QuotePayload) -> TickRecord {
    TickRecord {
        symbol: symbol.clone(),
        name: meta.sec_name.clone(),
        open: or_zero(quote.open),
        high: or_zero(quote.high),
        low: or_zero(quote.low),
        price: or_zero(quote.price),
        cum_volume: quote.cum_volume.unwrap_or(0),
        cum_amount: or_zero(quote.cum_amount),
        last_volume: quote.last_volume.unwrap_or(0),
        last_amount: or_zero(quote.last_amount),
        quotes: map_quote_levels(&quote.quotes, TICK_QUOTE_DEPTH),
        created_at: quote.created_at.unwrap_or_else(Utc::now),
        provenance: Provenance::Provider,
    }
}
