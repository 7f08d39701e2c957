//! 실시간 스냅샷 기반 시장 개요.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockdata_core::RealtimeRecord;

/// 시장 개요 (상승/하락/보합 종목 수와 합계).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub timestamp: DateTime<Utc>,
    /// 집계 대상 종목 수
    pub total_symbols: usize,
    pub up_count: usize,
    pub down_count: usize,
    pub flat_count: usize,
    /// 상승 비율 (%)
    pub up_ratio: Decimal,
    /// 하락 비율 (%)
    pub down_ratio: Decimal,
    /// 평균 등락률 (%)
    pub avg_change_pct: Decimal,
    pub total_volume: i64,
    pub total_amount: Decimal,
}

impl MarketOverview {
    /// 실시간 레코드로 개요를 계산합니다.
    pub fn from_records(records: &[RealtimeRecord]) -> Self {
        let mut up_count = 0;
        let mut down_count = 0;
        let mut flat_count = 0;
        let mut total_change = Decimal::ZERO;
        let mut total_volume: i64 = 0;
        let mut total_amount = Decimal::ZERO;

        for record in records {
            if record.change_pct > Decimal::ZERO {
                up_count += 1;
            } else if record.change_pct < Decimal::ZERO {
                down_count += 1;
            } else {
                flat_count += 1;
            }
            total_change += record.change_pct;
            total_volume = total_volume.saturating_add(record.cum_volume);
            total_amount += record.cum_amount;
        }

        let total = records.len();
        let ratio = |count: usize| {
            if total == 0 {
                Decimal::ZERO
            } else {
                (Decimal::from(count) / Decimal::from(total) * Decimal::ONE_HUNDRED).round_dp(2)
            }
        };
        let avg_change_pct = if total == 0 {
            Decimal::ZERO
        } else {
            (total_change / Decimal::from(total)).round_dp(2)
        };

        Self {
            timestamp: Utc::now(),
            total_symbols: total,
            up_count,
            down_count,
            flat_count,
            up_ratio: ratio(up_count),
            down_ratio: ratio(down_count),
            avg_change_pct,
            total_volume,
            total_amount,
        }
    }

    pub fn log(&self) {
        tracing::info!(
            total = self.total_symbols,
            up = self.up_count,
            down = self.down_count,
            flat = self.flat_count,
            up_ratio = %self.up_ratio,
            avg_change_pct = %self.avg_change_pct,
            total_volume = self.total_volume,
            total_amount = %self.total_amount,
            "시장 개요"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockdata_core::{Provenance, Symbol};

    fn record(change_pct: Decimal, volume: i64) -> RealtimeRecord {
        let mut record = RealtimeRecord::synthetic(Symbol::parse("SHSE.600000").unwrap(), Utc::now());
        record.change_pct = change_pct;
        record.cum_volume = volume;
        record.cum_amount = dec!(100);
        record.provenance = Provenance::Provider;
        record
    }

    #[test]
    fn test_overview_counts() {
        let records = vec![
            record(dec!(2.5), 100),
            record(dec!(-1.5), 200),
            record(dec!(0), 300),
            record(dec!(1.0), 400),
        ];

        let overview = MarketOverview::from_records(&records);
        assert_eq!(overview.total_symbols, 4);
        assert_eq!(overview.up_count, 2);
        assert_eq!(overview.down_count, 1);
        assert_eq!(overview.flat_count, 1);
        assert_eq!(overview.up_ratio, dec!(50));
        assert_eq!(overview.down_ratio, dec!(25));
        assert_eq!(overview.avg_change_pct, dec!(0.5));
        assert_eq!(overview.total_volume, 1000);
        assert_eq!(overview.total_amount, dec!(400));
    }

    #[test]
    fn test_overview_empty() {
        let overview = MarketOverview::from_records(&[]);
        assert_eq!(overview.total_symbols, 0);
        assert_eq!(overview.up_ratio, Decimal::ZERO);
        assert_eq!(overview.avg_change_pct, Decimal::ZERO);
    }
}
