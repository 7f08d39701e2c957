//! 거래 캘린더와 트리거 표.
//!
//! 트리거 시각은 거래소 현지 시각으로 정의되며, 판정은 UTC 시각을 받아
//! 현지 시각으로 변환한 뒤 수행합니다.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use stockdata_core::{parse_clock, CoreResult, SessionConfig};

/// 다음 발화 시각 탐색 한도 (일).
const MAX_LOOKAHEAD_DAYS: i64 = 400;

/// 한 번의 확인에서 되돌아보는 최대 일수.
const MAX_CATCHUP_DAYS: i64 = 7;

/// 트리거 이름.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerName {
    /// 장 시작 전
    PreMarket,
    /// 장 시작
    MarketOpen,
    /// 오후장 시작
    Midday,
    /// 장 마감
    MarketClose,
    /// 장 마감 후
    PostMarket,
    /// 일일 재무 수집
    DailyFundamentals,
    /// 주간 과거 데이터 보충
    WeeklyBackfill,
}

impl TriggerName {
    pub const ALL: [TriggerName; 7] = [
        TriggerName::PreMarket,
        TriggerName::MarketOpen,
        TriggerName::Midday,
        TriggerName::MarketClose,
        TriggerName::PostMarket,
        TriggerName::DailyFundamentals,
        TriggerName::WeeklyBackfill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerName::PreMarket => "pre_market",
            TriggerName::MarketOpen => "market_open",
            TriggerName::Midday => "midday",
            TriggerName::MarketClose => "market_close",
            TriggerName::PostMarket => "post_market",
            TriggerName::DailyFundamentals => "daily_fundamentals",
            TriggerName::WeeklyBackfill => "weekly_backfill",
        }
    }
}

impl fmt::Display for TriggerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 트리거 반복 규칙.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    /// 거래일마다
    TradingDays,
    /// 매주 지정 요일 (휴장 여부 무관)
    Weekly(Weekday),
}

/// 트리거 1개.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPoint {
    pub name: TriggerName,
    /// 현지 시각
    pub time: NaiveTime,
    pub recurrence: Recurrence,
}

/// 거래 캘린더.
///
/// 시작 후에는 읽기 전용이며 잠금 없이 공유됩니다.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    tz: Tz,
    morning: (NaiveTime, NaiveTime),
    afternoon: (NaiveTime, NaiveTime),
    holidays: BTreeSet<NaiveDate>,
    triggers: Vec<TriggerPoint>,
}

impl TradingCalendar {
    /// 세션 설정으로 캘린더를 생성합니다.
    pub fn from_config(config: &SessionConfig) -> CoreResult<Self> {
        let t = &config.triggers;
        let backfill_day = t.backfill_weekday()?;
        let trading = |name, value: &str| -> CoreResult<TriggerPoint> {
            Ok(TriggerPoint {
                name,
                time: parse_clock(value)?,
                recurrence: Recurrence::TradingDays,
            })
        };

        let triggers = vec![
            trading(TriggerName::PreMarket, &t.pre_market)?,
            trading(TriggerName::MarketOpen, &t.market_open)?,
            trading(TriggerName::Midday, &t.midday)?,
            trading(TriggerName::MarketClose, &t.market_close)?,
            trading(TriggerName::PostMarket, &t.post_market)?,
            trading(TriggerName::DailyFundamentals, &t.daily_fundamentals)?,
            TriggerPoint {
                name: TriggerName::WeeklyBackfill,
                time: parse_clock(&t.weekly_backfill)?,
                recurrence: Recurrence::Weekly(backfill_day),
            },
        ];

        Ok(Self {
            tz: config.tz()?,
            morning: (parse_clock(&config.morning_open)?, parse_clock(&config.morning_close)?),
            afternoon: (
                parse_clock(&config.afternoon_open)?,
                parse_clock(&config.afternoon_close)?,
            ),
            holidays: config.holidays.iter().copied().collect(),
            triggers,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn triggers(&self) -> &[TriggerPoint] {
        &self.triggers
    }

    /// UTC 시각의 현지 날짜.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// 평일이고 휴장일이 아니면 거래일입니다.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// 거래일의 오전장 또는 오후장 시간(경계 포함)인지 확인합니다.
    pub fn is_trading_time(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.tz);
        if !self.is_trading_day(local.date_naive()) {
            return false;
        }
        let time = local.time();
        let within = |(open, close): (NaiveTime, NaiveTime)| open <= time && time <= close;
        within(self.morning) || within(self.afternoon)
    }

    /// 해당 날짜 오전장 시작 시각 (UTC).
    pub fn session_open(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.to_utc(date, self.morning.0)
    }

    /// 해당 날짜 오후장 종료 시각 (UTC).
    pub fn session_close(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.to_utc(date, self.afternoon.1)
    }

    /// 트리거가 해당 날짜에 발화하는지 확인합니다.
    pub fn fires_on(&self, trigger: &TriggerPoint, date: NaiveDate) -> bool {
        match trigger.recurrence {
            Recurrence::TradingDays => self.is_trading_day(date),
            Recurrence::Weekly(weekday) => date.weekday() == weekday,
        }
    }

    /// `(after, until]` 구간에 도래한 트리거를 시각 순으로 반환합니다.
    pub fn due_triggers(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<(TriggerName, DateTime<Utc>)> {
        if until <= after {
            return Vec::new();
        }

        let last_day = self.local_date(until);
        let first_day = self
            .local_date(after)
            .max(last_day - Duration::days(MAX_CATCHUP_DAYS));

        let mut due = Vec::new();
        let mut day = first_day;
        while day <= last_day {
            for trigger in &self.triggers {
                if !self.fires_on(trigger, day) {
                    continue;
                }
                if let Some(at) = self.to_utc(day, trigger.time) {
                    if after < at && at <= until {
                        due.push((trigger.name, at));
                    }
                }
            }
            day += Duration::days(1);
        }

        due.sort_by_key(|(name, at)| (*at, *name));
        due
    }

    /// `after` 이후 트리거의 다음 발화 시각.
    pub fn next_fire(&self, trigger: &TriggerPoint, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = self.local_date(after);
        (0..MAX_LOOKAHEAD_DAYS)
            .map(|offset| start + Duration::days(offset))
            .filter(|day| self.fires_on(trigger, *day))
            .filter_map(|day| self.to_utc(day, trigger.time))
            .find(|at| *at > after)
    }

    /// 모든 트리거의 다음 발화 시각 (시각 순).
    pub fn next_fire_times(&self, after: DateTime<Utc>) -> Vec<(TriggerName, DateTime<Utc>)> {
        let mut next: Vec<_> = self
            .triggers
            .iter()
            .filter_map(|t| self.next_fire(t, after).map(|at| (t.name, at)))
            .collect();
        next.sort_by_key(|(name, at)| (*at, *name));
        next
    }

    fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar() -> TradingCalendar {
        let config = SessionConfig {
            holidays: vec![NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()],
            ..Default::default()
        };
        TradingCalendar::from_config(&config).unwrap()
    }

    /// 상하이 현지 시각 → UTC
    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Shanghai
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_trading_day() {
        let cal = calendar();
        assert!(cal.is_trading_day(NaiveDate::from_ymd_opt(2024, 9, 30).unwrap()));
        // 휴장일
        assert!(!cal.is_trading_day(NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()));
        // 토요일
        assert!(!cal.is_trading_day(NaiveDate::from_ymd_opt(2024, 10, 5).unwrap()));
    }

    #[test]
    fn test_trading_time_boundaries() {
        let cal = calendar();
        assert!(cal.is_trading_time(local(2024, 6, 3, 9, 30)));
        assert!(cal.is_trading_time(local(2024, 6, 3, 11, 30)));
        assert!(!cal.is_trading_time(local(2024, 6, 3, 12, 0)));
        assert!(cal.is_trading_time(local(2024, 6, 3, 15, 0)));
        assert!(!cal.is_trading_time(local(2024, 6, 3, 15, 1)));
        // 일요일
        assert!(!cal.is_trading_time(local(2024, 6, 2, 10, 0)));
    }

    #[test]
    fn test_due_triggers_window() {
        let cal = calendar();
        let due = cal.due_triggers(local(2024, 6, 3, 9, 0), local(2024, 6, 3, 9, 30));
        let names: Vec<_> = due.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec![TriggerName::PreMarket, TriggerName::MarketOpen]);

        // 구간 시작은 제외
        let due = cal.due_triggers(local(2024, 6, 3, 9, 30), local(2024, 6, 3, 9, 31));
        assert!(due.is_empty());
    }

    #[test]
    fn test_session_triggers_skip_holidays() {
        let cal = calendar();
        let due = cal.due_triggers(local(2024, 10, 1, 0, 0), local(2024, 10, 1, 23, 59));
        assert!(due.is_empty());
    }

    #[test]
    fn test_weekly_backfill_on_sunday() {
        let cal = calendar();
        // 2024-06-02 일요일
        let due = cal.due_triggers(local(2024, 6, 2, 0, 0), local(2024, 6, 2, 23, 0));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, TriggerName::WeeklyBackfill);
        assert_eq!(due[0].1, local(2024, 6, 2, 2, 0));
    }

    #[test]
    fn test_next_fire_times() {
        let cal = calendar();
        // 금요일 장 마감 후
        let next = cal.next_fire_times(local(2024, 6, 7, 16, 0));
        assert_eq!(next[0], (TriggerName::DailyFundamentals, local(2024, 6, 7, 20, 0)));
        assert_eq!(next[1], (TriggerName::WeeklyBackfill, local(2024, 6, 9, 2, 0)));
        let open = next
            .iter()
            .find(|(n, _)| *n == TriggerName::MarketOpen)
            .unwrap();
        // 다음 장 시작은 월요일
        assert_eq!(open.1, local(2024, 6, 10, 9, 30));
        assert_eq!(next.len(), TriggerName::ALL.len());
    }
}
