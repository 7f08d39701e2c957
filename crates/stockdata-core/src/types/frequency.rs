//! K선 수집 주기 정의.
//!
//! 제공자가 지원하는 고정된 주기 화이트리스트입니다.
//! 알 수 없는 문자열은 일봉으로 처리합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// K선 주기.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Frequency {
    /// 1분봉
    #[serde(rename = "1m")]
    M1,
    /// 5분봉
    #[serde(rename = "5m")]
    M5,
    /// 15분봉
    #[serde(rename = "15m")]
    M15,
    /// 30분봉
    #[serde(rename = "30m")]
    M30,
    /// 1시간봉
    #[serde(rename = "1h")]
    H1,
    /// 일봉
    #[serde(rename = "1d")]
    D1,
    /// 주봉
    #[serde(rename = "1w")]
    W1,
    /// 월봉
    #[serde(rename = "1M")]
    MN1,
}

impl Frequency {
    /// 지원하는 모든 주기.
    pub const ALL: [Frequency; 8] = [
        Frequency::M1,
        Frequency::M5,
        Frequency::M15,
        Frequency::M30,
        Frequency::H1,
        Frequency::D1,
        Frequency::W1,
        Frequency::MN1,
    ];

    /// 화이트리스트에 있는 주기 문자열이면 해당 값을 반환합니다.
    ///
    /// `1M`(월봉)과 `1m`(분봉)을 구분하기 위해 대소문자를 유지합니다.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "1m" => Some(Frequency::M1),
            "5m" => Some(Frequency::M5),
            "15m" => Some(Frequency::M15),
            "30m" => Some(Frequency::M30),
            "1h" => Some(Frequency::H1),
            "1d" => Some(Frequency::D1),
            "1w" => Some(Frequency::W1),
            "1M" => Some(Frequency::MN1),
            _ => None,
        }
    }

    /// 주기 문자열을 해석합니다. 인식할 수 없으면 일봉을 반환합니다.
    pub fn resolve(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            tracing::debug!(frequency = s, "지원하지 않는 주기, 일봉으로 대체");
            Frequency::D1
        })
    }

    /// 제공자 API에 전달하는 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::M1 => "1m",
            Frequency::M5 => "5m",
            Frequency::M15 => "15m",
            Frequency::M30 => "30m",
            Frequency::H1 => "1h",
            Frequency::D1 => "1d",
            Frequency::W1 => "1w",
            Frequency::MN1 => "1M",
        }
    }

    /// 한 봉의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Frequency::M1 => Duration::from_secs(60),
            Frequency::M5 => Duration::from_secs(5 * 60),
            Frequency::M15 => Duration::from_secs(15 * 60),
            Frequency::M30 => Duration::from_secs(30 * 60),
            Frequency::H1 => Duration::from_secs(60 * 60),
            Frequency::D1 => Duration::from_secs(24 * 60 * 60),
            Frequency::W1 => Duration::from_secs(7 * 24 * 60 * 60),
            Frequency::MN1 => Duration::from_secs(30 * 24 * 60 * 60), // 근사값
        }
    }

    /// 일중(intraday) 주기인지 확인합니다.
    pub fn is_intraday(&self) -> bool {
        self.duration() < Duration::from_secs(24 * 60 * 60)
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::D1
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_whitelist() {
        for freq in Frequency::ALL {
            assert_eq!(Frequency::parse(freq.as_str()), Some(freq));
        }
    }

    #[test]
    fn test_frequency_resolve_defaults_to_daily() {
        assert_eq!(Frequency::resolve("60s"), Frequency::D1);
        assert_eq!(Frequency::resolve("tick"), Frequency::D1);
        assert_eq!(Frequency::resolve(""), Frequency::D1);
        assert_eq!(Frequency::resolve("1h"), Frequency::H1);
    }

    #[test]
    fn test_minute_vs_month() {
        assert_eq!(Frequency::resolve("1m"), Frequency::M1);
        assert_eq!(Frequency::resolve("1M"), Frequency::MN1);
        assert!(Frequency::M30.is_intraday());
        assert!(!Frequency::D1.is_intraday());
    }

    #[test]
    fn test_frequency_serde() {
        let json = serde_json::to_string(&Frequency::M15).unwrap();
        assert_eq!(json, "\"15m\"");
        let parsed: Frequency = serde_json::from_str("\"1M\"").unwrap();
        assert_eq!(parsed, Frequency::MN1);
    }
}
