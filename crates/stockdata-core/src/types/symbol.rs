//! 거래소 접두어 심볼 정의.
//!
//! 이 모듈은 수집기 내부에서 사용하는 심볼 타입을 정의합니다:
//! - `Symbol` - canonical `EXCH.CODE` 형식의 불변 식별자
//! - `normalize_symbol` - 설정 로드 시점의 느슨한 입력 정규화
//!
//! 수집 경로(hot path)에서는 `Symbol::parse`로 형식만 검증하고,
//! `600111.SH` 같은 접미어 형식 변환은 설정 로드 시 한 번만 수행합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 상하이 증권거래소 접두어.
pub const SHANGHAI_EXCHANGE: &str = "SHSE";
/// 선전 증권거래소 접두어.
pub const SHENZHEN_EXCHANGE: &str = "SZSE";

const MAX_EXCHANGE_LEN: usize = 8;
const MAX_CODE_LEN: usize = 12;

/// 심볼 파싱/정규화 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    /// 빈 문자열
    #[error("빈 심볼")]
    Empty,

    /// canonical 형식이 아님
    #[error("잘못된 심볼 형식: {0}")]
    Malformed(String),

    /// 시장을 판별할 수 없는 숫자 코드
    #[error("시장을 판별할 수 없는 코드: {0}")]
    UnknownMarket(String),
}

/// canonical 형식(`EXCH.CODE`)의 심볼.
///
/// 거래소 접두어는 대문자 알파벳, 코드는 대문자 알파벳/숫자로만 구성됩니다.
/// 생성 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// canonical 문자열을 엄격하게 검증하여 심볼을 생성합니다.
    ///
    /// 공백 제거나 대소문자 변환을 하지 않습니다. 느슨한 입력은
    /// [`normalize_symbol`]을 사용하세요.
    pub fn parse(s: &str) -> Result<Self, SymbolError> {
        if s.is_empty() {
            return Err(SymbolError::Empty);
        }

        let (exchange, code) = s
            .split_once('.')
            .ok_or_else(|| SymbolError::Malformed(s.to_string()))?;

        let exchange_ok = !exchange.is_empty()
            && exchange.len() <= MAX_EXCHANGE_LEN
            && exchange.bytes().all(|b| b.is_ascii_uppercase());
        let code_ok = !code.is_empty()
            && code.len() <= MAX_CODE_LEN
            && code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());

        if exchange_ok && code_ok {
            Ok(Self(s.to_string()))
        } else {
            Err(SymbolError::Malformed(s.to_string()))
        }
    }

    /// 거래소 접두어를 반환합니다 (예: `SHSE`).
    pub fn exchange(&self) -> &str {
        self.0.split_once('.').map(|(e, _)| e).unwrap_or_default()
    }

    /// 거래소 내 종목 코드를 반환합니다 (예: `600000`).
    pub fn code(&self) -> &str {
        self.0.split_once('.').map(|(_, c)| c).unwrap_or_default()
    }

    /// canonical 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// 느슨한 입력 형식을 canonical 심볼로 정규화합니다.
///
/// 지원 형식:
/// - `SHSE.600111` / `szse.000001` → 대문자 canonical 그대로
/// - `600111.SH` → `SHSE.600111`, `000001.SZ` → `SZSE.000001`
/// - `600111` → `SHSE.600111` (6/9로 시작), `000001` → `SZSE.000001` (0/3으로 시작)
pub fn normalize_symbol(raw: &str) -> Result<Symbol, SymbolError> {
    let s = raw.trim().to_uppercase();
    if s.is_empty() {
        return Err(SymbolError::Empty);
    }

    if let Some((digits, suffix)) = s.split_once('.') {
        if is_all_digits(digits) {
            let exchange = match suffix {
                "SH" => SHANGHAI_EXCHANGE,
                "SZ" => SHENZHEN_EXCHANGE,
                _ => return Err(SymbolError::Malformed(s)),
            };
            return Symbol::parse(&format!("{}.{}", exchange, digits));
        }
        return Symbol::parse(&s);
    }

    if is_all_digits(&s) {
        let exchange = match s.as_bytes()[0] {
            b'6' | b'9' => SHANGHAI_EXCHANGE,
            b'0' | b'3' => SHENZHEN_EXCHANGE,
            _ => return Err(SymbolError::UnknownMarket(s)),
        };
        return Symbol::parse(&format!("{}.{}", exchange, s));
    }

    Err(SymbolError::Malformed(s))
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_symbol_parse() {
        let symbol = Symbol::parse("SHSE.600000").unwrap();
        assert_eq!(symbol.exchange(), "SHSE");
        assert_eq!(symbol.code(), "600000");
        assert_eq!(symbol.to_string(), "SHSE.600000");

        assert!(Symbol::parse("EX.AAA").is_ok());
        assert_eq!(Symbol::parse(""), Err(SymbolError::Empty));
        assert!(Symbol::parse("BAD").is_err());
        assert!(Symbol::parse("shse.600000").is_err());
        assert!(Symbol::parse("SHSE.").is_err());
        assert!(Symbol::parse(".600000").is_err());
        assert!(Symbol::parse("600000.SH1").is_err());
    }

    #[test]
    fn test_normalize_suffix_style() {
        assert_eq!(normalize_symbol("600111.SH").unwrap().as_str(), "SHSE.600111");
        assert_eq!(normalize_symbol("000001.sz").unwrap().as_str(), "SZSE.000001");
        assert!(normalize_symbol("000001.HK").is_err());
    }

    #[test]
    fn test_normalize_bare_numeric() {
        assert_eq!(normalize_symbol("600519").unwrap().as_str(), "SHSE.600519");
        assert_eq!(normalize_symbol("900901").unwrap().as_str(), "SHSE.900901");
        assert_eq!(normalize_symbol(" 300059 ").unwrap().as_str(), "SZSE.300059");
        assert_eq!(
            normalize_symbol("830799"),
            Err(SymbolError::UnknownMarket("830799".to_string()))
        );
    }

    #[test]
    fn test_normalize_keeps_canonical() {
        assert_eq!(normalize_symbol("szse.000002").unwrap().as_str(), "SZSE.000002");
        assert_eq!(normalize_symbol("EX.AAA").unwrap().as_str(), "EX.AAA");
        assert!(normalize_symbol("   ").is_err());
        assert!(normalize_symbol("AAPL").is_err());
    }

    #[test]
    fn test_symbol_serde_validates() {
        let json = serde_json::to_string(&Symbol::parse("SHSE.600000").unwrap()).unwrap();
        assert_eq!(json, "\"SHSE.600000\"");
        assert!(serde_json::from_str::<Symbol>("\"BAD\"").is_err());
    }

    proptest! {
        #[test]
        fn normalized_symbols_are_canonical(code in "[0369][0-9]{5}") {
            let symbol = normalize_symbol(&code).unwrap();
            prop_assert_eq!(Symbol::parse(symbol.as_str()).unwrap(), symbol.clone());
            prop_assert_eq!(symbol.code(), code.as_str());
        }
    }
}
