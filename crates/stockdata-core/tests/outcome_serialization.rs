//! 수집 결과의 JSON 형태 테스트.
//!
//! 저장소와 CLI 출력이 이 형태에 의존합니다.

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use stockdata_core::{
    normalize_symbol, FetchError, FetchOutcome, FetchResult, Provenance, RealtimeRecord, Symbol,
};

#[test]
fn test_success_outcome_carries_provenance() {
    let symbol = Symbol::parse("SHSE.600519").unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 5, 0, 0).unwrap();
    let mut record = RealtimeRecord::synthetic(symbol, now);
    record.price = dec!(1688.5);
    record.provenance = Provenance::Provider;

    let result = FetchResult {
        symbol: "SHSE.600519".to_string(),
        attempts: 1,
        outcome: FetchOutcome::success(record),
    };

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["outcome"]["status"], "success");
    assert_eq!(json["outcome"]["record"]["symbol"], "SHSE.600519");
    assert_eq!(json["outcome"]["record"]["provenance"], "provider");
    assert_eq!(json["outcome"]["record"]["price"], "1688.5");
}

#[test]
fn test_failed_outcome_shape() {
    let result: FetchResult<RealtimeRecord> = FetchResult {
        symbol: "SZSE.000001".to_string(),
        attempts: 3,
        outcome: FetchOutcome::Failed {
            error: FetchError::AllRetriesExhausted {
                attempts: 3,
                last_error: "timeout".to_string(),
            },
            retries_exhausted: true,
        },
    };

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["attempts"], 3);
    assert_eq!(json["outcome"]["status"], "failed");
    assert_eq!(json["outcome"]["retries_exhausted"], true);
    assert_eq!(json["outcome"]["error"]["type"], "all_retries_exhausted");

    let back: FetchResult<RealtimeRecord> = serde_json::from_value(json).unwrap();
    assert_eq!(back, result);
}

#[test]
fn test_symbol_deserialization_is_strict() {
    assert!(serde_json::from_str::<Symbol>("\"SHSE.600000\"").is_ok());
    assert!(serde_json::from_str::<Symbol>("\"600000.SH\"").is_err());

    // 느슨한 형식은 normalize_symbol을 거쳐야 합니다.
    let normalized = normalize_symbol("600000.SH").unwrap();
    assert_eq!(normalized.as_str(), "SHSE.600000");
}
