/// 안티 스나이핑 연장 정책
/// 순수 함수이며, 항상 입찰을 처리하는 잠금+트랜잭션 안에서 호출되므로
/// 연장 경합은 구조적으로 발생하지 않는다.
// region:    --- Imports
use chrono::{DateTime, Duration, Utc};

// endregion: --- Imports

// region:    --- Policy

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionDecision {
    pub new_end_at: DateTime<Utc>,
    pub new_extension_count: i32,
    pub extended: bool,
}

/// 연장 판정
/// 종료까지 남은 시간이 (0, threshold] 구간이고 연장 횟수가 한도 미만이면
/// end_at을 extension_seconds만큼 뒤로 밀고 횟수를 1 올린다. 그 외에는 no-op.
pub fn evaluate(
    now: DateTime<Utc>,
    end_at: DateTime<Utc>,
    threshold_seconds: i64,
    extension_count: i32,
    max_extensions: i32,
    extension_seconds: i64,
) -> ExtensionDecision {
    let millis_to_end = (end_at - now).num_milliseconds();
    let within_threshold = millis_to_end > 0 && millis_to_end <= threshold_seconds * 1_000;

    if within_threshold && extension_count < max_extensions {
        ExtensionDecision {
            new_end_at: end_at + Duration::seconds(extension_seconds),
            new_extension_count: extension_count + 1,
            extended: true,
        }
    } else {
        ExtensionDecision {
            new_end_at: end_at,
            new_extension_count: extension_count,
            extended: false,
        }
    }
}

// endregion: --- Policy

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn bid_five_seconds_before_end_extends_by_extension_seconds() {
        let end_at = at(100);
        let decision = evaluate(at(95), end_at, 30, 0, 10, 30);
        assert!(decision.extended);
        assert_eq!(decision.new_end_at, end_at + Duration::seconds(30));
        assert_eq!(decision.new_extension_count, 1);
    }

    #[test]
    fn bid_sixty_seconds_before_end_does_not_extend() {
        let end_at = at(100);
        let decision = evaluate(at(40), end_at, 30, 0, 10, 30);
        assert!(!decision.extended);
        assert_eq!(decision.new_end_at, end_at);
        assert_eq!(decision.new_extension_count, 0);
    }

    #[test]
    fn exactly_at_threshold_extends() {
        let end_at = at(100);
        let decision = evaluate(at(70), end_at, 30, 0, 10, 30);
        assert!(decision.extended);
    }

    #[test]
    fn at_or_after_end_does_not_extend() {
        let end_at = at(100);
        assert!(!evaluate(at(100), end_at, 30, 0, 10, 30).extended);
        assert!(!evaluate(at(101), end_at, 30, 0, 10, 30).extended);
    }

    #[test]
    fn extension_count_never_exceeds_max() {
        let mut end_at = at(100);
        let mut count = 0;
        // 매번 종료 5초 전에 입찰이 반복되는 최악의 경우
        for i in 0..20i64 {
            let now = end_at - Duration::seconds(5 - (i % 2));
            let decision = evaluate(now, end_at, 30, count, 3, 30);
            end_at = decision.new_end_at;
            count = decision.new_extension_count;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn at_max_extensions_is_noop() {
        let end_at = at(100);
        let decision = evaluate(at(95), end_at, 30, 10, 10, 30);
        assert!(!decision.extended);
        assert_eq!(decision.new_end_at, end_at);
        assert_eq!(decision.new_extension_count, 10);
    }
}
// endregion: --- Tests
