use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const TOO_MANY_REQUESTS: u16 = 429;

/// When a rate-limited call may be retried. `retry_at == None` means the
/// server gave no hint and the caller picks its own backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSignal {
    pub retry_at: Option<DateTime<Utc>>,
    pub retry_after_seconds: Option<i64>,
    pub status: u16,
}

impl RateLimitSignal {
    /// Builds a signal from the `Retry-After` and `X-RateLimit-Reset` header values.
    ///
    /// `Retry-After` wins when usable: an integer is seconds from `now`,
    /// anything else is tried as an HTTP date. The reset header is a Unix
    /// timestamp in seconds, or an RFC 3339 instant.
    pub fn from_headers(
        retry_after: Option<&str>,
        rate_limit_reset: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let retry_at = retry_after
            .and_then(|value| parse_retry_after(value, now))
            .or_else(|| rate_limit_reset.and_then(parse_reset));

        Self {
            retry_at,
            retry_after_seconds: retry_at.map(|at| (at - now).num_seconds().max(0)),
            status: TOO_MANY_REQUESTS,
        }
    }
}

fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<i64>() {
        // Out-of-range delays count as unparsable.
        return TimeDelta::try_seconds(seconds.max(0))
            .and_then(|delay| now.checked_add_signed(delay));
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn parse_reset(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(epoch) = value.parse::<i64>() {
        return Utc.timestamp_opt(epoch, 0).single();
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::RateLimitSignal;

    #[test]
    fn numeric_retry_after_is_seconds_from_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let signal = RateLimitSignal::from_headers(Some("120"), None, now);
        assert_eq!(signal.retry_at, Some(now + Duration::milliseconds(120_000)));
        assert_eq!(signal.retry_after_seconds, Some(120));
        assert_eq!(signal.status, 429);
    }

    #[test]
    fn http_date_retry_after_is_parsed() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        let signal =
            RateLimitSignal::from_headers(Some("Wed, 21 Oct 2015 07:28:00 GMT"), None, now);
        assert_eq!(
            signal.retry_at,
            Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap())
        );
        assert_eq!(signal.retry_after_seconds, Some(60));
    }

    #[test]
    fn reset_header_is_the_fallback() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let reset = (now.timestamp() + 300).to_string();
        let signal = RateLimitSignal::from_headers(Some("soon"), Some(reset.as_str()), now);
        assert_eq!(signal.retry_at, Some(now + Duration::seconds(300)));

        let iso = RateLimitSignal::from_headers(None, Some("2024-05-01T12:05:00.000Z"), now);
        assert_eq!(iso.retry_at, Some(now + Duration::seconds(300)));
    }

    #[test]
    fn no_headers_means_no_hint() {
        let now = Utc::now();
        let signal = RateLimitSignal::from_headers(None, None, now);
        assert_eq!(signal.retry_at, None);
        assert_eq!(signal.retry_after_seconds, None);
    }

    #[test]
    fn huge_retry_after_falls_back_to_reset() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let signal = RateLimitSignal::from_headers(Some("10000000000000"), None, now);
        assert_eq!(signal.retry_at, None);
        assert_eq!(signal.retry_after_seconds, None);

        let reset = (now.timestamp() + 60).to_string();
        let signal =
            RateLimitSignal::from_headers(Some("9223372036854775807"), Some(reset.as_str()), now);
        assert_eq!(signal.retry_at, Some(now + Duration::seconds(60)));
        assert_eq!(signal.retry_after_seconds, Some(60));
    }
}
