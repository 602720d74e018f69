//! Overload backoff policy.
//!
//! The service signals "slow down" with a redirect (3xx) or a `503`, both
//! optionally carrying a `Retry-After` header in either delta-seconds or
//! HTTP-date form. The session retries the identical request exactly once
//! after the computed delay; a repeated signal is surfaced to the caller.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::config::{VppConfig, DEFAULT_RETRY_DELAY, MAX_RETRY_DELAY};

/// Computes how long to wait after an overload signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    default_delay: Duration,
    max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY, MAX_RETRY_DELAY)
    }
}

impl BackoffPolicy {
    pub fn new(default_delay: Duration, max_delay: Duration) -> Self {
        Self {
            default_delay: default_delay.min(max_delay),
            max_delay,
        }
    }

    pub fn from_config(config: &VppConfig) -> Self {
        Self::new(config.default_retry_delay, config.max_retry_delay)
    }

    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    /// Whether `status` asks the caller to retry later.
    pub fn is_overload(status: StatusCode) -> bool {
        status.is_redirection() || status == StatusCode::SERVICE_UNAVAILABLE
    }

    /// Delay for a response's headers, evaluated at `now`.
    pub fn delay_from_headers(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Duration {
        let value = headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok());
        self.delay_for(value, now)
    }

    /// Delay for a raw `Retry-After` value. Missing, empty or unparseable
    /// values yield the default delay; every result is capped.
    pub fn delay_for(&self, retry_after: Option<&str>, now: DateTime<Utc>) -> Duration {
        retry_after
            .and_then(|value| parse_retry_after(value, now))
            .unwrap_or(self.default_delay)
            .min(self.max_delay)
    }

    /// Sleep for `delay`.
    pub async fn wait(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Parse a `Retry-After` value as delta-seconds or an HTTP-date.
///
/// Delta-seconds is digits only; a count too large for `u64` saturates.
/// Dates in the past yield a zero delay. Returns `None` if the value is
/// neither form.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.bytes().all(|b| b.is_ascii_digit()) {
        return Some(value.parse::<u64>().map_or(Duration::MAX, Duration::from_secs));
    }
    let at = parse_http_date(value)?;
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// IMF-fixdate, plus the obsolete RFC 850 and asctime forms HTTP still allows.
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_secs(30), Duration::from_secs(300))
    }

    #[test]
    fn overload_statuses() {
        assert!(BackoffPolicy::is_overload(StatusCode::SERVICE_UNAVAILABLE));
        assert!(BackoffPolicy::is_overload(StatusCode::TEMPORARY_REDIRECT));
        assert!(BackoffPolicy::is_overload(StatusCode::PERMANENT_REDIRECT));
        assert!(BackoffPolicy::is_overload(StatusCode::FOUND));
        assert!(!BackoffPolicy::is_overload(StatusCode::OK));
        assert!(!BackoffPolicy::is_overload(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!BackoffPolicy::is_overload(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn integer_seconds() {
        assert_eq!(policy().delay_for(Some("5"), now()), Duration::from_secs(5));
        assert_eq!(policy().delay_for(Some(" 0 "), now()), Duration::ZERO);
    }

    #[test]
    fn past_http_date_is_zero() {
        assert_eq!(
            policy().delay_for(Some("Wed, 21 Oct 2015 07:28:00 GMT"), now()),
            Duration::ZERO
        );
    }

    #[test]
    fn future_http_date_is_difference() {
        assert_eq!(
            policy().delay_for(Some("Thu, 15 Oct 2026 12:01:30 GMT"), now()),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn obsolete_date_forms() {
        assert_eq!(
            parse_retry_after("Thursday, 15-Oct-26 12:00:10 GMT", now()),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            parse_retry_after("Thu Oct 15 12:00:20 2026", now()),
            Some(Duration::from_secs(20))
        );
    }

    #[test]
    fn empty_missing_or_garbage_uses_default() {
        let p = policy();
        assert_eq!(p.delay_for(Some(""), now()), Duration::from_secs(30));
        assert_eq!(p.delay_for(None, now()), Duration::from_secs(30));
        assert_eq!(p.delay_for(Some("soon"), now()), Duration::from_secs(30));
        assert_eq!(p.delay_for(Some("-5"), now()), Duration::from_secs(30));
        assert_eq!(
            p.delay_for(Some("Wed, 21 Oct openspace 07:28:00 GMT"), now()),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn delay_is_capped() {
        assert_eq!(policy().delay_for(Some("86400"), now()), Duration::from_secs(300));
    }

    #[test]
    fn oversized_seconds_saturate_to_cap() {
        assert_eq!(
            policy().delay_for(Some("99999999999999999999"), now()),
            Duration::from_secs(300)
        );
        assert_eq!(parse_retry_after("99999999999999999999", now()), Some(Duration::MAX));
    }

    #[test]
    fn signed_seconds_are_not_delta_seconds() {
        assert_eq!(parse_retry_after("+5", now()), None);
        assert_eq!(policy().delay_for(Some("+5"), now()), Duration::from_secs(30));
    }

    #[test]
    fn reads_header_map() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(policy().delay_from_headers(&headers, now()), Duration::from_secs(7));
        assert_eq!(
            policy().delay_from_headers(&HeaderMap::new(), now()),
            Duration::from_secs(30)
        );
    }

    #[tokio::test]
    async fn wait_zero_returns_immediately() {
        let started = std::time::Instant::now();
        policy().wait(Duration::ZERO).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    proptest! {
        /// Any delta-seconds value maps to that many seconds, capped.
        #[test]
        fn delta_seconds_round_trip(secs in 0u64..1_000_000) {
            let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let policy = BackoffPolicy::new(Duration::from_secs(30), Duration::from_secs(600));
            let expected = Duration::from_secs(secs.min(600));
            prop_assert_eq!(policy.delay_for(Some(&secs.to_string()), now), expected);
        }

        /// Past dates never produce a positive delay.
        #[test]
        fn past_dates_are_zero(offset in 1i64..10_000_000) {
            let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let past = now - chrono::Duration::seconds(offset);
            let header = past.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            prop_assert_eq!(parse_retry_after(&header, now), Some(Duration::ZERO));
        }

        /// Arbitrary text never panics and always yields a capped delay.
        #[test]
        fn arbitrary_text_is_bounded(value in ".{0,40}") {
            let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let policy = BackoffPolicy::default();
            prop_assert!(policy.delay_for(Some(&value), now) <= MAX_RETRY_DELAY);
        }
    }
}
