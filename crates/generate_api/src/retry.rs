use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Retry attempts allowed after the initial request, before any body byte.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Base delay before the first retry.
pub const BASE_DELAY_MS: u64 = 250;

fn retryable_message_regex() -> Option<&'static Regex> {
    static CACHED: OnceLock<Option<Regex>> = OnceLock::new();
    CACHED
        .get_or_init(|| {
            Regex::new(
                r"(?i)overloaded|service.?unavailable|connection.?(refused|reset)|server busy|try again",
            )
            .ok()
        })
        .as_ref()
}

/// Retry policy for transient statuses and error texts.
///
/// Client errors such as an unknown model (404) are never retried.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    if matches!(status, 429 | 500 | 502 | 503 | 504) {
        return true;
    }
    if (400..500).contains(&status) {
        return false;
    }
    retryable_message_regex().is_some_and(|regex| regex.is_match(error_text))
}

/// Compute exponential backoff delay for a retry attempt.
pub fn retry_delay_ms(attempt: u32) -> Duration {
    let exponent = attempt.min(16);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(exponent)))
}
