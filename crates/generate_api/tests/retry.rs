use generate_api::retry::*;

#[test]
fn retry_http_status_is_retryable() {
    assert!(is_retryable_http_error(429, ""));
    assert!(is_retryable_http_error(500, ""));
    assert!(is_retryable_http_error(502, ""));
    assert!(is_retryable_http_error(503, ""));
    assert!(is_retryable_http_error(504, ""));
}

#[test]
fn client_errors_are_not_retried() {
    assert!(!is_retryable_http_error(400, "service unavailable"));
    assert!(!is_retryable_http_error(404, "model 'llama9' not found"));
}

#[test]
fn retry_http_error_pattern_is_retryable() {
    assert!(is_retryable_http_error(520, "server overloaded"));
    assert!(!is_retryable_http_error(501, "not implemented"));
}

#[test]
fn retry_delay_is_exponential() {
    assert_eq!(retry_delay_ms(0).as_millis(), 250);
    assert_eq!(retry_delay_ms(1).as_millis(), 500);
    assert_eq!(retry_delay_ms(2).as_millis(), 1000);
}
