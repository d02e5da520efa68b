/// Default base URL for generation requests.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Normalize a host/base URL to the streaming generate endpoint.
///
/// Normalization rules:
/// 1) keep `/api/generate` unchanged
/// 2) append `/generate` when path ends in `/api`
/// 3) append `/api/generate` otherwise
pub fn normalize_generate_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_HOST
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/api/generate") {
        return trimmed.to_string();
    }
    if trimmed.ends_with("/api") {
        return format!("{trimmed}/generate");
    }
    format!("{trimmed}/api/generate")
}
