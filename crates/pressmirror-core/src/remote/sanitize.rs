//! Secret redaction. Keeps page tokens and app secrets out of logs and
//! externally reported failures.
//!
//! Pattern: everything that ends up in an error message or a log line passes
//! through [`redact_secrets`]; structured parameters are filtered by name
//! when the [`super::CallContext`] is built.

use regex::Regex;
use std::sync::LazyLock;

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_PARAMS: &[&str] =
    &["access_token", "appsecret_proof", "api_key", "client_secret", "x-api-key"];

#[allow(clippy::expect_used, reason = "literal patterns, exercised by the tests below")]
static QUERY_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(access_token|appsecret_proof|api_key|client_secret)=[^&\s]+")
        .expect("query secret pattern")
});

#[allow(clippy::expect_used, reason = "literal patterns, exercised by the tests below")]
static JSON_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(access_token|appsecret_proof|api_key|client_secret)"\s*:\s*"[^"]*""#)
        .expect("json secret pattern")
});

#[allow(clippy::expect_used, reason = "literal patterns, exercised by the tests below")]
static BEARER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._\-]+").expect("bearer pattern"));

pub fn is_sensitive_param(name: &str) -> bool {
    SENSITIVE_PARAMS.iter().any(|p| p.eq_ignore_ascii_case(name))
}

/// Replace credentials embedded in free text (URLs, JSON bodies, headers).
pub fn redact_secrets(text: &str) -> String {
    let text = QUERY_SECRET.replace_all(text, |caps: &regex::Captures<'_>| {
        format!("{}={}", &caps[1], REDACTED)
    });
    let text = JSON_SECRET.replace_all(&text, |caps: &regex::Captures<'_>| {
        format!("\"{}\":\"{}\"", &caps[1], REDACTED)
    });
    BEARER.replace_all(&text, format!("Bearer {}", REDACTED).as_str()).into_owned()
}
