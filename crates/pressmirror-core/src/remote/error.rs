//! Failure taxonomy for calls to the publishing platform.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::sanitize::{is_sensitive_param, redact_secrets, REDACTED};
use crate::retry::RetryClass;

/// Graph error codes that signal throttling rather than a bad request.
pub const RATE_LIMIT_CODES: &[i64] = &[4, 17, 32, 613];

/// Graph error code for an expired or revoked access token.
pub const INVALID_TOKEN_CODE: i64 = 190;

/// Operation name and (redacted) parameters of a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct CallContext {
    pub operation: String,
    pub params: Vec<(String, String)>,
}

impl CallContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self { operation: operation.into(), params: Vec::new() }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl AsRef<str>) -> Self {
        let key = key.into();
        let value =
            if is_sensitive_param(&key) { REDACTED.to_string() } else { redact_secrets(value.as_ref()) };
        self.params.push((key, value));
        self
    }

    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        for (k, v) in params {
            self = self.param(k, v);
        }
        self
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if !self.params.is_empty() {
            let joined: Vec<String> = self.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, "({})", joined.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartFailureKind {
    /// The part body was not valid JSON
    Parse,
    /// The part returned a non-success status
    Status,
    /// A dependent part failed and its error handler rejected it
    Dependent,
}

/// Diagnostic for one failed part of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartFailure {
    pub index: usize,
    pub relative_url: String,
    pub kind: PartFailureKind,
    pub code: Option<u16>,
    pub message: String,
}

impl fmt::Display for PartFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {:?}", self.index, self.relative_url, self.kind)?;
        if let Some(code) = self.code {
            write!(f, " [{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Transport timeout or a batch part that never produced a result
    #[error("Timeout during {context}")]
    Timeout { context: CallContext },

    /// Upstream throttling
    #[error("Rate limited during {context} (code {code})")]
    RateLimited { code: i64, context: CallContext },

    /// Non-transient API error, enriched with call context
    #[error("API error during {context}: HTTP {status}{}: {message}", code.map(|c| format!(" code {c}")).unwrap_or_default())]
    Api { status: u16, code: Option<i64>, message: String, context: CallContext },

    /// One or more batch parts failed; successful parts are kept in `partial`
    #[error("Batch failed ({} of {} part(s)): {}", failures.len(), partial.len(), join_failures(failures))]
    Batch { failures: Vec<PartFailure>, partial: Vec<Option<Value>> },

    /// Malformed response
    #[error("Decode error during {context}: {message}")]
    Decode { message: String, context: CallContext },

    /// The platform rejected an article import
    #[error("Import {import_id} failed: {}", errors.join("; "))]
    Import { import_id: String, errors: Vec<String> },

    #[error("Import {import_id} did not finish within {waited_secs}s")]
    ImportTimeout { import_id: String, waited_secs: u64 },

    #[error("Import {import_id} reported unexpected status '{status}'")]
    UnexpectedImportStatus { import_id: String, status: String },

    #[error("Max attempts exceeded after {attempts} attempt(s): {source}")]
    MaxAttemptsExceeded { attempts: u32, source: Box<RemoteError> },

    #[error("No access token available")]
    NoAccessToken,

    /// Other transport failure (connection reset, TLS, invalid URL)
    #[error("Transport error during {context}: {message}")]
    Transport { message: String, context: CallContext },
}

fn join_failures(failures: &[PartFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl RemoteError {
    /// Build the error for a Graph error body, classifying throttling codes
    /// as retryable.
    pub fn from_graph_error(status: u16, body: &Value, context: CallContext) -> Self {
        let error = body.get("error");
        let code = error.and_then(|e| e.get("code")).and_then(Value::as_i64);
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(redact_secrets)
            .unwrap_or_else(|| redact_secrets(&body.to_string()));

        match code {
            Some(c) if RATE_LIMIT_CODES.contains(&c) => Self::RateLimited { code: c, context },
            _ => Self::Api { status, code, message, context },
        }
    }

    pub fn decode(message: impl Into<String>, context: CallContext) -> Self {
        Self::Decode { message: redact_secrets(&message.into()), context }
    }

    /// Strip the retry wrapper.
    pub fn root(&self) -> &RemoteError {
        match self {
            Self::MaxAttemptsExceeded { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn graph_code(&self) -> Option<i64> {
        match self.root() {
            Self::Api { code, .. } => *code,
            Self::RateLimited { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Import failures are permanent rejections of one article.
    pub fn is_import_failure(&self) -> bool {
        matches!(
            self.root(),
            Self::Import { .. } | Self::ImportTimeout { .. } | Self::UnexpectedImportStatus { .. }
        )
    }

    pub fn is_invalid_token(&self) -> bool {
        self.graph_code() == Some(INVALID_TOKEN_CODE)
    }
}

impl RetryClass for RemoteError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RateLimited { .. })
    }

    fn exhausted(self, attempts: u32) -> Self {
        Self::MaxAttemptsExceeded { attempts, source: Box::new(self) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_redacts_sensitive_params() {
        let ctx = CallContext::new("list")
            .param("path", "123/posts")
            .param("access_token", "EAAGsecret");
        let shown = ctx.to_string();
        assert_eq!(shown, "list(path=123/posts, access_token=[REDACTED])");
    }

    #[test]
    fn context_redacts_secrets_inside_values() {
        let ctx = CallContext::new("page").param("url", "https://x/y?after=a&access_token=EAAG1");
        assert!(!ctx.to_string().contains("EAAG1"));
    }

    #[test]
    fn graph_throttle_codes_are_retryable() {
        let body = json!({"error": {"code": 613, "message": "Calls to this api have exceeded the rate limit."}});
        let err = RemoteError::from_graph_error(400, &body, CallContext::new("get"));
        assert!(matches!(err, RemoteError::RateLimited { code: 613, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn graph_application_errors_are_fatal() {
        let body = json!({"error": {"code": 100, "message": "(#100) Invalid parameter", "type": "OAuthException"}});
        let err = RemoteError::from_graph_error(400, &body, CallContext::new("post").param("page", "1"));
        assert!(!err.is_retryable());
        assert_eq!(err.graph_code(), Some(100));
        assert!(err.to_string().contains("post(page=1)"));
        assert!(err.to_string().contains("code 100"));
    }

    #[test]
    fn exhausted_preserves_original_detail() {
        let err = RemoteError::Timeout { context: CallContext::new("batch") }.exhausted(3);
        assert!(!err.is_retryable());
        assert!(matches!(err.root(), RemoteError::Timeout { .. }));
        assert!(err.to_string().contains("3 attempt"));
        assert!(err.to_string().contains("Timeout during batch"));
    }

    #[test]
    fn import_failures_are_recognised_through_retry_wrapper() {
        let err = RemoteError::ImportTimeout { import_id: "9".to_string(), waited_secs: 60 };
        assert!(err.is_import_failure());
        let wrapped = RemoteError::MaxAttemptsExceeded { attempts: 1, source: Box::new(err) };
        assert!(wrapped.is_import_failure());
        assert!(!RemoteError::NoAccessToken.is_import_failure());
    }

    #[test]
    fn invalid_token_code() {
        let body = json!({"error": {"code": 190, "message": "Error validating access token"}});
        assert!(RemoteError::from_graph_error(400, &body, CallContext::new("get")).is_invalid_token());
    }
}
