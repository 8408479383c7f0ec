//! Access tokens for the publishing platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into(), label: None, added_at: Utc::now() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Short, non-secret identifier suitable for logs.
    pub fn fingerprint(&self) -> String {
        let tail: String =
            self.value.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("…{tail}")
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("label", &self.label)
            .field("added_at", &self.added_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_prints_secret() {
        let token = AccessToken::new("EAAGsecretvalue1234").with_label("page");
        let printed = format!("{:?}", token);
        assert!(!printed.contains("EAAGsecret"));
        assert!(printed.contains("page"));
        assert_eq!(token.fingerprint(), "…1234");
    }
}
