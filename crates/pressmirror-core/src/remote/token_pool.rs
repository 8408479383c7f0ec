//! Rotating pool of page access tokens.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use super::error::RemoteError;
use pressmirror_types::AccessToken;

type RevokeHook = Box<dyn Fn(&str) + Send + Sync>;

/// Round-robin token selection. Tokens are added externally and removed on
/// revocation; the cursor survives membership changes.
#[derive(Default)]
pub struct TokenPool {
    tokens: RwLock<Vec<AccessToken>>,
    cursor: AtomicUsize,
    on_revoke: OnceLock<RevokeHook>,
}

impl fmt::Debug for TokenPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPool")
            .field("tokens", &self.tokens.read().len())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .field("persists_revocations", &self.on_revoke.get().is_some())
            .finish()
    }
}

impl TokenPool {
    pub fn new(tokens: Vec<AccessToken>) -> Self {
        Self { tokens: RwLock::new(tokens), ..Self::default() }
    }

    /// Register the callback run after a token is revoked, typically to drop
    /// it from persisted configuration. Only the first registration sticks.
    pub fn on_revoke(&self, hook: impl Fn(&str) + Send + Sync + 'static) -> bool {
        self.on_revoke.set(Box::new(hook)).is_ok()
    }

    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool = Self::default();
        for value in values {
            pool.add(AccessToken::new(value));
        }
        pool
    }

    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }

    /// Next token in rotation.
    pub fn next(&self) -> Result<AccessToken, RemoteError> {
        let tokens = self.tokens.read();
        if tokens.is_empty() {
            return Err(RemoteError::NoAccessToken);
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % tokens.len();
        Ok(tokens[idx].clone())
    }

    /// Explicit token if supplied, otherwise the next pooled one.
    pub fn resolve(&self, explicit: Option<&str>) -> Result<String, RemoteError> {
        match explicit {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => self.next().map(|t| t.value),
        }
    }

    /// Returns false if the token was already registered.
    pub fn add(&self, token: AccessToken) -> bool {
        let value = token.value.trim().to_string();
        if value.is_empty() {
            return false;
        }
        let mut tokens = self.tokens.write();
        if tokens.iter().any(|t| t.value == value) {
            return false;
        }
        tokens.push(AccessToken { value, ..token });
        true
    }

    pub fn revoke(&self, value: &str) -> bool {
        let remaining = {
            let mut tokens = self.tokens.write();
            let before = tokens.len();
            tokens.retain(|t| t.value != value);
            (tokens.len() < before).then_some(tokens.len())
        };
        let Some(remaining) = remaining else {
            return false;
        };
        match self.on_revoke.get() {
            Some(hook) => {
                tracing::warn!("[TokenPool] Revoked access token ({} remaining)", remaining);
                hook(value);
            },
            None => tracing::warn!(
                "[TokenPool] Revoked access token for this process only ({} remaining); it returns on restart",
                remaining
            ),
        }
        true
    }
}
