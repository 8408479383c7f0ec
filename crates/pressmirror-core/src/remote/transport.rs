use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::error::{CallContext, RemoteError};
use super::sanitize::redact_secrets;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    fn as_reqwest(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        })
    }
}

/// One logical request inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRequest {
    pub method: HttpMethod,
    pub relative_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
}

impl BatchRequest {
    pub fn new(method: HttpMethod, relative_url: impl Into<String>) -> Self {
        Self { method, relative_url: relative_url.into(), name: None, depends_on: None }
    }

    pub fn get(relative_url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, relative_url)
    }

    pub fn delete(relative_url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, relative_url)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark this part as consuming the result of the part called `name`.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on = Some(name.into());
        self
    }

    pub fn is_dependent(&self) -> bool {
        self.depends_on.is_some()
    }
}

/// Raw part of a batch response. `body` is JSON encoded as a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BatchPart {
    pub code: u16,
    #[serde(default)]
    pub body: Option<String>,
}

impl BatchPart {
    pub fn new(code: u16, body: impl Into<String>) -> Self {
        Self { code, body: Some(body.into()) }
    }
}

/// Wire access to the publishing platform.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// Send `requests` in one round trip. The result is positionally matched;
    /// `None` marks a part the platform did not answer.
    async fn batch(
        &self,
        access_token: &str,
        requests: &[BatchRequest],
    ) -> Result<Vec<Option<BatchPart>>, RemoteError>;

    /// Single call. `path` may be relative to the versioned root or an
    /// absolute continuation URL.
    async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
        access_token: &str,
    ) -> Result<Value, RemoteError>;
}

pub struct HttpGraphTransport {
    client: Client,
    base_url: String,
}

impl HttpGraphTransport {
    /// Accepts a pre-built client so callers control timeouts and pooling.
    pub fn new(client: Client, graph_base_url: &str, api_version: &str) -> Self {
        let base = graph_base_url.trim_end_matches('/');
        let version = api_version.trim_matches('/');
        let base_url =
            if version.is_empty() { base.to_string() } else { format!("{}/{}", base, version) };
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn read_json(
        response: reqwest::Response,
        context: CallContext,
    ) -> Result<Value, RemoteError> {
        let status = response.status();
        let text = response.text().await.map_err(|e| classify_transport(&e, context.clone()))?;
        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) if status.is_success() => {
                    return Err(RemoteError::decode(format!("invalid JSON body: {e}"), context));
                },
                Err(_) => Value::String(text),
            }
        };

        if status.is_success() {
            Ok(body)
        } else {
            Err(RemoteError::from_graph_error(status.as_u16(), &body, context))
        }
    }
}

/// Classify transport failures from reqwest's structured flags.
fn classify_transport(err: &reqwest::Error, context: CallContext) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout { context }
    } else {
        RemoteError::Transport { message: redact_secrets(&err.to_string()), context }
    }
}

#[async_trait]
impl GraphTransport for HttpGraphTransport {
    async fn batch(
        &self,
        access_token: &str,
        requests: &[BatchRequest],
    ) -> Result<Vec<Option<BatchPart>>, RemoteError> {
        let context = CallContext::new("batch").param("parts", requests.len().to_string());
        let encoded = serde_json::to_string(requests)
            .map_err(|e| RemoteError::decode(e.to_string(), context.clone()))?;
        let form = [
            ("access_token", access_token),
            ("batch", encoded.as_str()),
            ("include_headers", "false"),
        ];

        let response = self
            .client
            .post(&self.base_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| classify_transport(&e, context.clone()))?;

        let body = Self::read_json(response, context.clone()).await?;
        let parts: Vec<Option<BatchPart>> = serde_json::from_value(body)
            .map_err(|e| RemoteError::decode(format!("batch envelope: {e}"), context.clone()))?;

        if parts.len() != requests.len() {
            return Err(RemoteError::decode(
                format!("expected {} part(s), got {}", requests.len(), parts.len()),
                context,
            ));
        }
        Ok(parts)
    }

    async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
        access_token: &str,
    ) -> Result<Value, RemoteError> {
        let context = CallContext::new(format!("{} {}", method, redact_secrets(path)))
            .params(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let url = self.url_for(path);

        let mut builder = self.client.request(method.as_reqwest(), &url);
        // Continuation links already carry their own token and cursor.
        let absolute = url == path;
        builder = match method {
            HttpMethod::Post => {
                let mut form: Vec<(&str, &str)> =
                    params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                form.push(("access_token", access_token));
                builder.form(&form)
            },
            HttpMethod::Get | HttpMethod::Delete if absolute => builder.query(params),
            HttpMethod::Get | HttpMethod::Delete => {
                builder.query(params).query(&[("access_token", access_token)])
            },
        };

        let response = builder.send().await.map_err(|e| classify_transport(&e, context.clone()))?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Self::read_json(response, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_relative_and_absolute() {
        let transport =
            HttpGraphTransport::new(Client::new(), "https://graph.facebook.com/", "v19.0");
        assert_eq!(transport.base_url(), "https://graph.facebook.com/v19.0");
        assert_eq!(
            transport.url_for("/123/instant_articles"),
            "https://graph.facebook.com/v19.0/123/instant_articles"
        );
        let next = "https://graph.facebook.com/v19.0/123/posts?after=QVFI";
        assert_eq!(transport.url_for(next), next);
    }

    #[test]
    fn test_batch_request_serialization() {
        let parts = vec![
            BatchRequest::get("?id=https%3A%2F%2Fx&fields=instant_article").named("lookup"),
            BatchRequest::delete("{result=lookup:$.instant_article.id}").depends_on("lookup"),
        ];
        let json = serde_json::to_value(&parts).expect("serialize");
        assert_eq!(json[0]["method"], "GET");
        assert_eq!(json[0]["name"], "lookup");
        assert!(json[0].get("depends_on").is_none());
        assert_eq!(json[1]["method"], "DELETE");
        assert_eq!(json[1]["depends_on"], "lookup");
        assert!(parts[1].is_dependent());
    }

    #[test]
    fn test_null_parts_deserialize_as_none() {
        let raw = r#"[{"code":200,"body":"{\"id\":\"1\"}"},null]"#;
        let parts: Vec<Option<BatchPart>> = serde_json::from_str(raw).expect("parts");
        assert_eq!(parts.len(), 2);
        assert!(parts[1].is_none());
        assert_eq!(parts[0].as_ref().map(|p| p.code), Some(200));
    }
}
