//! Batched remote calls.
//!
//! A batch packs several logical requests into one round trip and yields a
//! positionally matched list of results. Part handling:
//!
//! - missing result on an independent part: the whole batch is a transient
//!   timeout and is retried as a unit
//! - invalid-reference status on a dependent part: the caller's error handler
//!   decides whether the failure is benign and supplies the effective result
//! - any other non-success status, or an undecodable body: recorded as a
//!   per-part failure
//!
//! Part failures are collected over the whole batch and raised together.

use serde_json::Value;
use std::sync::Arc;

use super::error::{CallContext, PartFailure, PartFailureKind, RemoteError};
use super::sanitize::redact_secrets;
use super::token_pool::TokenPool;
use super::transport::{BatchPart, BatchRequest, GraphTransport};
use crate::retry::RetryExecutor;

pub const SUCCESS_STATUS: u16 = 200;

/// Status and error type the platform uses when a dependent part cannot
/// resolve its reference into an earlier result.
pub const INVALID_REFERENCE_STATUS: u16 = 400;
pub const INVALID_REFERENCE_TYPE: &str = "GraphBatchException";

/// Decides whether a failed dependent part is benign. Receives the result of
/// the part it depends on and its own index; `Ok` becomes the part's result.
pub type ErrorHandler = Arc<dyn Fn(Option<&Value>, usize) -> Result<Value, String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct BatchOptions {
    pub access_token: Option<String>,
    pub error_handler: Option<ErrorHandler>,
}

impl BatchOptions {
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Option<&Value>, usize) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

#[derive(Clone)]
pub struct BatchClient {
    transport: Arc<dyn GraphTransport>,
    tokens: Arc<TokenPool>,
    retry: RetryExecutor,
}

impl BatchClient {
    pub fn new(
        transport: Arc<dyn GraphTransport>,
        tokens: Arc<TokenPool>,
        retry: RetryExecutor,
    ) -> Self {
        Self { transport, tokens, retry }
    }

    pub async fn call_batched(
        &self,
        requests: &[BatchRequest],
        options: &BatchOptions,
    ) -> Result<Vec<Value>, RemoteError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let pooled = options.access_token.is_none();
        let token = self.tokens.resolve(options.access_token.as_deref())?;
        let token_ref = token.as_str();

        let outcome = self
            .retry
            .execute("batch", |_| async move {
                let parts = self.transport.batch(token_ref, requests).await?;
                ensure_answered(requests, &parts)?;
                Ok::<_, RemoteError>(parts)
            })
            .await;

        let parts = match outcome {
            Ok(parts) => parts,
            Err(e) => {
                if pooled && e.is_invalid_token() {
                    self.tokens.revoke(&token);
                }
                return Err(e);
            },
        };

        process_parts(requests, parts, options.error_handler.as_ref())
    }
}

/// Escalate unanswered independent parts as a batch-level timeout.
fn ensure_answered(
    requests: &[BatchRequest],
    parts: &[Option<BatchPart>],
) -> Result<(), RemoteError> {
    if parts.len() != requests.len() {
        return Err(RemoteError::decode(
            format!("expected {} part(s), got {}", requests.len(), parts.len()),
            CallContext::new("batch"),
        ));
    }
    let missing = requests
        .iter()
        .zip(parts)
        .position(|(request, part)| part.is_none() && !request.is_dependent());
    match missing {
        Some(index) => Err(RemoteError::Timeout {
            context: CallContext::new("batch")
                .param("part", index.to_string())
                .param("relative_url", &requests[index].relative_url),
        }),
        None => Ok(()),
    }
}

pub(crate) fn process_parts(
    requests: &[BatchRequest],
    parts: Vec<Option<BatchPart>>,
    handler: Option<&ErrorHandler>,
) -> Result<Vec<Value>, RemoteError> {
    let mut results: Vec<Option<Value>> = Vec::with_capacity(requests.len());
    let mut failures: Vec<PartFailure> = Vec::new();

    for (index, (request, part)) in requests.iter().zip(parts).enumerate() {
        let outcome = match part {
            Some(part) if part.code == SUCCESS_STATUS => decode_body(&part)
                .map_err(|message| failure(index, request, PartFailureKind::Parse, Some(part.code), message)),
            Some(part) if request.is_dependent() && is_invalid_reference(&part) => {
                resolve_dependent(index, request, requests, &results, handler, Some(part.code))
            },
            Some(part) => Err(failure(
                index,
                request,
                PartFailureKind::Status,
                Some(part.code),
                status_message(&part),
            )),
            // Only dependent parts can still be unanswered here.
            None => resolve_dependent(index, request, requests, &results, handler, None),
        };

        match outcome {
            Ok(value) => results.push(Some(value)),
            Err(f) => {
                tracing::debug!("[Batch] part failed: {}", f);
                failures.push(f);
                results.push(None);
            },
        }
    }

    if failures.is_empty() {
        Ok(results.into_iter().map(Option::unwrap_or_default).collect())
    } else {
        Err(RemoteError::Batch { failures, partial: results })
    }
}

fn resolve_dependent(
    index: usize,
    request: &BatchRequest,
    requests: &[BatchRequest],
    results: &[Option<Value>],
    handler: Option<&ErrorHandler>,
    code: Option<u16>,
) -> Result<Value, PartFailure> {
    let Some(handler) = handler else {
        return Err(failure(
            index,
            request,
            PartFailureKind::Dependent,
            code,
            "dependent part failed and no error handler was supplied".to_string(),
        ));
    };
    let previous = dependency_index(index, request, requests)
        .and_then(|i| results.get(i))
        .and_then(Option::as_ref);
    handler(previous, index)
        .map_err(|message| failure(index, request, PartFailureKind::Dependent, code, message))
}

/// Index of the named part this one depends on, else the part before it.
fn dependency_index(index: usize, request: &BatchRequest, requests: &[BatchRequest]) -> Option<usize> {
    request
        .depends_on
        .as_deref()
        .and_then(|name| requests[..index].iter().position(|r| r.name.as_deref() == Some(name)))
        .or_else(|| index.checked_sub(1))
}

fn decode_body(part: &BatchPart) -> Result<Value, String> {
    match part.body.as_deref().map(str::trim) {
        None | Some("") => Ok(Value::Null),
        Some(body) => serde_json::from_str(body).map_err(|e| format!("invalid part body: {e}")),
    }
}

fn is_invalid_reference(part: &BatchPart) -> bool {
    part.code == INVALID_REFERENCE_STATUS
        && decode_body(part).ok().is_some_and(|body| {
            body.pointer("/error/type").and_then(Value::as_str) == Some(INVALID_REFERENCE_TYPE)
        })
}

fn status_message(part: &BatchPart) -> String {
    let raw = part.body.as_deref().unwrap_or_default();
    let message = serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|body| body.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| raw.to_string());
    redact_secrets(&message)
}

fn failure(
    index: usize,
    request: &BatchRequest,
    kind: PartFailureKind,
    code: Option<u16>,
    message: String,
) -> PartFailure {
    PartFailure {
        index,
        relative_url: redact_secrets(&request.relative_url),
        kind,
        code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::{error_part, ok_part, ScriptedTransport};
    use serde_json::json;

    fn client(transport: &Arc<ScriptedTransport>) -> BatchClient {
        BatchClient::new(
            transport.clone(),
            Arc::new(TokenPool::from_values(["page-token"])),
            RetryExecutor::new(3),
        )
    }

    fn invalid_reference() -> Option<BatchPart> {
        error_part(
            400,
            json!({"error": {"type": "GraphBatchException", "message": "Cannot resolve reference"}}),
        )
    }

    #[tokio::test]
    async fn test_all_parts_succeed_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_batch(vec![ok_part(json!({"id": "1"})), ok_part(json!({"id": "2"}))]);
        let requests = vec![BatchRequest::get("1"), BatchRequest::get("2")];

        let results = client(&transport).call_batched(&requests, &BatchOptions::default()).await.unwrap();
        assert_eq!(results, vec![json!({"id": "1"}), json!({"id": "2"})]);
        assert_eq!(transport.sent_batches().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_call() {
        let transport = Arc::new(ScriptedTransport::new());
        let results = client(&transport).call_batched(&[], &BatchOptions::default()).await.unwrap();
        assert!(results.is_empty());
        assert!(transport.sent_batches().is_empty());
    }

    #[tokio::test]
    async fn test_failed_part_keeps_successful_siblings() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_batch(vec![
            ok_part(json!({"id": "1"})),
            error_part(404, json!({"error": {"code": 100, "message": "Unsupported get request"}})),
            ok_part(json!({"id": "3"})),
        ]);
        let requests = vec![BatchRequest::get("1"), BatchRequest::get("2"), BatchRequest::get("3")];

        let err = client(&transport)
            .call_batched(&requests, &BatchOptions::default())
            .await
            .unwrap_err();
        let RemoteError::Batch { failures, partial } = err else {
            panic!("expected batch error, got {err:?}");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].kind, PartFailureKind::Status);
        assert_eq!(failures[0].code, Some(404));
        assert_eq!(failures[0].message, "Unsupported get request");
        assert_eq!(partial, vec![Some(json!({"id": "1"})), None, Some(json!({"id": "3"}))]);
    }

    #[tokio::test]
    async fn test_unparseable_part_is_a_parse_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_batch(vec![Some(BatchPart::new(200, "{not json"))]);
        let err = client(&transport)
            .call_batched(&[BatchRequest::get("1")], &BatchOptions::default())
            .await
            .unwrap_err();
        match err {
            RemoteError::Batch { failures, .. } => assert_eq!(failures[0].kind, PartFailureKind::Parse),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dependent_invalid_reference_recovered_by_handler() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_batch(vec![ok_part(json!({"id": "https://x/a"})), invalid_reference()]);
        let requests = vec![
            BatchRequest::get("?id=https://x/a&fields=instant_article").named("lookup"),
            BatchRequest::delete("{result=lookup:$.instant_article.id}").depends_on("lookup"),
        ];
        let options = BatchOptions::default().with_error_handler(|previous, index| {
            assert_eq!(index, 1);
            match previous {
                Some(prev) if prev.get("instant_article").is_none() => {
                    Ok(json!({"success": false, "absent": true}))
                },
                _ => Err("lookup returned an article".to_string()),
            }
        });

        let results = client(&transport).call_batched(&requests, &options).await.unwrap();
        assert_eq!(results[1], json!({"success": false, "absent": true}));
    }

    #[tokio::test]
    async fn test_dependent_rejected_by_handler_is_recorded() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_batch(vec![ok_part(json!({"instant_article": {"id": "9"}})), invalid_reference()]);
        let requests = vec![
            BatchRequest::get("lookup").named("lookup"),
            BatchRequest::delete("{result=lookup:$.instant_article.id}").depends_on("lookup"),
        ];
        let options =
            BatchOptions::default().with_error_handler(|_, _| Err("reference should exist".to_string()));

        let err = client(&transport).call_batched(&requests, &options).await.unwrap_err();
        let RemoteError::Batch { failures, partial } = err else {
            panic!("expected batch error");
        };
        assert_eq!(failures[0].kind, PartFailureKind::Dependent);
        assert_eq!(failures[0].message, "reference should exist");
        assert!(partial[0].is_some());
    }

    #[tokio::test]
    async fn test_dependent_without_handler_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_batch(vec![ok_part(json!({})), invalid_reference()]);
        let requests = vec![
            BatchRequest::get("a").named("a"),
            BatchRequest::delete("{result=a:$.id}").depends_on("a"),
        ];
        let err = client(&transport)
            .call_batched(&requests, &BatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Batch { .. }));
    }

    #[tokio::test]
    async fn test_missing_independent_part_retries_whole_batch() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_batch(vec![ok_part(json!(1)), None])
            .push_batch(vec![ok_part(json!(1)), ok_part(json!(2))]);
        let requests = vec![BatchRequest::get("1"), BatchRequest::get("2")];

        let results = client(&transport).call_batched(&requests, &BatchOptions::default()).await.unwrap();
        assert_eq!(results, vec![json!(1), json!(2)]);
        assert_eq!(transport.sent_batches().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_part_exhausts_attempts() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..3 {
            transport.push_batch(vec![None]);
        }
        let err = client(&transport)
            .call_batched(&[BatchRequest::get("1")], &BatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::MaxAttemptsExceeded { attempts: 3, .. }));
        assert!(matches!(err.root(), RemoteError::Timeout { .. }));
        assert_eq!(transport.sent_batches().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_dependent_part_goes_to_handler() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_batch(vec![ok_part(json!({"id": "x"})), None]);
        let requests =
            vec![BatchRequest::get("x").named("x"), BatchRequest::delete("{result=x:$.y}").depends_on("x")];
        let options = BatchOptions::default().with_error_handler(|_, _| Ok(json!(null)));

        let results = client(&transport).call_batched(&requests, &options).await.unwrap();
        assert_eq!(results[1], json!(null));
        assert_eq!(transport.sent_batches().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_pooled_token_is_revoked() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = json!({"error": {"code": 190, "message": "Error validating access token"}});
        transport.push_batch_error(RemoteError::from_graph_error(
            400,
            &body,
            CallContext::new("batch"),
        ));
        let tokens = Arc::new(TokenPool::from_values(["stale"]));
        let client = BatchClient::new(transport.clone(), tokens.clone(), RetryExecutor::new(3));

        let err = client
            .call_batched(&[BatchRequest::get("1")], &BatchOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid_token());
        assert!(tokens.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_token_is_never_revoked() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = json!({"error": {"code": 190, "message": "expired"}});
        transport.push_batch_error(RemoteError::from_graph_error(400, &body, CallContext::new("batch")));
        let tokens = Arc::new(TokenPool::from_values(["pooled"]));
        let client = BatchClient::new(transport.clone(), tokens.clone(), RetryExecutor::new(1));

        let options = BatchOptions::default().with_access_token("explicit");
        let _ = client.call_batched(&[BatchRequest::get("1")], &options).await;
        assert_eq!(tokens.len(), 1);
    }
}
