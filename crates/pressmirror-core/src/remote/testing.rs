//! Scripted transport for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

use super::error::RemoteError;
use super::transport::{BatchPart, BatchRequest, GraphTransport, HttpMethod};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub access_token: String,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Replays queued responses in order and records what was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    batches: Mutex<VecDeque<Result<Vec<Option<BatchPart>>, RemoteError>>>,
    calls: Mutex<VecDeque<Result<Value, RemoteError>>>,
    sent_batches: Mutex<Vec<Vec<BatchRequest>>>,
    sent_calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&self, parts: Vec<Option<BatchPart>>) -> &Self {
        self.batches.lock().push_back(Ok(parts));
        self
    }

    pub fn push_batch_error(&self, err: RemoteError) -> &Self {
        self.batches.lock().push_back(Err(err));
        self
    }

    pub fn push_call(&self, body: Value) -> &Self {
        self.calls.lock().push_back(Ok(body));
        self
    }

    pub fn push_call_error(&self, err: RemoteError) -> &Self {
        self.calls.lock().push_back(Err(err));
        self
    }

    pub fn sent_batches(&self) -> Vec<Vec<BatchRequest>> {
        self.sent_batches.lock().clone()
    }

    pub fn sent_calls(&self) -> Vec<RecordedCall> {
        self.sent_calls.lock().clone()
    }
}

#[async_trait]
impl GraphTransport for ScriptedTransport {
    async fn batch(
        &self,
        _access_token: &str,
        requests: &[BatchRequest],
    ) -> Result<Vec<Option<BatchPart>>, RemoteError> {
        self.sent_batches.lock().push(requests.to_vec());
        self.batches.lock().pop_front().unwrap_or_else(|| {
            Err(RemoteError::decode("no scripted batch response", Default::default()))
        })
    }

    async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
        access_token: &str,
    ) -> Result<Value, RemoteError> {
        self.sent_calls.lock().push(RecordedCall {
            method,
            path: path.to_string(),
            params: params.to_vec(),
            access_token: access_token.to_string(),
        });
        self.calls.lock().pop_front().unwrap_or_else(|| {
            Err(RemoteError::decode("no scripted call response", Default::default()))
        })
    }
}

/// A successful part whose body is `value` encoded as JSON.
pub fn ok_part(value: Value) -> Option<BatchPart> {
    Some(BatchPart::new(200, value.to_string()))
}

pub fn error_part(code: u16, value: Value) -> Option<BatchPart> {
    Some(BatchPart::new(code, value.to_string()))
}
