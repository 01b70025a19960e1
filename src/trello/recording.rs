//! Recording transport double for service-layer tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::client::{ApiMethod, Transport};
use crate::error::WardenError;

/// One observed call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// HTTP method.
    pub method: ApiMethod,
    /// Request path (uploads record their target path too).
    pub path: String,
    /// JSON body, `Value::Null` when absent.
    pub body: Value,
}

/// Records every call and replays stubbed responses.
///
/// Unstubbed calls succeed with `Value::Null`, which matches how the
/// service layer treats most responses it does not read.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<HashMap<String, Vec<Result<Value, u16>>>>,
    downloads: Mutex<HashMap<String, Vec<u8>>>,
}

fn key(method: ApiMethod, path: &str) -> String {
    format!("{} {path}", method.as_str())
}

impl RecordingTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response for the given method and path.
    pub fn stub(&self, method: ApiMethod, path: &str, response: Value) {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry(key(method, path))
                .or_default()
                .push(Ok(response));
        }
    }

    /// Queues an API error with the given status for the method and path.
    pub fn stub_error(&self, method: ApiMethod, path: &str, status: u16) {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry(key(method, path))
                .or_default()
                .push(Err(status));
        }
    }

    /// Sets the bytes served for a download URL.
    pub fn stub_download(&self, url: &str, bytes: Vec<u8>) {
        if let Ok(mut downloads) = self.downloads.lock() {
            downloads.insert(url.to_string(), bytes);
        }
    }

    /// Snapshot of every observed call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of observed calls matching method and path prefix.
    #[must_use]
    pub fn count(&self, method: ApiMethod, path_prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method == method && c.path.starts_with(path_prefix))
            .count()
    }

    fn record(&self, method: ApiMethod, path: &str, body: Value) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                method,
                path: path.to_string(),
                body,
            });
        }
    }

    fn next_response(&self, method: ApiMethod, path: &str) -> Result<Value, WardenError> {
        let stubbed = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| {
                let queue = responses.get_mut(&key(method, path))?;
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            });
        match stubbed {
            Some(Ok(value)) => Ok(value),
            Some(Err(status)) => Err(WardenError::Api {
                status,
                body: "stubbed error".to_string(),
            }),
            None => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        method: ApiMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WardenError> {
        self.record(method, path, body.unwrap_or(Value::Null));
        self.next_response(method, path)
    }

    async fn upload(
        &self,
        path: &str,
        file_name: &str,
        _bytes: Vec<u8>,
    ) -> Result<Value, WardenError> {
        self.record(
            ApiMethod::Post,
            path,
            serde_json::json!({"multipart": file_name}),
        );
        self.next_response(ApiMethod::Post, path)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, WardenError> {
        self.record(ApiMethod::Get, url, Value::Null);
        let bytes = self
            .downloads
            .lock()
            .ok()
            .and_then(|d| d.get(url).cloned());
        bytes.ok_or_else(|| WardenError::Api {
            status: 404,
            body: format!("no stubbed download for {url}"),
        })
    }
}
