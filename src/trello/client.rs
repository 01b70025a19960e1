//! Transport port and the typed client built on it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::WardenError;

/// HTTP method subset the external API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl ApiMethod {
    /// Uppercase wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Wire-level access to the external API and attachment content.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Sends one authenticated API call. Any non-success status or
    /// transport failure is an error carrying status and body.
    async fn send(
        &self,
        method: ApiMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WardenError>;

    /// Uploads raw bytes as a multipart file attachment.
    async fn upload(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, WardenError>;

    /// Downloads raw content from an absolute URL (attachment bytes).
    async fn download(&self, url: &str) -> Result<Vec<u8>, WardenError>;
}

/// reqwest-backed transport authenticated with the application key and one
/// board's access token, passed as query parameters on every call.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    key: String,
    token: String,
}

impl HttpTransport {
    /// Creates a transport bound to one board token.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str, key: &str, token: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            token: token.to_string(),
        }
    }

    fn request(&self, method: ApiMethod, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let builder = match method {
            ApiMethod::Get => self.http.get(&url),
            ApiMethod::Post => self.http.post(&url),
            ApiMethod::Put => self.http.put(&url),
            ApiMethod::Delete => self.http.delete(&url),
        };
        builder.query(&[("key", self.key.as_str()), ("token", self.token.as_str())])
    }
}

async fn read_response(response: reqwest::Response) -> Result<Value, WardenError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| WardenError::Transport(e.to_string()))?;
    if !status.is_success() {
        return Err(WardenError::Api {
            status: status.as_u16(),
            body: text,
        });
    }
    if text.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: ApiMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WardenError> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| WardenError::Transport(e.to_string()))?;
        read_response(response).await
    }

    async fn upload(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, WardenError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("name", file_name.to_string())
            .part("file", part);
        let response = self
            .request(ApiMethod::Post, path)
            .multipart(form)
            .send()
            .await
            .map_err(|e| WardenError::Transport(e.to_string()))?;
        read_response(response).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, WardenError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| WardenError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(WardenError::Api {
                status: status.as_u16(),
                body: format!("download failed for {url}"),
            });
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| WardenError::Transport(e.to_string()))
    }
}

/// Typed convenience layer over a [`Transport`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    /// Wraps a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Access to the underlying transport for uploads and downloads.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn decode<T: DeserializeOwned>(value: Value) -> Result<T, WardenError> {
        serde_json::from_value(value)
            .map_err(|e| WardenError::Transport(format!("unexpected response shape: {e}")))
    }

    fn encode<B: Serialize>(body: &B) -> Result<Value, WardenError> {
        serde_json::to_value(body).map_err(|e| WardenError::Transport(format!("serialize: {e}")))
    }

    /// GET returning a typed response.
    ///
    /// # Errors
    ///
    /// Propagates transport/API errors and response decode failures.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, WardenError> {
        Self::decode(self.transport.send(ApiMethod::Get, path, None).await?)
    }

    /// POST returning a typed response.
    ///
    /// # Errors
    ///
    /// Propagates transport/API errors and response decode failures.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, WardenError> {
        let body = Self::encode(body)?;
        Self::decode(self.transport.send(ApiMethod::Post, path, Some(body)).await?)
    }

    /// POST discarding the response.
    ///
    /// # Errors
    ///
    /// Propagates transport/API errors.
    pub async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), WardenError> {
        let body = Self::encode(body)?;
        self.transport.send(ApiMethod::Post, path, Some(body)).await?;
        Ok(())
    }

    /// PUT discarding the response.
    ///
    /// # Errors
    ///
    /// Propagates transport/API errors.
    pub async fn put_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), WardenError> {
        let body = Self::encode(body)?;
        self.transport.send(ApiMethod::Put, path, Some(body)).await?;
        Ok(())
    }

    /// DELETE discarding the response.
    ///
    /// # Errors
    ///
    /// Propagates transport/API errors.
    pub async fn delete(&self, path: &str) -> Result<(), WardenError> {
        self.transport.send(ApiMethod::Delete, path, None).await?;
        Ok(())
    }
}
