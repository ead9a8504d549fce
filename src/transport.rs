//! Wire layer: request description, response envelope and the HTTP transport.
//!
//! Controllers never talk to `reqwest` directly. They build an [`ApiRequest`]
//! and hand it to an [`ApiTransport`], which returns the decoded
//! [`Envelope`] every admin endpoint answers with:
//! `{ "success": bool, "message"?: string, <payload keys> }`.

use crate::error::{ConsoleError, ConsoleResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

/// Header carrying the session token. The API does not use a bearer scheme.
pub const AUTH_HEADER: &str = "X-AUTH";

/// Multipart part name the API expects for uploaded images.
pub const IMAGES_FIELD: &str = "images";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
}

impl Endpoint {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)
    }
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

/// A file selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, guessing its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> ConsoleResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ConsoleError::validation(format!("cannot read attachment {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let content_type = content_type_for(&file_name).to_string();
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Text fields plus file parts, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartPayload {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, Attachment)>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        self.files.push((name.into(), attachment));
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Attachment> + 'a {
        self.files
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, attachment)| attachment)
    }

    fn into_form(self) -> ConsoleResult<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for (name, attachment) in self.files {
            let part = reqwest::multipart::Part::bytes(attachment.bytes)
                .file_name(attachment.file_name)
                .mime_str(&attachment.content_type)
                .map_err(|e| ConsoleError::validation(format!("invalid content type: {e}")))?;
            form = form.part(name, part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartPayload),
}

impl RequestBody {
    pub fn as_multipart(&self) -> Option<&MultipartPayload> {
        match self {
            RequestBody::Multipart(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub body: RequestBody,
    pub auth_token: Option<String>,
}

impl ApiRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            body: RequestBody::Empty,
            auth_token: None,
        }
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(self, body: &T) -> ConsoleResult<Self> {
        let value = serde_json::to_value(body)?;
        Ok(self.with_body(RequestBody::Json(value)))
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

// =============================================================================
// RESPONSE ENVELOPE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            payload: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Turns `success: false` into an application error.
    pub fn ensure_success(self) -> ConsoleResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(ConsoleError::Application {
                status: None,
                message: self.message.unwrap_or_default(),
            })
        }
    }

    /// Decodes a required payload key.
    pub fn take<T: DeserializeOwned>(&mut self, key: &str) -> ConsoleResult<T> {
        let value = self
            .payload
            .remove(key)
            .ok_or_else(|| ConsoleError::Decode(format!("response is missing `{key}`")))?;
        serde_json::from_value(value)
            .map_err(|e| ConsoleError::Decode(format!("invalid `{key}`: {e}")))
    }

    /// Decodes an optional payload key; absent and `null` both yield the default.
    pub fn take_or_default<T: DeserializeOwned + Default>(&mut self, key: &str) -> ConsoleResult<T> {
        match self.payload.remove(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ConsoleError::Decode(format!("invalid `{key}`: {e}"))),
        }
    }

    pub fn take_optional<T: DeserializeOwned>(&mut self, key: &str) -> ConsoleResult<Option<T>> {
        match self.payload.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ConsoleError::Decode(format!("invalid `{key}`: {e}"))),
        }
    }
}

/// Maps an HTTP status and body onto the envelope contract.
///
/// Error statuses that still carry an envelope become application errors with
/// the server's message; anything else is a transport failure.
pub fn decode_envelope(status: u16, body: &[u8]) -> ConsoleResult<Envelope> {
    let parsed = serde_json::from_slice::<Envelope>(body);
    if (200..300).contains(&status) {
        return parsed.map_err(|e| ConsoleError::Decode(format!("invalid envelope: {e}")));
    }
    match parsed {
        Ok(envelope) => Err(ConsoleError::Application {
            status: Some(status),
            message: envelope.message.unwrap_or_default(),
        }),
        Err(_) => Err(ConsoleError::Transport(format!(
            "request failed with status code {status}"
        ))),
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ConsoleResult<Envelope>;
}

/// `reqwest`-backed transport against one API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ConsoleResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsoleError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> ConsoleResult<Envelope> {
        let ApiRequest {
            endpoint,
            body,
            auth_token,
        } = request;
        let url = self.url(&endpoint.path);
        let started = Instant::now();

        let mut builder = self.client.request(endpoint.method.into(), &url);
        if let Some(token) = auth_token.as_deref() {
            builder = builder.header(AUTH_HEADER, token);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(payload) => builder.multipart(payload.into_form()?),
        };

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(endpoint = %endpoint, error = %e, "request failed");
            ConsoleError::Transport(e.to_string())
        })?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConsoleError::Transport(e.to_string()))?;

        tracing::debug!(
            endpoint = %endpoint,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "api call completed"
        );

        decode_envelope(status, &bytes)
    }
}
