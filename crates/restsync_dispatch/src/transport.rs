//! Transport layer abstraction for issuing requests.

use crate::error::{DispatchError, DispatchResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use restsync_core::Verb;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Verb> for Method {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Index | Verb::Show => Method::Get,
            Verb::Create => Method::Post,
            Verb::Update => Method::Put,
            Verb::Destroy => Method::Delete,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Full URL including the query string.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// JSON body, for non-GET requests.
    pub body: Option<Vec<u8>>,
}

impl TransportRequest {
    /// Creates a request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Parses the body as JSON.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }

    /// Returns the value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase of the status.
    pub status_text: String,
    /// Raw body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Creates a response with a raw body.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            status_text: status_text(status),
            body,
        }
    }

    /// Creates a response with a JSON body.
    pub fn from_json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string().into_bytes())
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON. An empty body is `null`.
    pub fn json(&self) -> serde_json::Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
    }
}

/// Returns the canonical reason phrase of a status code.
pub fn status_text(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

/// Sends requests to the API.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, mock for testing, etc.).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the response.
    ///
    /// An error means no response was received; non-2xx responses are
    /// returned as `Ok`.
    async fn send(&self, request: TransportRequest) -> DispatchResult<TransportResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: TransportRequest) -> DispatchResult<TransportResponse> {
        (**self).send(request).await
    }
}

#[derive(Debug, Clone)]
enum MockOutcome {
    Response(TransportResponse),
    Error(String),
}

/// A scripted reply of the [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockReply {
    outcome: MockOutcome,
    delay: Duration,
}

impl MockReply {
    /// Replies with a JSON body.
    pub fn json(status: u16, body: Value) -> Self {
        Self::response(TransportResponse::from_json(status, &body))
    }

    /// Replies with a raw body.
    pub fn raw(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::response(TransportResponse::new(status, body.into()))
    }

    /// Replies with a full response.
    pub fn response(response: TransportResponse) -> Self {
        Self {
            outcome: MockOutcome::Response(response),
            delay: Duration::ZERO,
        }
    }

    /// Fails without a response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            outcome: MockOutcome::Error(message.into()),
            delay: Duration::ZERO,
        }
    }

    /// Delays the reply.
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type RouteKey = (Method, String);

/// A mock transport for testing.
///
/// Replies are scripted per method and URL. One-shot replies are used in
/// the order they were added, before the persistent reply of a route.
#[derive(Debug, Default)]
pub struct MockTransport {
    persistent: Mutex<HashMap<RouteKey, MockReply>>,
    queued: Mutex<HashMap<RouteKey, VecDeque<MockReply>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reply for every request to this route.
    pub fn respond(&self, method: Method, url: impl Into<String>, reply: MockReply) {
        self.persistent.lock().insert((method, url.into()), reply);
    }

    /// Adds a reply used by one request to this route.
    pub fn respond_once(&self, method: Method, url: impl Into<String>, reply: MockReply) {
        self.queued
            .lock()
            .entry((method, url.into()))
            .or_default()
            .push_back(reply);
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_reply(&self, key: &RouteKey) -> Option<MockReply> {
        let once = self
            .queued
            .lock()
            .get_mut(key)
            .and_then(VecDeque::pop_front);
        once.or_else(|| self.persistent.lock().get(key).cloned())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> DispatchResult<TransportResponse> {
        let key = (request.method, request.url.clone());
        self.requests.lock().push(request);

        let reply = self.next_reply(&key).ok_or_else(|| {
            DispatchError::transport(format!("no mock reply for {} {}", key.0, key.1))
        })?;

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        match reply.outcome {
            MockOutcome::Response(response) => Ok(response),
            MockOutcome::Error(message) => Err(DispatchError::transport(message)),
        }
    }
}
