//! HTTP transport implementation.
//!
//! Sends requests with a shared `reqwest` client. Response bodies are
//! returned raw; interpretation happens in the dispatcher.

use crate::error::{DispatchError, DispatchResult};
use crate::transport::{status_text, Method, Transport, TransportRequest, TransportResponse};
use async_trait::async_trait;
use std::time::Duration;

/// HTTP-based transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Creates a transport with a request timeout.
    pub fn with_timeout(timeout: Duration) -> DispatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::transport(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Creates a transport around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> DispatchResult<TransportResponse> {
        let mut builder = self
            .client
            .request(to_reqwest(request.method), request.url.as_str());

        let has_content_type = request.header("content-type").is_some();
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            if !has_content_type {
                builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
            }
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DispatchError::transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| DispatchError::transport(e.to_string()))?;

        Ok(TransportResponse {
            status,
            status_text: status_text(status),
            body: body.to_vec(),
        })
    }
}
