//! Forwards admitted requests to the downstream core service with the
//! caller's bearer token, preserving method, path suffix, body, and relevant
//! headers. 4xx/5xx responses from the core are passed through unchanged;
//! only a timeout or connection failure is translated, into 503.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("downstream core service unreachable or timed out")]
    Unreachable,
    #[error("failed to build outbound request: {0}")]
    BuildRequest(String),
}

/// One forwarded call: method, path (including query), headers, and body.
pub struct ProxyRequest {
    pub method: http::Method,
    pub path_and_query: String,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

/// The core's response, passed through unchanged.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: http::StatusCode,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

/// Small trait-like interface the admission pipeline depends on for
/// forwarding to the core.
#[async_trait]
pub trait ProxyToCore: Send + Sync {
    async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse, ProxyError>;
}

/// hyper-backed forwarding client with a fixed per-request timeout.
pub struct CoreProxy {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
    timeout: Duration,
}

impl CoreProxy {
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ProxyToCore for CoreProxy {
    async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let uri: hyper::Uri = format!("{}{}", self.base_url, request.path_and_query)
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| ProxyError::BuildRequest(e.to_string()))?;

        let mut builder = Request::builder().method(request.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = request.headers;
        }
        let outbound = builder
            .body(Full::new(request.body))
            .map_err(|e| ProxyError::BuildRequest(e.to_string()))?;

        let call = self.client.request(outbound);
        let response: Response<hyper::body::Incoming> =
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(response)) => response,
                Ok(Err(_)) | Err(_) => return Err(ProxyError::Unreachable),
            };

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|_| ProxyError::Unreachable)?
            .to_bytes();

        Ok(ProxyResponse { status, headers, body })
    }
}
