//! `HttpClient` implementation using `reqwest`.

use crate::{HttpClient, HttpRequest, HttpResponse, Method, TransportError};

/// The production [`HttpClient`].
///
/// `reqwest::Client` pools connections internally and is cheap to clone,
/// so one `ReqwestClient` should be built per process and shared.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    http: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with reqwest's default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already-configured `reqwest::Client` (proxies, timeouts...).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        tracing::debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        tracing::debug!(status, bytes = body.len(), "received response");

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
