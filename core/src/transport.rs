//! Executing `HttpRequest`s.
//!
//! # Design
//! `HttpSend` only moves bytes; `execute` adds the status classification so
//! every transport behaves the same: 2xx and 3xx come back as raw data, any
//! other status becomes `ApiError::HttpError` carrying the raw body text.
//! Nothing here decodes JSON.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Performs one HTTP round-trip.
pub trait HttpSend {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: HttpSend + ?Sized> HttpSend for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).send(request)
    }
}

/// Send `request` and classify the response by status class.
pub fn execute<T: HttpSend + ?Sized>(transport: &T, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
    debug!(method = %request.method, url = %request.url, "sending request");
    let response = transport.send(request)?;
    classify(response)
}

/// `Ok` for 2xx/3xx, `HttpError` with the raw body otherwise.
pub fn classify(response: HttpResponse) -> Result<HttpResponse, ApiError> {
    match response.status / 100 {
        2 | 3 => {
            debug!(status = response.status, bytes = response.body.len(), "request succeeded");
            Ok(response)
        }
        _ => {
            warn!(status = response.status, "request failed");
            Err(ApiError::HttpError {
                status: response.status,
                body: response.text().into_owned(),
            })
        }
    }
}

/// Blocking transport backed by `ureq`.
///
/// ureq's status-code-as-error behavior is disabled so 4xx/5xx responses come
/// back as data and `classify` decides.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Bound every request (connect + transfer) by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl HttpSend for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let url = request.url.as_str();
        let result = match (&request.method, &request.body) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), &request.headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(url), &request.headers).call(),
            (HttpMethod::Post, Some(body)) => with_headers(self.agent.post(url), &request.headers).send(body.as_bytes()),
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), &request.headers).send_empty(),
            (HttpMethod::Put, Some(body)) => with_headers(self.agent.put(url), &request.headers).send(body.as_bytes()),
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), &request.headers).send_empty(),
        };
        let mut response = result.map_err(|e| ApiError::TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| ApiError::TransportError(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
