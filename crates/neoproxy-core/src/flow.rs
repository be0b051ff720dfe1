//! The narrow view of a proxied exchange that the pipeline works against.
//!
//! The proxy engine implements [`Flow`] over its own request/response types;
//! the pipeline never sees those types. [`MemoryFlow`] is a plain in-memory
//! implementation for tests and offline replay.

use bytes::Bytes;

/// Ordered header list, name/value pairs as received.
pub type Headers = Vec<(String, String)>;

/// Looks up a header value case-insensitively.
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// A response produced by the pipeline instead of the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Response body.
    pub body: Bytes,
}

impl SyntheticResponse {
    /// Creates a 200 response with the given body and headers.
    pub fn ok(body: Bytes, headers: Headers) -> Self {
        Self {
            status: 200,
            headers,
            body,
        }
    }

    /// Returns a header value (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// Capabilities the pipeline needs from one request/response exchange.
///
/// Request-side mutations (`set_request_*`) take effect on the outgoing
/// request. `respond` replaces whatever response the flow has, or
/// short-circuits the request when called from the request hook.
pub trait Flow {
    /// Full request URL including the query string.
    fn request_url(&self) -> &str;

    /// Replaces the request's target host.
    fn set_request_host(&mut self, host: &str);

    /// Replaces the full request URL.
    fn set_request_url(&mut self, url: &str);

    /// Response status, if a response exists.
    fn response_status(&self) -> Option<u16>;

    /// A response header value, if a response exists and carries it.
    fn response_header(&self, name: &str) -> Option<String>;

    /// All response headers (empty when there is no response).
    fn response_headers(&self) -> Headers;

    /// The response body, if a response exists and its body was buffered.
    fn response_body(&self) -> Option<Bytes>;

    /// Installs a synthesized response.
    fn respond(&mut self, response: SyntheticResponse);
}

/// In-memory flow.
#[derive(Debug, Clone, Default)]
pub struct MemoryFlow {
    /// Request URL.
    pub url: String,
    /// Host override applied by the pipeline, if any.
    pub host: Option<String>,
    /// The response, if one exists.
    pub response: Option<SyntheticResponse>,
}

impl MemoryFlow {
    /// Creates a request-only flow.
    pub fn request(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            host: None,
            response: None,
        }
    }

    /// Attaches a response.
    pub fn with_response(mut self, status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        self.response = Some(SyntheticResponse {
            status,
            headers,
            body: body.into(),
        });
        self
    }
}

impl Flow for MemoryFlow {
    fn request_url(&self) -> &str {
        &self.url
    }

    fn set_request_host(&mut self, host: &str) {
        self.host = Some(host.to_string());
    }

    fn set_request_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    fn response_status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.response
            .as_ref()
            .and_then(|r| r.header(name))
            .map(str::to_string)
    }

    fn response_headers(&self) -> Headers {
        self.response
            .as_ref()
            .map(|r| r.headers.clone())
            .unwrap_or_default()
    }

    fn response_body(&self) -> Option<Bytes> {
        self.response.as_ref().map(|r| r.body.clone())
    }

    fn respond(&mut self, response: SyntheticResponse) {
        self.response = Some(response);
    }
}
