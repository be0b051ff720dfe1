//! hudsucker handler driving the interception pipeline.
//!
//! Adapts hyper requests and responses to the core [`Flow`] trait. hudsucker
//! clones the handler for every request, so the request URL seen in
//! `handle_request` is carried over to `handle_response` on `self`.

use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hudsucker::{
    hyper::{Request, Response},
    Body, HttpContext, HttpHandler, RequestOrResponse,
};
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, HOST};
use hyper::http::{response::Parts, HeaderMap, HeaderValue, Method, Uri};

use neoproxy_core::{Flow, Headers, Interceptor, SyntheticResponse};

/// Helper to convert bytes to Body
fn bytes_to_body(bytes: Bytes) -> Body {
    Body::from(Full::new(bytes))
}

/// Reconstructs the absolute URL of a proxied request.
fn request_url(req: &Request<Body>) -> Option<String> {
    let uri = req.uri();
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Some(uri.to_string());
    }

    // Origin-form request inside an intercepted TLS tunnel
    let host = req.headers().get(HOST).and_then(|h| h.to_str().ok())?;
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    Some(format!("https://{}{}", host, path))
}

fn collect_headers(map: &HeaderMap) -> Headers {
    map.iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Builds a hyper response from a synthesized one.
fn into_hyper_response(response: SyntheticResponse) -> Option<Response<Body>> {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    match builder.body(bytes_to_body(response.body)) {
        Ok(res) => Some(res),
        Err(e) => {
            tracing::warn!("Failed to build synthesized response: {}", e);
            None
        }
    }
}

/// Request side of a flow, before it is forwarded.
struct RequestFlow {
    request: Request<Body>,
    url: String,
    response: Option<SyntheticResponse>,
}

impl RequestFlow {
    fn new(request: Request<Body>, url: String) -> Self {
        Self {
            request,
            url,
            response: None,
        }
    }

    fn set_host_header(&mut self, host: &str) {
        // HTTP/2 requests carry the authority in the URI only
        if !self.request.headers().contains_key(HOST) {
            return;
        }
        match HeaderValue::from_str(host) {
            Ok(value) => {
                self.request.headers_mut().insert(HOST, value);
            }
            Err(e) => tracing::warn!("Invalid host {:?}: {}", host, e),
        }
    }

    /// Forwards the request, or answers it if the pipeline responded.
    fn into_request_or_response(self) -> RequestOrResponse {
        match self.response.and_then(into_hyper_response) {
            Some(res) => RequestOrResponse::Response(res),
            None => RequestOrResponse::Request(self.request),
        }
    }
}

impl Flow for RequestFlow {
    fn request_url(&self) -> &str {
        &self.url
    }

    fn set_request_host(&mut self, host: &str) {
        self.set_host_header(host);
    }

    fn set_request_url(&mut self, url: &str) {
        let uri = match url.parse::<Uri>() {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!("Rejected rewritten URL {}: {}", url, e);
                return;
            }
        };

        if let Some(authority) = uri.authority().map(|a| a.as_str().to_string()) {
            self.set_host_header(&authority);
        }
        *self.request.uri_mut() = uri;
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

/// Response side of a flow, with its body buffered.
struct ResponseFlow {
    url: String,
    parts: Parts,
    body: Bytes,
}

impl ResponseFlow {
    fn into_response(self) -> Response<Body> {
        Response::from_parts(self.parts, bytes_to_body(self.body))
    }
}

impl Flow for ResponseFlow {
    fn request_url(&self) -> &str {
        &self.url
    }

    fn set_request_host(&mut self, _host: &str) {
        tracing::debug!("Ignoring host change after {} was sent", self.url);
    }

    fn set_request_url(&mut self, _url: &str) {
        tracing::debug!("Ignoring URL change after {} was sent", self.url);
    }

    fn response_status(&self) -> Option<u16> {
        Some(self.parts.status.as_u16())
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.parts
            .headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    }

    fn response_headers(&self) -> Headers {
        collect_headers(&self.parts.headers)
    }

    fn response_body(&self) -> Option<Bytes> {
        Some(self.body.clone())
    }

    fn respond(&mut self, response: SyntheticResponse) {
        let body = response.body.clone();
        if let Some(res) = into_hyper_response(response) {
            let (parts, _) = res.into_parts();
            self.parts = parts;
            self.body = body;
        }
    }
}

/// HTTP handler for the MITM proxy.
#[derive(Clone, Debug)]
pub struct FlowHandler {
    interceptor: Arc<Interceptor>,
    /// URL of the request this clone is handling.
    request_url: Option<String>,
}

impl FlowHandler {
    /// Creates a handler sharing the given interceptor.
    pub fn new(interceptor: Arc<Interceptor>) -> Self {
        Self {
            interceptor,
            request_url: None,
        }
    }

    /// Returns the shared interceptor.
    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    async fn process_request(&mut self, req: Request<Body>) -> RequestOrResponse {
        if req.method() == Method::CONNECT {
            return RequestOrResponse::Request(req);
        }

        let url = match request_url(&req) {
            Some(url) => url,
            None => return RequestOrResponse::Request(req),
        };

        let mut flow = RequestFlow::new(req, url);
        let outcome = self.interceptor.on_request(&mut flow);
        tracing::debug!("Request {} -> {:?}", flow.url, outcome);

        self.request_url = Some(flow.url.clone());
        flow.into_request_or_response()
    }

    async fn process_response(&mut self, res: Response<Body>) -> Response<Body> {
        let url = match self.request_url.take() {
            Some(url) => url,
            None => return res,
        };

        if !self.interceptor.needs_response_body(&url) {
            return res;
        }

        let (mut parts, body) = res.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!("Failed to read response body for {}: {}", url, e);
                parts.headers.remove(CONTENT_LENGTH);
                return Response::from_parts(parts, Body::empty());
            }
        };

        let mut flow = ResponseFlow { url, parts, body };
        let outcome = self.interceptor.on_response(&mut flow);
        tracing::debug!("Response {} -> {:?}", flow.url, outcome);

        flow.into_response()
    }
}

impl HttpHandler for FlowHandler {
    async fn handle_request(
        &mut self,
        _ctx: &HttpContext,
        req: Request<Body>,
    ) -> RequestOrResponse {
        self.process_request(req).await
    }

    async fn handle_response(&mut self, _ctx: &HttpContext, res: Response<Body>) -> Response<Body> {
        self.process_response(res).await
    }
}
