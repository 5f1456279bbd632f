//! Incoming HTTP request type.
//!
//! [`Request`] is what the transport hands to the dispatch core: method,
//! target, headers and the fully-read body. It is deliberately independent of
//! hyper so routers and applications can be driven without a socket.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Uri};

/// An incoming HTTP request with its body already collected.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self { method, uri, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// `GET` request for a static target, e.g. `Request::get("/users/42")`.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not a valid request target.
    pub fn get(uri: &'static str) -> Self {
        Self::new(Method::GET, Uri::from_static(uri))
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        Self { method: parts.method, uri: parts.uri, headers: parts.headers, body }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Values that are not visible ASCII are
    /// treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The target host: the authority of an absolute-form target
    /// (`GET http://a.test/ HTTP/1.1`) if present, otherwise the `Host`
    /// header. May include a port.
    pub fn host(&self) -> Option<&str> {
        self.uri
            .authority()
            .map(|a| a.as_str())
            .or_else(|| self.headers.get(header::HOST).and_then(|v| v.to_str().ok()))
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_prefers_absolute_form_authority() {
        let req = Request::new(Method::GET, Uri::from_static("http://a.test:8080/x"))
            .with_header(header::HOST, HeaderValue::from_static("b.test"));
        assert_eq!(req.host(), Some("a.test:8080"));
        assert_eq!(req.path(), "/x");
    }

    #[test]
    fn host_falls_back_to_header() {
        let req = Request::get("/").with_header(header::HOST, HeaderValue::from_static("b.test"));
        assert_eq!(req.host(), Some("b.test"));
        assert_eq!(Request::get("/").host(), None);
    }

    #[test]
    fn converts_from_http_request() {
        let req: Request = http::Request::builder()
            .method(Method::POST)
            .uri("/users?x=1")
            .header("content-type", "text/plain")
            .body(Bytes::from_static(b"hi"))
            .unwrap()
            .into();
        assert_eq!(*req.method(), Method::POST);
        assert_eq!(req.header("Content-Type"), Some("text/plain"));
        assert_eq!(req.body(), b"hi");
    }
}
