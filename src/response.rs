//! Outgoing HTTP response type.
//!
//! Handlers never build a [`Response`] themselves: they write status,
//! headers and body through the [`Context`](crate::Context), and the
//! dispatcher takes the finished response out of it when the chain unwinds.

use bytes::Bytes;
use http::StatusCode;
use http::header::{self, HeaderMap, HeaderValue};
use http_body_util::Full;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content-type values set by the rendering helpers on
/// [`Context`](crate::Context).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    FormData,    // application/x-www-form-urlencoded
    Html,        // text/html; charset=utf-8
    Javascript,  // application/javascript  (JSONP)
    Json,        // application/json
    OctetStream, // application/octet-stream
    Text,        // text/plain; charset=utf-8
    Xml,         // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Javascript  => "application/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }

    pub(crate) fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response. Defaults to `200 OK`, no headers, empty body.
#[derive(Debug, Default)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Vec<u8>,
}

impl Response {
    /// Response with no body.
    pub fn with_status(status: StatusCode) -> Self {
        Self { status, ..Self::default() }
    }

    /// `404 Not Found` with the reason phrase as a plain-text body.
    pub fn not_found() -> Self {
        let mut res = Self::with_status(StatusCode::NOT_FOUND);
        res.headers.insert(header::CONTENT_TYPE, ContentType::Text.header_value());
        res.body = b"Not Found".to_vec();
        res
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// First value of a response header, if it is visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Converts into the hyper-facing response. `content-length` is derived
    /// from the body by hyper.
    pub fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}
