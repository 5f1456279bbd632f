//! Per-request state.
//!
//! A [`Context`] is created by the router immediately before a chain runs and
//! is the only thing the chain's layers share. It owns the request (method,
//! target, headers, body, matched path parameters), the response under
//! construction, and the router's attachments: the session store and the
//! request span.
//!
//! # Lifecycle
//!
//! ```text
//! Router::dispatch
//!   ├─ Context::with_route(..)      allocate, bind params
//!   ├─ chain.handle(&mut ctx)       any layer may short-circuit or panic
//!   └─ ctx.finish()                 take the response, release
//!        └─ Drop                    releases again on every other exit path
//! ```
//!
//! [`Context::release`] is idempotent, so the explicit release in `finish`
//! and the one in `Drop` never double-free anything.

use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::{future, stream};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode, Uri};
use serde::Serialize;
use tracing::{Span, debug, warn};

use crate::error::Error;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::session::{Session, SessionStore};

const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Per-request state passed through every layer of a chain.
pub struct Context {
    request: Request,
    params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    session_store: Option<Arc<dyn SessionStore>>,
    span: Span,
    response: Response,
    released: bool,
}

impl Context {
    /// A context not bound to any router: no path parameters, no session
    /// store, no request span. Useful to exercise a handler directly.
    pub fn new(request: Request) -> Self {
        Self::with_route(request, Vec::new(), None, Span::none())
    }

    pub(crate) fn with_route(
        request: Request,
        params: Vec<(String, String)>,
        session_store: Option<Arc<dyn SessionStore>>,
        span: Span,
    ) -> Self {
        let query = request.uri.query().map(decode_pairs).unwrap_or_default();
        let form = match content_type(&request.headers) {
            Some(ct) if ct.starts_with(ContentType::FormData.as_str()) => decode_pairs_bytes(&request.body),
            Some(ct) if ct.starts_with(MULTIPART_FORM_DATA) => decode_multipart(ct, &request.body),
            _ => Vec::new(),
        };
        Self {
            request,
            params,
            query,
            form,
            session_store,
            span,
            response: Response::default(),
            released: false,
        }
    }

    // ── Request accessors ────────────────────────────────────────────────────

    pub fn method(&self) -> &Method { &self.request.method }
    pub fn uri(&self) -> &Uri { &self.request.uri }
    pub fn path(&self) -> &str { self.request.uri.path() }
    pub fn host(&self) -> Option<&str> { self.request.host() }
    pub fn headers(&self) -> &HeaderMap { &self.request.headers }
    pub fn body(&self) -> &[u8] { &self.request.body }

    /// Case-insensitive request header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    pub fn is_method(&self, method: &Method) -> bool {
        self.request.method == *method
    }

    pub fn is_get(&self) -> bool { self.is_method(&Method::GET) }
    pub fn is_post(&self) -> bool { self.is_method(&Method::POST) }

    /// A named path parameter. For a route `/users/{id}`, `param("id")` on
    /// `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }

    /// All path parameters in pattern order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// A path parameter parsed as `T`; `None` if missing or unparsable.
    pub fn param_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.param(name).and_then(|v| v.parse().ok())
    }

    /// A path parameter parsed as `T`, or `default` if missing or unparsable.
    pub fn param_or<T: FromStr>(&self, name: &str, default: T) -> T {
        self.param_as(name).unwrap_or(default)
    }

    /// First query-string value for `name`, percent-decoded.
    pub fn query(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name)
    }

    /// First value for `name` from the query string, then from the body
    /// fields of an `application/x-www-form-urlencoded` or
    /// `multipart/form-data` request. Uploaded files are not form values.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.query(name).or_else(|| lookup(&self.form, name))
    }

    // ── Response construction ────────────────────────────────────────────────

    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.status = status;
    }

    /// Sets the status from a raw code. Codes outside `100..=999` leave the
    /// status unchanged.
    pub fn set_status_code(&mut self, code: u16) {
        match StatusCode::from_u16(code) {
            Ok(status) => self.response.status = status,
            Err(_) => warn!(code, "ignoring invalid status code override"),
        }
    }

    /// Sets a response header, replacing any previous values. Names or
    /// values that are not valid HTTP are logged and dropped.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some((name, value)) = header_pair(name, value) {
            self.response.headers.insert(name, value);
        }
    }

    /// Typed form of [`set_header`](Self::set_header).
    pub fn set_header_value(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.headers.insert(name, value);
    }

    /// Appends a response header value, keeping previous values.
    pub fn add_header(&mut self, name: &str, value: &str) {
        if let Some((name, value)) = header_pair(name, value) {
            self.response.headers.append(name, value);
        }
    }

    /// First value of a response header set so far.
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.response.headers.insert(header::CONTENT_TYPE, content_type.header_value());
    }

    /// Appends raw bytes to the response body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.response.body.extend_from_slice(bytes);
    }

    /// Replaces the response body.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.response.body = body.into();
    }

    /// The response built so far.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// `text/plain; charset=utf-8`.
    pub fn text(&mut self, body: impl Into<String>) {
        self.render(None, ContentType::Text, body.into().into_bytes());
    }

    pub fn text_with_code(&mut self, code: u16, body: impl Into<String>) {
        self.render(Some(code), ContentType::Text, body.into().into_bytes());
    }

    /// `text/html; charset=utf-8`.
    pub fn html(&mut self, body: impl Into<String>) {
        self.render(None, ContentType::Html, body.into().into_bytes());
    }

    pub fn html_with_code(&mut self, code: u16, body: impl Into<String>) {
        self.render(Some(code), ContentType::Html, body.into().into_bytes());
    }

    /// Serializes `value` as `application/json`.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) {
        self.render_json(None, value);
    }

    pub fn json_with_code<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) {
        self.render_json(Some(code), value);
    }

    /// Serializes `value` as JSON wrapped in `callback(...)`, sent as
    /// `application/javascript`.
    pub fn jsonp<T: Serialize + ?Sized>(&mut self, value: &T, callback: &str) {
        self.render_jsonp(None, value, callback);
    }

    pub fn jsonp_with_code<T: Serialize + ?Sized>(&mut self, code: u16, value: &T, callback: &str) {
        self.render_jsonp(Some(code), value, callback);
    }

    /// Serializes `value` as `application/xml`, prefixed by the XML
    /// declaration. The root element is named after the value's type.
    pub fn xml<T: Serialize + ?Sized>(&mut self, value: &T) {
        self.render_xml(None, value);
    }

    pub fn xml_with_code<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) {
        self.render_xml(Some(code), value);
    }

    /// `404 Not Found`, plain-text body.
    pub fn not_found(&mut self) {
        self.render(Some(StatusCode::NOT_FOUND.as_u16()), ContentType::Text, b"Not Found".to_vec());
    }

    /// Redirects to `location`. `code` must be a 3xx status; anything else
    /// falls back to `302 Found`.
    pub fn redirect(&mut self, code: u16, location: &str) {
        let status = StatusCode::from_u16(code)
            .ok()
            .filter(StatusCode::is_redirection)
            .unwrap_or(StatusCode::FOUND);
        self.response.status = status;
        self.set_header(header::LOCATION.as_str(), location);
    }

    fn render(&mut self, code: Option<u16>, content_type: ContentType, body: Vec<u8>) {
        if let Some(code) = code {
            self.set_status_code(code);
        }
        self.set_content_type(content_type);
        self.response.body = body;
    }

    fn render_json<T: Serialize + ?Sized>(&mut self, code: Option<u16>, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => self.render(code, ContentType::Json, body),
            Err(e) => self.render_failure(e),
        }
    }

    fn render_jsonp<T: Serialize + ?Sized>(&mut self, code: Option<u16>, value: &T, callback: &str) {
        match serde_json::to_vec(value) {
            Ok(json) => {
                let mut body = Vec::with_capacity(callback.len() + json.len() + 2);
                body.extend_from_slice(callback.as_bytes());
                body.push(b'(');
                body.extend_from_slice(&json);
                body.push(b')');
                self.render(code, ContentType::Javascript, body);
            }
            Err(e) => self.render_failure(e),
        }
    }

    fn render_xml<T: Serialize + ?Sized>(&mut self, code: Option<u16>, value: &T) {
        match quick_xml::se::to_string(value) {
            Ok(xml) => self.render(code, ContentType::Xml, format!("{XML_HEADER}{xml}").into_bytes()),
            Err(e) => self.render_failure(e),
        }
    }

    /// A value that cannot be serialized becomes a `500` whose body is the
    /// serializer's error message.
    fn render_failure(&mut self, err: impl Display) {
        let message = err.to_string();
        warn!(error = %message, "response serialization failed");
        self.response.status = StatusCode::INTERNAL_SERVER_ERROR;
        self.set_content_type(ContentType::Text);
        self.response.body = message.into_bytes();
    }

    // ── Sessions & logging ───────────────────────────────────────────────────

    pub fn session_store(&self) -> Option<&dyn SessionStore> {
        self.session_store.as_deref()
    }

    /// Loads the session named by the store's cookie, if any.
    pub fn session(&self) -> Option<Session> {
        let store = self.session_store.as_deref()?;
        let id = self.cookie(store.cookie_name())?;
        store.load(id)
    }

    /// Persists `session` and points the client's session cookie at it.
    pub fn save_session(&mut self, session: &Session) -> Result<(), Error> {
        let store = self.session_store.as_deref().ok_or(Error::NoSessionStore)?;
        store.save(session)?;
        let cookie = format!("{}={}; Path=/; HttpOnly", store.cookie_name(), session.id());
        self.add_header(header::SET_COOKIE.as_str(), &cookie);
        Ok(())
    }

    /// A request cookie by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.request
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    /// The request span, a child of the router's logger span when one is
    /// attached. Events logged inside a chain are recorded within it.
    pub fn logger(&self) -> &Span {
        &self.span
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Drops every per-request reference the context holds. Safe to call
    /// any number of times; only the first call has an effect.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.params.clear();
        self.query.clear();
        self.form.clear();
        self.request.headers.clear();
        self.request.body = Bytes::new();
        self.session_store = None;
        debug!(parent: &self.span, "context released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Takes the response out and releases the context.
    pub fn finish(mut self) -> Response {
        let response = std::mem::take(&mut self.response);
        self.release();
        response
    }

    /// Discards whatever the chain wrote so far.
    pub(crate) fn reset_response(&mut self) {
        self.response = Response::default();
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.release();
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn decode_pairs(raw: &str) -> Vec<(String, String)> {
    decode_pairs_bytes(raw.as_bytes())
}

fn decode_pairs_bytes(raw: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Text fields of a `multipart/form-data` body. File parts are skipped.
///
/// The body is already in memory, so the parser's future never waits and a
/// single poll drives it to completion.
fn decode_multipart(content_type: &str, body: &Bytes) -> Vec<(String, String)> {
    let boundary = match multer::parse_boundary(content_type) {
        Ok(boundary) => boundary,
        Err(e) => {
            debug!("unusable multipart content type: {e}");
            return Vec::new();
        }
    };
    let chunk = stream::once(future::ready(Ok::<_, Infallible>(body.clone())));
    let mut multipart = multer::Multipart::new(chunk, boundary);

    let fields = async move {
        let mut fields = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            if field.file_name().is_some() {
                continue;
            }
            let Some(name) = field.name().map(str::to_owned) else { continue };
            fields.push((name, field.text().await?));
        }
        Ok::<_, multer::Error>(fields)
    };

    match fields.now_or_never() {
        Some(Ok(fields)) => fields,
        Some(Err(e)) => {
            debug!("malformed multipart body: {e}");
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let pair = HeaderName::from_bytes(name.as_bytes())
        .ok()
        .zip(HeaderValue::from_str(value).ok());
    if pair.is_none() {
        warn!(name, "dropping invalid response header");
    }
    pair
}
