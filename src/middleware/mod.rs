//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, response headers, request
//! gating. Any type implementing [`Middleware`] works; this module adds a
//! closure adapter and a few built-ins.
//!
//! - [`from_fn`]: build a middleware from `|ctx, next| { … }`
//! - [`SetHeader`]: set a fixed response header on every request
//! - [`Trace`]: one log event per request with method, path, status, latency

mod trace;

pub use trace::Trace;

use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};

use crate::context::Context;
use crate::handler::{BoxedHandler, Handler, Middleware};

/// Builds a [`Middleware`] from a closure receiving the context and the next
/// handler of the chain. Not calling `next.handle(ctx)` short-circuits.
///
/// ```rust
/// use stile::middleware::from_fn;
///
/// let auth = from_fn(|ctx, next| {
///     if ctx.header("authorization").is_none() {
///         ctx.text_with_code(401, "unauthorized");
///         return;
///     }
///     next.handle(ctx);
/// });
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(&mut Context, &dyn Handler) + Send + Sync + 'static,
{
    FromFn { f: Arc::new(f) }
}

/// Middleware returned by [`from_fn`].
pub struct FromFn<F> {
    f: Arc<F>,
}

impl<F> Middleware for FromFn<F>
where
    F: Fn(&mut Context, &dyn Handler) + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let f = Arc::clone(&self.f);
        Arc::new(move |ctx: &mut Context| f(ctx, &*next))
    }
}

/// Sets one response header before the rest of the chain runs, e.g. the
/// `Access-Control-Allow-*` headers for cross-origin callers.
#[derive(Clone, Debug)]
pub struct SetHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl SetHeader {
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }

    /// # Panics
    ///
    /// Panics if `name` is not a valid header name or `value` is not a valid
    /// header value.
    pub fn from_static(name: &'static str, value: &'static str) -> Self {
        Self::new(HeaderName::from_static(name), HeaderValue::from_static(value))
    }
}

impl Middleware for SetHeader {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let header = self.clone();
        Arc::new(move |ctx: &mut Context| {
            ctx.set_header_value(header.name.clone(), header.value.clone());
            next.handle(ctx);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxedMiddleware, boxed, compose};
    use crate::request::Request;
    use http::StatusCode;

    #[test]
    fn from_fn_can_gate_the_chain() {
        let gate: BoxedMiddleware = Arc::new(from_fn(|ctx, next| {
            if ctx.header("authorization").is_none() {
                ctx.text_with_code(401, "unauthorized");
                return;
            }
            next.handle(ctx);
        }));
        let chain = compose(&[gate], boxed(|ctx: &mut Context| ctx.text("secret")));

        let mut ctx = Context::new(Request::get("/"));
        chain.handle(&mut ctx);
        let res = ctx.finish();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.body(), b"unauthorized");

        let mut ctx = Context::new(Request::get("/").with_header(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer t"),
        ));
        chain.handle(&mut ctx);
        assert_eq!(ctx.finish().body(), b"secret");
    }

    #[test]
    fn set_header_runs_before_handler() {
        let cors: BoxedMiddleware = Arc::new(SetHeader::from_static("access-control-allow-origin", "*"));
        let chain = compose(
            &[cors],
            boxed(|ctx: &mut Context| {
                let seen = ctx.response_header("access-control-allow-origin").unwrap_or("none").to_owned();
                ctx.text(seen);
            }),
        );

        let mut ctx = Context::new(Request::get("/"));
        chain.handle(&mut ctx);
        let res = ctx.finish();
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.body(), b"*");
    }
}
