//! Handler and Middleware traits, and chain composition.
//!
//! # How chains are stored
//!
//! A router holds handlers of *different* types in one table, so every
//! handler is erased behind `Arc<dyn Handler>` ([`BoxedHandler`]). A
//! [`Middleware`] is a function from one `BoxedHandler` to another; folding a
//! middleware list over a terminal handler yields a single composed handler,
//! the chain:
//!
//! ```text
//! [m0, m1, m2] + h   →   m0.wrap(m1.wrap(m2.wrap(h)))
//!
//! request ──► m0 ──► m1 ──► m2 ──► h
//!                                  │
//! response ◄── m0 ◄── m1 ◄── m2 ◄──┘
//! ```
//!
//! The chain is built once, at registration time. Per request the only cost
//! is one virtual call per layer; all per-request state lives in the
//! [`Context`] each invocation receives, so one chain serves any number of
//! concurrent requests.

use std::sync::Arc;

use crate::context::Context;

/// Processes a request by mutating its [`Context`].
///
/// There is no return value and no failure channel: a handler reports an
/// error by setting the status and body on the context.
///
/// Implemented for every `Fn(&mut Context)`, so plain functions and closures
/// are handlers:
///
/// ```rust
/// use stile::Context;
///
/// fn index(ctx: &mut Context) {
///     ctx.text("hello");
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: &mut Context);
}

impl<F> Handler for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut Context) {
        self(ctx)
    }
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// Transforms the next handler of a chain into a handler that wraps it.
///
/// The returned handler may run code before calling `next`, skip calling it
/// (short-circuit), and run code after it returns. `wrap` is called once per
/// chain at registration time and must not keep per-request state.
///
/// ```rust
/// use stile::{BoxedHandler, Context, Middleware};
/// use std::sync::Arc;
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
///         Arc::new(move |ctx: &mut Context| {
///             ctx.set_header("x-powered-by", "stile");
///             next.handle(ctx);
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

/// A type-erased middleware, shareable between a router and its controllers.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Erases a concrete handler.
pub fn boxed(handler: impl Handler) -> BoxedHandler {
    Arc::new(handler)
}

/// Collapses `middlewares` around `handler`. The first middleware in the
/// slice is the outermost layer.
pub(crate) fn compose(middlewares: &[BoxedMiddleware], handler: BoxedHandler) -> BoxedHandler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware.wrap(next))
}
