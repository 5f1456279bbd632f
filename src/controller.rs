//! Resource controllers.
//!
//! A controller answers every standard method on one path. It is two
//! capabilities composed by [`Router::register_controller`]:
//!
//! - [`MethodHandlerSet`]: one handler per verb. Verbs a controller does not
//!   override answer `404 Not Found`.
//! - [`Controller`]: the controller's own middleware list and its self-wrap,
//!   a middleware-shaped hook that sees every request before the verb
//!   handler does.
//!
//! The self-wrap is applied exactly once per verb chain, between the
//! controller's middleware list and the verb handler.
//!
//! ```rust
//! use std::sync::Arc;
//! use stile::controller::{self, Controller, MethodHandlerSet};
//! use stile::{BoxedHandler, Context, Router};
//!
//! struct Users;
//!
//! impl MethodHandlerSet for Users {
//!     fn get(&self, ctx: &mut Context) { ctx.text("list users") }
//!     fn put(&self, ctx: &mut Context) { ctx.text("replace user") }
//! }
//!
//! impl Controller for Users {
//!     // lets plain HTML forms reach `put` via POST + `_method=PUT`
//!     fn wrap(self: Arc<Self>, next: BoxedHandler) -> BoxedHandler {
//!         controller::method_override(self, next)
//!     }
//! }
//!
//! # fn main() -> Result<(), stile::Error> {
//! let mut router = Router::new();
//! router.register_controller("/users", Users)?;
//! # Ok(()) }
//! ```
//!
//! [`Router::register_controller`]: crate::Router::register_controller

use std::sync::Arc;

use http::Method;
use tracing::debug;

use crate::context::Context;
use crate::handler::{BoxedHandler, BoxedMiddleware, Handler};

/// The methods a controller is registered for, one chain each.
pub const METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Form or query field naming the verb a POST should be treated as.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// One handler per standard HTTP method. Every default answers 404.
pub trait MethodHandlerSet: Send + Sync + 'static {
    fn get(&self, ctx: &mut Context) { ctx.not_found() }
    fn head(&self, ctx: &mut Context) { ctx.not_found() }
    fn post(&self, ctx: &mut Context) { ctx.not_found() }
    fn put(&self, ctx: &mut Context) { ctx.not_found() }
    fn patch(&self, ctx: &mut Context) { ctx.not_found() }
    fn delete(&self, ctx: &mut Context) { ctx.not_found() }
    fn options(&self, ctx: &mut Context) { ctx.not_found() }
}

/// A resource registered under one path.
pub trait Controller: MethodHandlerSet {
    /// Middlewares wrapped around every verb chain of this controller, inside
    /// the router's own list. The first entry is the outermost.
    fn middlewares(&self) -> Vec<BoxedMiddleware> {
        Vec::new()
    }

    /// The controller's self-wrap. `next` is the verb handler for the
    /// method being registered. The default passes straight through.
    fn wrap(self: Arc<Self>, next: BoxedHandler) -> BoxedHandler {
        next
    }
}

/// Calls the handler `set` declares for `method`. Returns `false` for a
/// method outside [`METHODS`], leaving the context untouched.
pub fn invoke<C>(set: &C, method: &Method, ctx: &mut Context) -> bool
where
    C: MethodHandlerSet + ?Sized,
{
    match *method {
        Method::GET => set.get(ctx),
        Method::HEAD => set.head(ctx),
        Method::POST => set.post(ctx),
        Method::PUT => set.put(ctx),
        Method::PATCH => set.patch(ctx),
        Method::DELETE => set.delete(ctx),
        Method::OPTIONS => set.options(ctx),
        _ => return false,
    }
    true
}

struct VerbHandler<C: ?Sized> {
    controller: Arc<C>,
    method: Method,
}

impl<C> Handler for VerbHandler<C>
where
    C: MethodHandlerSet + ?Sized,
{
    fn handle(&self, ctx: &mut Context) {
        if !invoke(&*self.controller, &self.method, ctx) {
            ctx.not_found();
        }
    }
}

pub(crate) fn verb_handler<C>(controller: Arc<C>, method: Method) -> BoxedHandler
where
    C: MethodHandlerSet + ?Sized,
{
    Arc::new(VerbHandler { controller, method })
}

/// A self-wrap that lets a POST stand in for another verb.
///
/// When a POST carries `_method` (query string, urlencoded or multipart
/// form) naming PUT, DELETE, HEAD, OPTIONS or PATCH, that verb's handler of
/// `controller` runs instead of `next`. Any other request goes to `next` unchanged.
pub fn method_override<C>(controller: Arc<C>, next: BoxedHandler) -> BoxedHandler
where
    C: MethodHandlerSet + ?Sized,
{
    const OVERRIDABLE: [Method; 5] = [Method::PUT, Method::DELETE, Method::HEAD, Method::OPTIONS, Method::PATCH];

    Arc::new(move |ctx: &mut Context| {
        if ctx.is_post() {
            let target = ctx
                .form_value(METHOD_OVERRIDE_FIELD)
                .and_then(|v| Method::from_bytes(v.as_bytes()).ok())
                .filter(|m| OVERRIDABLE.contains(m));
            if let Some(target) = target {
                debug!(method = %target, "method override");
                invoke(&*controller, &target, ctx);
                return;
            }
        }
        next.handle(ctx);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Router;
    use crate::error::Error;
    use crate::middleware::{SetHeader, from_fn};
    use crate::request::Request;
    use http::header::{self, HeaderValue};
    use http::{StatusCode, Uri};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(method: Method, uri: &'static str) -> Request {
        Request::new(method, Uri::from_static(uri))
    }

    struct GetOnly;

    impl MethodHandlerSet for GetOnly {
        fn get(&self, ctx: &mut Context) { ctx.text("users") }
    }

    impl Controller for GetOnly {}

    #[test]
    fn unimplemented_verbs_answer_not_found() -> Result<(), Error> {
        let mut router = Router::new();
        router.register_controller("/users", GetOnly)?;

        let res = router.dispatch(request(Method::GET, "/users"));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), b"users");

        for method in [Method::DELETE, Method::PUT, Method::PATCH, Method::OPTIONS, Method::HEAD, Method::POST] {
            let res = router.dispatch(Request::new(method.clone(), Uri::from_static("/users")));
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{method}");
        }
        Ok(())
    }

    struct Full {
        middlewares: Vec<BoxedMiddleware>,
        wraps: Arc<AtomicUsize>,
    }

    impl MethodHandlerSet for Full {
        fn get(&self, ctx: &mut Context) { ctx.text("GET") }
        fn head(&self, ctx: &mut Context) { ctx.text("HEAD") }
        fn post(&self, ctx: &mut Context) { ctx.text("POST") }
        fn put(&self, ctx: &mut Context) { ctx.text("PUT") }
        fn patch(&self, ctx: &mut Context) { ctx.text("PATCH") }
        fn delete(&self, ctx: &mut Context) { ctx.text("DELETE") }
        fn options(&self, ctx: &mut Context) { ctx.text("OPTIONS") }
    }

    impl Controller for Full {
        fn middlewares(&self) -> Vec<BoxedMiddleware> {
            self.middlewares.clone()
        }

        fn wrap(self: Arc<Self>, next: BoxedHandler) -> BoxedHandler {
            let wraps = Arc::clone(&self.wraps);
            Arc::new(move |ctx: &mut Context| {
                wraps.fetch_add(1, Ordering::SeqCst);
                ctx.add_header("layer", "self");
                next.handle(ctx);
            })
        }
    }

    fn layer(name: &'static str) -> BoxedMiddleware {
        Arc::new(from_fn(move |ctx: &mut Context, next: &dyn Handler| {
            ctx.add_header("layer", name);
            next.handle(ctx);
        }))
    }

    #[test]
    fn every_verb_gets_its_own_chain_in_documented_order() -> Result<(), Error> {
        let wraps = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router.set_middlewares(vec![layer("router")]);
        router.register_controller("/", Full {
            middlewares: vec![layer("ctrl-1"), layer("ctrl-2")],
            wraps: Arc::clone(&wraps),
        })?;

        for (i, method) in METHODS.into_iter().enumerate() {
            let name = method.to_string();
            let res = router.dispatch(Request::new(method, Uri::from_static("/")));
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(res.body(), name.as_bytes());
            let layers: Vec<_> = res.headers().get_all("layer").iter().map(|v| v.to_str().unwrap()).collect();
            assert_eq!(layers, ["router", "ctrl-1", "ctrl-2", "self"]);
            // self-wrap runs exactly once per request
            assert_eq!(wraps.load(Ordering::SeqCst), i + 1);
        }
        Ok(())
    }

    #[test]
    fn router_middleware_list_is_snapshotted_at_registration() -> Result<(), Error> {
        let mut router = Router::new();
        router.register_controller("/early", GetOnly)?;
        router.add_middleware(SetHeader::from_static("middleware", "Simple"));
        router.register_controller("/late", GetOnly)?;

        assert_eq!(router.dispatch(request(Method::GET, "/early")).header("middleware"), None);
        assert_eq!(router.dispatch(request(Method::GET, "/late")).header("middleware"), Some("Simple"));
        Ok(())
    }

    struct Users;

    impl MethodHandlerSet for Users {
        fn get(&self, ctx: &mut Context) { ctx.text("GET handler") }
        fn post(&self, ctx: &mut Context) { ctx.text("POST handler") }
        fn put(&self, ctx: &mut Context) { ctx.text("PUT handler") }
        fn delete(&self, ctx: &mut Context) { ctx.text("DELETE handler") }
    }

    impl Controller for Users {
        fn wrap(self: Arc<Self>, next: BoxedHandler) -> BoxedHandler {
            method_override(self, next)
        }
    }

    #[test]
    fn post_with_method_field_reaches_other_verbs() -> Result<(), Error> {
        let mut router = Router::new();
        router.register_controller("/users", Users)?;

        let res = router.dispatch(request(Method::POST, "/users?_method=DELETE"));
        assert_eq!(res.body(), b"DELETE handler");

        let form = request(Method::POST, "/users")
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"))
            .with_body("_method=PUT");
        assert_eq!(router.dispatch(form).body(), b"PUT handler");

        // overridden to a verb the controller does not implement
        let res = router.dispatch(request(Method::POST, "/users?_method=PATCH"));
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        // not overridable, falls through to POST
        assert_eq!(router.dispatch(request(Method::POST, "/users?_method=GET")).body(), b"POST handler");
        assert_eq!(router.dispatch(request(Method::POST, "/users")).body(), b"POST handler");

        // only POST is overridable
        assert_eq!(router.dispatch(request(Method::GET, "/users?_method=DELETE")).body(), b"GET handler");
        Ok(())
    }

    #[test]
    fn multipart_form_method_field_is_honoured() -> Result<(), Error> {
        let mut router = Router::new();
        router.register_controller("/users", Users)?;

        let body = "--b0und\r\n\
                    content-disposition: form-data; name=\"_method\"\r\n\r\n\
                    PUT\r\n\
                    --b0und--\r\n";
        let form = request(Method::POST, "/users")
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("multipart/form-data; boundary=b0und"))
            .with_body(body);
        assert_eq!(router.dispatch(form).body(), b"PUT handler");
        Ok(())
    }

    #[test]
    fn failed_registration_leaves_no_routes_behind() -> Result<(), Error> {
        let mut router = Router::new();
        router.head("/users/{id}", |ctx: &mut Context| ctx.set_header("x-owner", "route"))?;

        let err = router.register_controller("/users/{name}", GetOnly).err();
        assert!(matches!(err, Some(Error::InvalidRoute { ref method, .. }) if *method == Method::HEAD));

        // GET sorts before HEAD and would have gone live first
        assert_eq!(router.dispatch(request(Method::GET, "/users/x")).status(), StatusCode::NOT_FOUND);
        let res = router.dispatch(request(Method::HEAD, "/users/x"));
        assert_eq!(res.header("x-owner"), Some("route"));
        Ok(())
    }

    #[test]
    fn invoke_rejects_non_controller_methods() {
        let mut ctx = Context::new(Request::get("/"));
        assert!(!invoke(&GetOnly, &Method::TRACE, &mut ctx));
        assert!(ctx.response().body().is_empty());
        assert!(invoke(&GetOnly, &Method::GET, &mut ctx));
        assert_eq!(ctx.response().body(), b"users");
    }
}
