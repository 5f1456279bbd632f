//! Radix-tree request router with middleware chains.
//!
//! One [`matchit`] tree per HTTP method; each tree maps a pattern to a slot in
//! the router's chain table. A chain is composed once, when its route is
//! registered, from the router's middleware list as it stands at that moment.
//! Adding middleware later only affects routes registered later.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::{Span, debug, debug_span, error, warn};

use crate::context::Context;
use crate::controller::{self, Controller};
use crate::error::Error;
use crate::handler::{BoxedHandler, BoxedMiddleware, Handler, Middleware, compose};
use crate::request::Request;
use crate::response::Response;
use crate::session::SessionStore;

#[derive(Default)]
struct MethodTable {
    tree: MatchitRouter<usize>,
    slots: HashMap<String, usize>,
}

/// Routes and middleware for one virtual host.
///
/// Configure it fully, then hand it to an [`Application`](crate::Application)
/// or straight to [`Server::serve`](crate::Server::serve). Every registration
/// method returns `&mut Self` so calls chain with `?`:
///
/// ```rust
/// # use stile::{Context, Router};
/// # fn list(ctx: &mut Context) { ctx.text("[]") }
/// # fn create(ctx: &mut Context) { ctx.text("{}") }
/// # fn main() -> Result<(), stile::Error> {
/// let mut router = Router::new();
/// router
///     .get("/users", list)?
///     .post("/users", create)?;
/// # Ok(()) }
/// ```
pub struct Router {
    routes: HashMap<Method, MethodTable>,
    chains: Vec<BoxedHandler>,
    middlewares: Vec<BoxedMiddleware>,
    session_store: Option<Arc<dyn SessionStore>>,
    logger: Option<Span>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            chains: Vec::new(),
            middlewares: Vec::new(),
            session_store: None,
            logger: None,
        }
    }

    // ── Attachments ──────────────────────────────────────────────────────────

    /// Replaces the global middleware list. Routes already registered keep
    /// the chain they were built with.
    pub fn set_middlewares(&mut self, middlewares: Vec<BoxedMiddleware>) -> &mut Self {
        self.middlewares = middlewares;
        self
    }

    /// Appends to the global middleware list (innermost so far). Routes
    /// already registered keep the chain they were built with.
    pub fn add_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn middlewares(&self) -> &[BoxedMiddleware] {
        &self.middlewares
    }

    /// Store reached through [`Context::session`] by every route.
    pub fn set_session_store(&mut self, store: impl SessionStore) -> &mut Self {
        self.session_store = Some(Arc::new(store));
        self
    }

    /// Parent span for the per-request spans of this router.
    pub fn set_logger(&mut self, span: Span) -> &mut Self {
        self.logger = Some(span);
        self
    }

    // ── Route registration ───────────────────────────────────────────────────

    pub fn get(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.handle(Method::GET, path, handler)
    }

    pub fn head(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.handle(Method::HEAD, path, handler)
    }

    pub fn options(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.handle(Method::OPTIONS, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.handle(Method::POST, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.handle(Method::PUT, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.handle(Method::PATCH, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.handle(Method::DELETE, path, handler)
    }

    /// Registers `handler` for any method, wrapped in the current global
    /// middleware list.
    ///
    /// Path parameters use `{name}` syntax, catch-alls `{*name}`. Registering
    /// the same method and pattern again replaces the previous chain.
    pub fn handle(&mut self, method: Method, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        let chain = compose(&self.middlewares, Arc::new(handler));
        if self.insert(method.clone(), path, chain)? {
            warn!(%method, path, "route registered twice, previous handler replaced");
        }
        Ok(self)
    }

    /// Registers a resource controller under `path`: one chain per standard
    /// method, each built as
    ///
    /// ```text
    /// router middlewares → controller middlewares → controller.wrap → verb handler
    /// ```
    pub fn register_controller<C: Controller>(&mut self, path: &str, controller: C) -> Result<&mut Self, Error> {
        // all seven patterns must be accepted before any chain goes live
        for method in &controller::METHODS {
            self.check_insert(method, path)?;
        }

        let controller = Arc::new(controller);
        let own = controller.middlewares();
        let mut replaced = false;
        for method in controller::METHODS {
            let verb = controller::verb_handler(Arc::clone(&controller), method.clone());
            let wrapped = Arc::clone(&controller).wrap(verb);
            let chain = compose(&self.middlewares, compose(&own, wrapped));
            replaced |= self.insert(method, path, chain)?;
        }
        if replaced {
            warn!(path, "controller path already registered, previous handlers replaced");
        }
        Ok(self)
    }

    /// Fails exactly when [`insert`](Self::insert) would, without touching
    /// the routing table.
    fn check_insert(&self, method: &Method, path: &str) -> Result<(), Error> {
        let result = match self.routes.get(method) {
            Some(table) if table.slots.contains_key(path) => return Ok(()),
            Some(table) => table.tree.clone().insert(path, 0),
            None => MatchitRouter::<usize>::new().insert(path, 0),
        };
        result.map_err(|source| Error::InvalidRoute { method: method.clone(), path: path.to_owned(), source })
    }

    /// Returns `true` if an existing chain for the same method and pattern
    /// was replaced.
    fn insert(&mut self, method: Method, path: &str, chain: BoxedHandler) -> Result<bool, Error> {
        let table = self.routes.entry(method.clone()).or_default();
        if let Some(&slot) = table.slots.get(path) {
            self.chains[slot] = chain;
            return Ok(true);
        }
        let slot = self.chains.len();
        table
            .tree
            .insert(path, slot)
            .map_err(|source| Error::InvalidRoute { method, path: path.to_owned(), source })?;
        table.slots.insert(path.to_owned(), slot);
        self.chains.push(chain);
        Ok(false)
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<(&BoxedHandler, Vec<(String, String)>)> {
        let table = self.routes.get(method)?;
        let matched = table.tree.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((&self.chains[*matched.value], params))
    }

    /// Runs the chain registered for the request's method and path.
    ///
    /// No match yields `404 Not Found` without running any handler. A chain
    /// that panics yields `500 Internal Server Error`. Either way the
    /// context is released before this returns.
    pub fn dispatch(&self, request: Request) -> Response {
        let Some((chain, params)) = self.lookup(request.method(), request.path()) else {
            debug!(method = %request.method(), path = request.path(), "no route matched");
            return Response::not_found();
        };

        let host = request.host().unwrap_or_default();
        let span = match &self.logger {
            Some(parent) => debug_span!(parent: parent, "request", host, method = %request.method(), path = request.path()),
            None => debug_span!("request", host, method = %request.method(), path = request.path()),
        };
        let _entered = span.clone().entered();

        let mut ctx = Context::with_route(request, params, self.session_store.clone(), span);
        if catch_unwind(AssertUnwindSafe(|| chain.handle(&mut ctx))).is_err() {
            error!("handler panicked");
            ctx.reset_response();
            ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
        ctx.finish()
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
