//! Virtual-host multiplexer.
//!
//! An [`Application`] owns one [`Router`] per host name plus an optional
//! default router under the empty key `""`. Each request is routed by its
//! target host:
//!
//! 1. exact host, port included (`a.test:8080`)
//! 2. host with the port stripped (`a.test`)
//! 3. the default router
//!
//! Host keys are compared case-insensitively. With no matching router and no
//! default, the request gets `404 Not Found`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{debug, warn};

use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Key of the router used when no host-specific router matches.
pub const DEFAULT_HOST: &str = "";

/// Routers keyed by virtual host.
///
/// ```rust
/// use stile::{Application, Context};
///
/// # fn main() -> Result<(), stile::Error> {
/// let mut app = Application::new();
/// app.new_router("")
///     .get("/", |ctx: &mut Context| ctx.text("default"))?;
/// app.new_router("api.example.com")
///     .get("/", |ctx: &mut Context| ctx.text("api"))?;
/// # Ok(()) }
/// ```
#[derive(Default)]
pub struct Application {
    routers: HashMap<String, Router>,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty router for `host` and returns it for configuration.
    /// `""` is the default router. A router already registered for `host`
    /// is replaced.
    pub fn new_router(&mut self, host: &str) -> &mut Router {
        match self.routers.entry(host_key(host)) {
            Entry::Occupied(mut slot) => {
                warn!(host, "router registered twice for host, previous router replaced");
                slot.insert(Router::new());
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(Router::new()),
        }
    }

    /// Registers an already-configured router for `host`, returning the one
    /// it replaces, if any.
    pub fn add_router(&mut self, host: &str, router: Router) -> Option<Router> {
        let previous = self.routers.insert(host_key(host), router);
        if previous.is_some() {
            warn!(host, "router registered twice for host, previous router replaced");
        }
        previous
    }

    pub fn router(&self, host: &str) -> Option<&Router> {
        self.routers.get(&host_key(host))
    }

    pub fn router_mut(&mut self, host: &str) -> Option<&mut Router> {
        self.routers.get_mut(&host_key(host))
    }

    /// Routes `request` to the router for its host and runs it there.
    pub fn dispatch(&self, request: Request) -> Response {
        match self.select(request.host()) {
            Some(router) => router.dispatch(request),
            None => {
                debug!(host = request.host(), "no router for host");
                Response::not_found()
            }
        }
    }

    fn select(&self, host: Option<&str>) -> Option<&Router> {
        let by_host = host.map(host_key).and_then(|host| {
            self.routers.get(&host).or_else(|| {
                let (name, port) = host.rsplit_once(':')?;
                // an IPv6 literal without port ends in `]`, not `:digits`
                if port.chars().all(|c| c.is_ascii_digit()) {
                    self.routers.get(name)
                } else {
                    None
                }
            })
        });
        by_host.or_else(|| self.routers.get(DEFAULT_HOST))
    }
}

impl From<Router> for Application {
    /// An application serving `router` for every host.
    fn from(router: Router) -> Self {
        let mut app = Self::new();
        app.add_router(DEFAULT_HOST, router);
        app
    }
}

fn host_key(host: &str) -> String {
    host.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use crate::error::Error;
    use http::header::{self, HeaderValue};
    use http::{Method, StatusCode, Uri};

    fn with_host(host: &'static str) -> Request {
        Request::get("/").with_header(header::HOST, HeaderValue::from_static(host))
    }

    fn two_hosts() -> Result<Application, Error> {
        let mut app = Application::new();
        app.new_router("").get("/", |ctx: &mut Context| ctx.text("Hello world"))?;

        let mut a = Router::new();
        a.get("/", |ctx: &mut Context| ctx.text("a.test"))?;
        app.add_router("a.test", a);
        Ok(app)
    }

    #[test]
    fn host_router_serves_its_host_and_default_serves_the_rest() -> Result<(), Error> {
        let app = two_hosts()?;

        assert_eq!(app.dispatch(with_host("a.test")).body(), b"a.test");
        assert_eq!(app.dispatch(with_host("b.test")).body(), b"Hello world");
        assert_eq!(app.dispatch(Request::get("/")).body(), b"Hello world");
        Ok(())
    }

    #[test]
    fn host_matching_ignores_case_and_port() -> Result<(), Error> {
        let app = two_hosts()?;

        assert_eq!(app.dispatch(with_host("A.Test")).body(), b"a.test");
        assert_eq!(app.dispatch(with_host("a.test:8080")).body(), b"a.test");
        assert_eq!(app.dispatch(with_host("[::1]")).body(), b"Hello world");

        let absolute = Request::new(Method::GET, Uri::from_static("http://a.test/"));
        assert_eq!(app.dispatch(absolute).body(), b"a.test");
        Ok(())
    }

    #[test]
    fn exact_host_with_port_wins_over_stripped_host() -> Result<(), Error> {
        let mut app = two_hosts()?;
        app.new_router("a.test:9000").get("/", |ctx: &mut Context| ctx.text("port 9000"))?;

        assert_eq!(app.dispatch(with_host("a.test:9000")).body(), b"port 9000");
        assert_eq!(app.dispatch(with_host("a.test:8080")).body(), b"a.test");
        Ok(())
    }

    #[test]
    fn host_router_misses_do_not_fall_back() -> Result<(), Error> {
        let mut app = two_hosts()?;
        app.router_mut("").unwrap().get("/default-only", |ctx: &mut Context| ctx.text("default"))?;

        let req = Request::new(Method::GET, Uri::from_static("/default-only"))
            .with_header(header::HOST, HeaderValue::from_static("a.test"));
        assert_eq!(app.dispatch(req).status(), StatusCode::NOT_FOUND);

        let req = Request::new(Method::GET, Uri::from_static("/default-only"))
            .with_header(header::HOST, HeaderValue::from_static("b.test"));
        assert_eq!(app.dispatch(req).body(), b"default");
        Ok(())
    }

    #[test]
    fn no_router_at_all_is_not_found() {
        let app = Application::new();
        assert_eq!(app.dispatch(with_host("a.test")).status(), StatusCode::NOT_FOUND);

        let mut app = Application::new();
        app.new_router("a.test");
        assert_eq!(app.dispatch(with_host("b.test")).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn registering_a_host_twice_replaces_the_router() -> Result<(), Error> {
        let mut app = two_hosts()?;
        let mut replacement = Router::new();
        replacement.get("/", |ctx: &mut Context| ctx.text("replacement"))?;

        assert!(app.add_router("A.TEST", replacement).is_some());
        assert_eq!(app.dispatch(with_host("a.test")).body(), b"replacement");

        app.new_router("a.test");
        assert_eq!(app.dispatch(with_host("a.test")).status(), StatusCode::NOT_FOUND);
        assert!(app.router("a.test").is_some());
        Ok(())
    }

    #[test]
    fn router_converts_into_default_application() -> Result<(), Error> {
        let mut router = Router::new();
        router.get("/", |ctx: &mut Context| ctx.text("only"))?;
        let app = Application::from(router);
        assert_eq!(app.dispatch(with_host("anything.test")).body(), b"only");
        Ok(())
    }
}
