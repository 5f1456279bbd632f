//! HTTP server and graceful shutdown.
//!
//! The server is the transport the dispatch core sits behind: it accepts
//! connections, lets hyper parse HTTP/1.1 or HTTP/2, reads each request body
//! into memory and hands a [`Request`] to the [`Application`].
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::app::Application;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    config: ServerConfig,
    listener: Option<TcpListener>,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use stile::Server;
    /// # fn main() -> Result<(), stile::Error> {
    /// let server = Server::bind("0.0.0.0:3000")?;
    /// # Ok(()) }
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        Ok(Self::with_config(ServerConfig::new(addr)?))
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self { config, listener: None }
    }

    /// Serves on an already-bound listener, e.g. one bound to port 0.
    pub fn from_listener(listener: TcpListener) -> Result<Self, Error> {
        let config = ServerConfig::from_addr(listener.local_addr()?);
        Ok(Self { config, listener: Some(listener) })
    }

    /// Replaces the settings, keeping the address the server listens on.
    pub fn config(mut self, config: ServerConfig) -> Self {
        let addr = self.config.addr;
        self.config = ServerConfig { addr, ..config };
        self
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, app: impl Into<Application>) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting when `signal`
    /// resolves instead of on SIGTERM / Ctrl-C.
    pub async fn serve_with_shutdown<S>(self, app: impl Into<Application>, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let listener = match self.listener {
            Some(listener) => listener,
            None => TcpListener::bind(self.config.addr).await?,
        };
        let addr = listener.local_addr()?;

        // From here on the application is shared read-only: routes and
        // middleware can no longer change.
        let app = Arc::new(app.into());
        let config = Arc::new(self.config);

        info!(%addr, "stile listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let config = Arc::clone(&config);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // called once per request on the connection
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            let config = Arc::clone(&config);
                            async move { dispatch(&app, &config, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // reap finished connections so the set stays bounded
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("stile stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads the body, then runs the synchronous dispatch core.
///
/// Every failure becomes a response, so hyper never sees an error and the
/// client always gets a complete reply.
async fn dispatch(
    app: &Application,
    config: &ServerConfig,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let limited = Limited::new(body, config.max_body_bytes);

    let body = match tokio::time::timeout(config.read_timeout, limited.collect()).await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) if e.is::<LengthLimitError>() => {
            warn!(peer = %remote_addr, limit = config.max_body_bytes, "request body too large");
            return Ok(Response::with_status(StatusCode::PAYLOAD_TOO_LARGE).into_inner());
        }
        Ok(Err(e)) => {
            debug!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::with_status(StatusCode::BAD_REQUEST).into_inner());
        }
        Err(_) => {
            warn!(peer = %remote_addr, "request body read timed out");
            return Ok(Response::with_status(StatusCode::REQUEST_TIMEOUT).into_inner());
        }
    };

    Ok(app.dispatch(Request::from_parts(parts, body)).into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. If a handler cannot be installed,
/// that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
