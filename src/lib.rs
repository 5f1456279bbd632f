//! # stile
//!
//! A minimal HTTP dispatch layer: pick a router by virtual host, a chain by
//! method and path, run it. Nothing more.
//!
//! ## The model
//!
//! - A [`Handler`] processes a request by mutating its [`Context`].
//! - A [`Middleware`] turns the next handler into one that wraps it.
//! - A [`Router`] folds its middleware list around each handler **once**, at
//!   registration, into an immutable chain stored in a [`matchit`] radix tree.
//! - A [`Controller`](controller::Controller) registers one chain per
//!   standard method under a single path.
//! - An [`Application`] holds one router per host plus a default.
//!
//! ```text
//! request ─► Application ─(host)─► Router ─(method, path)─► chain
//!                                                            │
//!            m0 ─► m1 ─► … ─► handler ─► mutate Context ◄─────┘
//! ```
//!
//! Handlers are synchronous. Routers are configured through `&mut`, then
//! moved into the [`Server`], which shares them read-only across
//! connections: nothing can be registered once serving starts.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use stile::{Application, Context, Server};
//! use stile::middleware::Trace;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stile::Error> {
//!     let mut app = Application::new();
//!     app.new_router("")
//!         .add_middleware(Trace)
//!         .get("/users/{id}", get_user)?
//!         .post("/users", create_user)?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! fn get_user(ctx: &mut Context) {
//!     let id: u64 = ctx.param_or("id", 0);
//!     ctx.json(&serde_json::json!({ "id": id }));
//! }
//!
//! fn create_user(ctx: &mut Context) {
//!     if ctx.body().is_empty() {
//!         ctx.text_with_code(400, "empty body");
//!         return;
//!     }
//!     ctx.set_header("location", "/users/99");
//!     ctx.json_with_code(201, &serde_json::json!({ "id": 99 }));
//! }
//! ```

mod app;
mod config;
mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod controller;
pub mod health;
pub mod middleware;
pub mod session;

pub use app::{Application, DEFAULT_HOST};
pub use config::ServerConfig;
pub use context::Context;
pub use controller::{Controller, MethodHandlerSet};
pub use error::Error;
pub use handler::{BoxedHandler, BoxedMiddleware, Handler, Middleware, boxed};
pub use http::{Method, StatusCode};
pub use request::Request;
pub use response::{ContentType, Response};
pub use router::Router;
pub use server::Server;
