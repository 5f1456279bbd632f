//! Built-in health-check handlers.
//!
//! | Probe | Suggested path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? |
//! | **Readiness** | `/readyz` | Can it serve traffic? |
//!
//! ```rust
//! use stile::{Router, health};
//!
//! # fn main() -> Result<(), stile::Error> {
//! let mut router = Router::new();
//! router
//!     .get("/healthz", health::liveness)?
//!     .get("/readyz", health::readiness)?;
//! # Ok(()) }
//! ```
//!
//! Register your own handler under `/readyz` instead if readiness depends on
//! downstream services.

use crate::Context;

/// Always `200 OK` with body `"ok"`. If the process can answer HTTP at all,
/// it is alive.
pub fn liveness(ctx: &mut Context) {
    ctx.text("ok");
}

/// `200 OK` with body `"ready"`.
pub fn readiness(ctx: &mut Context) {
    ctx.text("ready");
}
