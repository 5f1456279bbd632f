//! Per-request access logging.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::context::Context;
use crate::handler::{BoxedHandler, Middleware};

/// Emits one `info` event per request once the inner chain has unwound:
/// method, path, final status and latency in microseconds.
///
/// Register it first so the latency covers every other layer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(move |ctx: &mut Context| {
            let start = Instant::now();
            next.handle(ctx);
            info!(
                method = %ctx.method(),
                path = ctx.path(),
                status = ctx.status().as_u16(),
                latency_us = start.elapsed().as_micros() as u64,
                "request served"
            );
        })
    }
}
