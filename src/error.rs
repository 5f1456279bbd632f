//! Unified error type.

use http::Method;
use thiserror::Error;

/// The error type returned by stile's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed by writing to the
/// [`Context`](crate::Context), not as `Error`s. This type surfaces setup
/// mistakes (a route pattern the matcher rejects) and infrastructure failures
/// (binding to a port, accepting a connection, persisting a session).
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    /// The pattern is malformed or overlaps a *different* pattern already
    /// registered for the same method. Re-registering the identical pattern
    /// is not an error; it replaces the previous chain.
    #[error("invalid route {method} `{path}`: {source}")]
    InvalidRoute {
        method: Method,
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("no session store attached to the router")]
    NoSessionStore,

    #[error("session store: {0}")]
    Session(String),
}
