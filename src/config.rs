//! Transport settings for [`Server`](crate::Server).

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::Error;

/// How long a request body may take to arrive before the request is
/// answered with `408 Request Timeout`.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest request body read into memory before answering `413`.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Server settings. Everything past the address has a usable default.
///
/// ```rust
/// use std::time::Duration;
/// use stile::ServerConfig;
///
/// # fn main() -> Result<(), stile::Error> {
/// let config = ServerConfig::new("127.0.0.1:3000")?
///     .read_timeout(Duration::from_secs(5))
///     .max_body_bytes(64 * 1024);
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub(crate) addr: SocketAddr,
    pub(crate) read_timeout: Duration,
    pub(crate) max_body_bytes: usize,
}

impl ServerConfig {
    pub fn new(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        Ok(Self::from_addr(addr))
    }

    pub fn from_addr(addr: SocketAddr) -> Self {
        Self {
            addr,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn addr(&self) -> SocketAddr { self.addr }
}

impl Default for ServerConfig {
    /// `127.0.0.1:3000` with the default limits.
    fn default() -> Self {
        Self::from_addr(SocketAddr::from(([127, 0, 0, 1], 3000)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_address_and_keeps_defaults() {
        let config = ServerConfig::new("127.0.0.1:3000").unwrap();
        assert_eq!(config.addr().port(), 3000);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn default_is_local_port_3000() {
        let config = ServerConfig::default().max_body_bytes(1024);
        assert_eq!(config.addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn rejects_bad_address() {
        assert!(matches!(ServerConfig::new("localhost"), Err(Error::InvalidAddress(a)) if a == "localhost"));
    }
}
