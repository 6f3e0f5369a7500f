use std::net::SocketAddr;
use std::time::Duration;

/// Default listener address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:24515";

/// Default timeout for a single procedure call (30 seconds).
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Maximum request body size (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// How long open connections may keep the listener alive after shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub call_timeout: Duration,
    pub max_body_bytes: usize,
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 24515)),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment.
    ///
    /// - `SAURPC_BIND_ADDR` (optional, default `127.0.0.1:24515`): listener address
    /// - `SAURPC_CALL_TIMEOUT_SECS` (optional, default 30): max seconds per procedure call
    /// - `SAURPC_MAX_BODY_BYTES` (optional, default 1 MiB): largest accepted request body
    /// - `SAURPC_SHUTDOWN_GRACE_SECS` (optional, default 5): drain time after shutdown
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let bind_addr = lookup("SAURPC_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|_| {
                "SAURPC_BIND_ADDR must be a socket address such as 127.0.0.1:24515".to_string()
            })?;

        let call_timeout_secs = match lookup("SAURPC_CALL_TIMEOUT_SECS") {
            Some(val) => val
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| "SAURPC_CALL_TIMEOUT_SECS must be a positive integer".to_string())?,
            None => DEFAULT_CALL_TIMEOUT_SECS,
        };

        let max_body_bytes = match lookup("SAURPC_MAX_BODY_BYTES") {
            Some(val) => val
                .parse::<usize>()
                .ok()
                .filter(|bytes| *bytes > 0)
                .ok_or_else(|| "SAURPC_MAX_BODY_BYTES must be a positive integer".to_string())?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let shutdown_grace = match lookup("SAURPC_SHUTDOWN_GRACE_SECS") {
            Some(val) => val
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "SAURPC_SHUTDOWN_GRACE_SECS must be a whole number of seconds")?,
            None => DEFAULT_SHUTDOWN_GRACE,
        };

        Ok(Self {
            bind_addr,
            call_timeout: Duration::from_secs(call_timeout_secs),
            max_body_bytes,
            shutdown_grace,
        })
    }
}
