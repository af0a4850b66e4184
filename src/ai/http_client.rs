//! Shared HTTP clients.
//!
//! The pricing lookup goes through a global, lazily built client. Generation
//! clients are built per run because their timeout is configurable.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Global HTTP client for the live pricing sheet
///
/// Short timeout: the lookup is optional and falls back to the static
/// table, so it must never hold up a run.
pub static PRICING_CLIENT: Lazy<Option<Client>> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(2)
        .build()
        .map_err(|e| tracing::warn!("[Http] Failed to create pricing client: {}", e))
        .ok()
});

/// Get the global pricing client, if it could be built
#[inline]
pub fn pricing_client() -> Option<&'static Client> {
    PRICING_CLIENT.as_ref()
}

/// Build a client for generation calls with the given per-request timeout
pub fn generation_client(timeout: Duration) -> Result<Client, String> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))
}
