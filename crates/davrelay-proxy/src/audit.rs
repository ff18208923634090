//! Audit logging for relay requests.
//!
//! Logs every request outcome with structured fields via `tracing`.
//! Credentials, `Authorization` values, the `auth` parameter and upstream
//! query strings are never included.

use tracing::info;

/// Log a request rejected before any upstream I/O.
pub fn log_rejected(method: &str, status: u16, reason: &str) {
    info!(
        target: "davrelay_proxy::audit",
        method = method,
        status = status,
        decision = "reject",
        reason = reason,
        "relay request rejected"
    );
}

/// Log a CORS preflight answered locally.
pub fn log_preflight(host: &str) {
    info!(
        target: "davrelay_proxy::audit",
        method = "OPTIONS",
        host = host,
        status = 204,
        decision = "preflight",
        "relay preflight answered"
    );
}

/// Log a relayed upstream response.
pub fn log_relayed(method: &str, host: &str, path: &str, status: u16, authenticated: bool) {
    info!(
        target: "davrelay_proxy::audit",
        method = method,
        host = host,
        path = path,
        status = status,
        authenticated = authenticated,
        decision = "relay",
        "relay response"
    );
}

/// Log an upstream failure answered with a 5xx.
pub fn log_upstream_failure(method: &str, host: &str, kind: &str, status: u16) {
    info!(
        target: "davrelay_proxy::audit",
        method = method,
        host = host,
        kind = kind,
        status = status,
        decision = "fail",
        "relay upstream failure"
    );
}
