//! Port availability checks

use tokio::net::TcpListener;
use tracing::debug;

use crate::error::{Result, ToolError};

/// How far past the default port we look for a free one
const PORT_SCAN_RANGE: u16 = 100;

/// Make sure `port` can be bound on `host`.
///
/// When the requested port is busy and is the default port, the next free
/// port above it is returned instead. An explicitly chosen port that is
/// busy is an error.
pub async fn check_port(host: &str, port: u16, default_port: u16) -> Result<u16> {
    if is_free(host, port).await {
        return Ok(port);
    }

    if port != default_port {
        return Err(ToolError::PortInUse { port });
    }

    for candidate in port.saturating_add(1)..=port.saturating_add(PORT_SCAN_RANGE) {
        if is_free(host, candidate).await {
            debug!("Port {} is busy, using {}", port, candidate);
            return Ok(candidate);
        }
    }

    Err(ToolError::PortInUse { port })
}

async fn is_free(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).await.is_ok()
}
