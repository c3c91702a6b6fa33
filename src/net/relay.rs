//! Bidirectional byte relay between a client and one backend.
//!
//! # Responsibilities
//! - Close the client straight away when no backend is available
//! - Connect to the chosen backend within the configured timeout
//! - Copy bytes both ways until either side closes, then close both

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{copy_bidirectional, AsyncWriteExt};
use tokio::net::TcpStream;

/// Error type for a single relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("connect to {node} timed out after {timeout:?}")]
    ConnectTimeout { node: String, timeout: Duration },

    #[error("connect to {node} failed: {source}")]
    Connect {
        node: String,
        #[source]
        source: io::Error,
    },

    #[error("relay to {node} aborted: {source}")]
    Io {
        node: String,
        #[source]
        source: io::Error,
    },
}

impl RelayError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            RelayError::ConnectTimeout { .. } => "connect_timeout",
            RelayError::Connect { .. } => "connect",
            RelayError::Io { .. } => "io",
        }
    }
}

/// What a finished relay moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// No backend was available; the client was closed without relaying.
    NoBackend,
    /// Bytes were copied until one side closed.
    Completed { to_backend: u64, to_client: u64 },
}

/// Relay `client` to `backend` until either side closes.
///
/// Both sockets are closed when this returns, whatever the outcome.
pub async fn relay(
    mut client: TcpStream,
    backend: Option<String>,
    connect_timeout: Duration,
) -> Result<RelayOutcome, RelayError> {
    let Some(node) = backend else {
        // Best effort: the client may already be gone.
        let _ = client.shutdown().await;
        return Ok(RelayOutcome::NoBackend);
    };

    let mut upstream = match tokio::time::timeout(connect_timeout, TcpStream::connect(&node)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(RelayError::Connect { node, source }),
        Err(_) => {
            return Err(RelayError::ConnectTimeout {
                node,
                timeout: connect_timeout,
            })
        }
    };

    // Nagle only adds latency for a transparent relay.
    let _ = client.set_nodelay(true);
    let _ = upstream.set_nodelay(true);

    match copy_bidirectional(&mut client, &mut upstream).await {
        Ok((to_backend, to_client)) => Ok(RelayOutcome::Completed {
            to_backend,
            to_client,
        }),
        Err(source) => Err(RelayError::Io { node, source }),
    }
}
