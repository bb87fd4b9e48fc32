use crate::types::{Endpoint, ProbeOutcome};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::debug;

/// A single-attempt reachability check.
///
/// Implementations must not surface errors: every failure mode is `Offline`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> ProbeOutcome;
}

/// Raw TCP connect prober. No bytes are exchanged with the peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> ProbeOutcome {
        probe(endpoint, timeout).await
    }
}

/// Attempt one TCP connection to `endpoint`, bounded by `timeout`.
///
/// - Name resolution and the connect share the same deadline.
/// - A bracketed IPv6 literal such as `[::1]` is connected to without its brackets.
/// - Refused, unreachable, unresolvable and timed-out targets all map to `Offline`.
/// - The stream (or the in-flight connect) is dropped before returning, closing the socket.
pub async fn probe(endpoint: &Endpoint, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();
    let target = (endpoint.host(), endpoint.port);
    let outcome = match time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            ProbeOutcome::Online
        }
        Ok(Err(err)) => {
            debug!(%endpoint, error = %err, "connect failed");
            ProbeOutcome::Offline
        }
        Err(_) => {
            debug!(%endpoint, ?timeout, "connect timed out");
            ProbeOutcome::Offline
        }
    };
    debug!(
        %endpoint,
        %outcome,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "probe finished"
    );
    outcome
}
