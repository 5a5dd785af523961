//! Relaying queries to the upstream resolver.
//!
//! Every query gets its own UDP socket, so responses can never be routed
//! to the wrong requester and nothing is shared between query tasks.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::UpstreamError;

/// Largest upstream response the relay reads.
pub const MAX_RESPONSE_SIZE: usize = 2048;

/// Default time to wait for the upstream answer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Send `query` verbatim to `upstream` and return its raw answer.
///
/// No retries: any failure ends the query.
pub async fn forward(
    query: &[u8],
    upstream: SocketAddr,
    timeout: Duration,
) -> Result<Vec<u8>, UpstreamError> {
    let local: SocketAddr = if upstream.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local).await.map_err(UpstreamError::Connect)?;
    socket
        .connect(upstream)
        .await
        .map_err(UpstreamError::Connect)?;

    let sent = socket.send(query).await.map_err(UpstreamError::Write)?;
    debug!(bytes = sent, %upstream, "query sent upstream");

    let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
    let len = tokio::time::timeout(timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| UpstreamError::Timeout(timeout))?
        .map_err(UpstreamError::Read)?;
    debug!(bytes = len, %upstream, "response read from upstream");

    buf.truncate(len);
    Ok(buf)
}
