//! A single UDP request/response exchange with one upstream nameserver.
//!
//! No retransmission, no TCP fallback: one write, one read, a 5s
//! deadline on the whole exchange, and a fixed 512-octet read buffer —
//! the classical DNS/UDP limit.  A response larger than that is
//! truncated by the network stack and handed to the caller as-is.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::TransportError;

const RECV_BUFFER_SIZE: usize = 512;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Send `packed_query` to `server` over UDP and return the raw bytes
/// of whatever comes back first.
///
/// A fresh ephemeral-port socket is bound for this call alone and
/// dropped (closed) on every exit path, success or failure.
pub async fn send_one(server: SocketAddr, packed_query: &[u8]) -> Result<Vec<u8>, TransportError> {
    match timeout(REQUEST_TIMEOUT, send_one_notimeout(server, packed_query)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

async fn send_one_notimeout(
    server: SocketAddr,
    packed_query: &[u8],
) -> Result<Vec<u8>, TransportError> {
    let sock = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(TransportError::Io)?;
    sock.connect(server).await.map_err(TransportError::Io)?;
    sock.send(packed_query).await.map_err(TransportError::Io)?;

    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let len = sock.recv(&mut buf).await.map_err(TransportError::Io)?;
    buf.truncate(len);

    Ok(buf)
}
