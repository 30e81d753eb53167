//! Short-lived NS→SS control-endpoint RPCs: dial, send one framed record,
//! read one framed reply, close. Used by existence probes, CREATE/DELETE/
//! MOVE forwarding, CREATEFOLDER broadcast and primary-resync.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::wire::{read_frame, write_frame, Record};

/// Dials `addr`, writes `request`, reads one reply, all bounded by
/// `deadline`. A connect/IO failure or timeout is reported as `None`
/// ("unknown"/"unreachable"); callers distinguish "unknown" from an
/// application-level error on the reply.
pub async fn call(addr: SocketAddr, request: &Record, deadline: Duration) -> Option<Record> {
    let fut = async {
        let mut stream = TcpStream::connect(addr).await.ok()?;
        stream.set_nodelay(true).ok();
        write_frame(&mut stream, request).await.ok()?;
        read_frame(&mut stream).await.ok()
    };

    match timeout(deadline, fut).await {
        Ok(reply) => reply,
        Err(_) => None,
    }
}

/// Bare TCP connect probe used by the heartbeat loop: liveness only cares
/// whether the control endpoint accepts a connection, not a framed reply.
pub async fn reachable(addr: SocketAddr, deadline: Duration) -> bool {
    matches!(timeout(deadline, TcpStream::connect(addr)).await, Ok(Ok(_)))
}
