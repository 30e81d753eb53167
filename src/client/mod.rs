//! The client driver: a thin, external-collaborator-shaped binary that
//! keeps one long-lived connection to the name server and opens a
//! short-lived connection to whichever storage server the name server
//! routes it to (spec.md §4.3). Command parsing, EXEC process-launching
//! and the STREAM word-by-word printer are deliberately minimal here —
//! the system under specification is the NS↔SS coordination surface, not
//! this shell.

pub mod commands;

use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::wire::{read_frame, write_frame, OpCode, Record};

/// Formats a wire error the way spec.md §7 requires of user-visible output:
/// `ERROR [<context>]: <taxonomy string>` plus an optional `Details:` line.
pub fn format_error(context: &str, reply: &Record) -> String {
    let mut out = format!("ERROR [{context}]: {:?}", reply.error_code);
    if !reply.error_msg.is_empty() {
        out.push_str(&format!("\nDetails: {}", reply.error_msg));
    }
    out
}

/// A long-lived connection to the name server.
pub struct NsConnection {
    stream: TcpStream,
    pub username: String,
}

impl NsConnection {
    pub async fn connect(addr: SocketAddr, username: impl Into<String>) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(NsConnection { stream, username: username.into() })
    }

    pub async fn register(&mut self, ip: std::net::IpAddr, port: u16) -> std::io::Result<Record> {
        let req = Record::request(OpCode::RegisterClient, self.username.clone(), "")
            .with_data(format!("{ip} {port}"));
        self.call(req).await
    }

    /// Sends `request` and waits for the one reply the name server always
    /// sends back.
    pub async fn call(&mut self, request: Record) -> std::io::Result<Record> {
        write_frame(&mut self.stream, &request).await?;
        Ok(read_frame(&mut self.stream).await?)
    }

    /// Parses a `"<ip> <port>"` locate reply's `data` field into a
    /// dialable address.
    pub fn parse_locate(data: &str) -> Option<SocketAddr> {
        let mut parts = data.split_whitespace();
        let ip = parts.next()?.parse().ok()?;
        let port: u16 = parts.next()?.parse().ok()?;
        Some(SocketAddr::new(ip, port))
    }
}

/// Opens a short-lived connection to a storage server, as every client
/// phase against the SS does (spec.md §4.3: "each phase re-opens a
/// connection to the SS").
pub async fn connect_ss(addr: SocketAddr) -> std::io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

pub async fn ss_call(addr: SocketAddr, request: Record) -> std::io::Result<Record> {
    let mut stream = connect_ss(addr).await?;
    write_frame(&mut stream, &request).await?;
    Ok(read_frame(&mut stream).await?)
}
