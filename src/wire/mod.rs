//! Wire framing: one frame is a 4-byte big-endian length prefix followed by
//! a fixed-shape control record. All peers — the name server, storage
//! servers, and the client driver — share this module.

mod record;

pub use record::{flags, ErrorCode, OpCode, Record};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;

/// Hard cap on a single frame's encoded size, guarding against a
/// corrupt/hostile length prefix driving an unbounded allocation.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Reads one length-prefixed frame and decodes it into a [`Record`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Record, WireError> {
    let len = reader.read_u32().await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => WireError::Closed,
        _ => WireError::Io(e),
    })? as usize;

    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Record::decode(&buf)
}

/// Encodes `record` and writes it as one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    record: &Record,
) -> Result<(), WireError> {
    let body = record.encode();
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
