//! Native-messaging framing: 4-byte native-endian length, then that many bytes of
//! UTF-8 JSON. Same layout in both directions.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Length prefix size.
pub const HEADER_LEN: usize = 4;

/// Prefix `payload` with its length. Fails if the payload exceeds `max_len`.
pub fn encode_frame(payload: &[u8], max_len: usize) -> io::Result<Vec<u8>> {
    if payload.len() > max_len || payload.len() > u32::MAX as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "outgoing message of {} bytes exceeds the {max_len} byte limit",
                payload.len()
            ),
        ));
    }
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Write one frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    max_len: usize,
) -> io::Result<()> {
    let frame = encode_frame(payload, max_len)?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Read one frame body.
///
/// EOF before or inside the frame is `UnexpectedEof`; a declared length above
/// `max_len` is `InvalidData` and nothing past the header is read.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: usize,
) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_ne_bytes(len_buf) as usize;
    if len > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("incoming message of {len} bytes exceeds the {max_len} byte limit"),
        ));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}
