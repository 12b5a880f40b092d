//! Newline-delimited JSON framing over a byte stream.
//!
//! The transport is a UNIX stream socket: the client writes one JSON object
//! terminated by `\n`, the server writes one JSON object terminated by `\n`
//! and closes. EOF before the delimiter yields whatever was read (a client
//! may close its write side instead of sending the newline).

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::message::MAX_MESSAGE_BYTES;

/// Read one message from the stream. Returns `None` on immediate EOF.
pub async fn read_message<R>(reader: &mut BufReader<R>) -> std::io::Result<Option<Vec<u8>>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = Vec::new();
    let mut limited = reader.take((MAX_MESSAGE_BYTES + 1) as u64);
    let n = limited.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(Some(line))
}

/// Write one message followed by the delimiter and flush.
pub async fn write_message<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_stops_at_newline() {
        let data = b"{\"type\":\"ping\"}\ntrailing";
        let mut reader = BufReader::new(&data[..]);
        let msg = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(msg, b"{\"type\":\"ping\"}");
    }

    #[tokio::test]
    async fn read_handles_eof_without_delimiter() {
        let data = b"{\"type\":\"ping\"}";
        let mut reader = BufReader::new(&data[..]);
        let msg = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(msg, b"{\"type\":\"ping\"}");
    }

    #[tokio::test]
    async fn read_empty_stream_is_none() {
        let mut reader = BufReader::new(&b""[..]);
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_appends_delimiter() {
        let mut out = Vec::new();
        write_message(&mut out, b"{}").await.unwrap();
        assert_eq!(out, b"{}\n");
    }
}
