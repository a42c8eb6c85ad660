//! LSP Transport Layer
//!
//! Handles LSP message framing with Content-Length headers.
//! Provides async read/write with proper buffering over any byte stream
//! (stdin/stdout for the server binary, in-memory buffers in tests).

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::protocol::Message;

/// Largest body accepted from the client
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

/// Reads framed messages from the client
pub struct Transport<R> {
    reader: R,
}

impl<R> Transport<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the next message from the client
    ///
    /// LSP messages are framed with headers:
    /// ```text
    /// Content-Length: 123\r\n
    /// \r\n
    /// {"jsonrpc":"2.0",...}
    /// ```
    ///
    /// A body that is not valid JSON-RPC yields `InvalidData`. The frame has
    /// been consumed, so the caller may keep reading.
    pub async fn read_message(&mut self) -> io::Result<Message> {
        let content_length = self.read_headers().await?;

        let mut body = vec![0u8; content_length];
        self.reader.read_exact(&mut body).await?;

        let json =
            String::from_utf8(body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        tracing::trace!("LSP <- {}", json);

        Message::parse(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Read headers and return Content-Length
    async fn read_headers(&mut self) -> io::Result<usize> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Client closed connection",
                ));
            }

            let line = line.trim();

            // Empty line marks end of headers
            if line.is_empty() {
                break;
            }

            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
                );
            }
            // Ignore other headers (Content-Type, etc.)
        }

        let content_length = content_length
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Missing Content-Length"))?;

        if content_length > MAX_CONTENT_LENGTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Content-Length {} exceeds limit of {} bytes",
                    content_length, MAX_CONTENT_LENGTH
                ),
            ));
        }

        Ok(content_length)
    }
}

/// Write a message with LSP framing
pub async fn write_message<W>(writer: &mut W, message: &Message) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = message
        .to_json()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    tracing::trace!("LSP -> {}", json);

    let framed = frame(&json);
    writer.write_all(framed.as_bytes()).await?;
    writer.flush().await
}

/// Prefix a JSON body with its Content-Length header
pub fn frame(json: &str) -> String {
    format!("Content-Length: {}\r\n\r\n{}", json.len(), json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::lsp::protocol::{Notification, Response, RequestId};

    #[test]
    fn test_message_framing() {
        let json = r#"{"jsonrpc":"2.0","id":1,"method":"test"}"#;
        let framed = frame(json);
        assert!(framed.starts_with("Content-Length: 40"));
        assert!(framed.contains("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_read_sequential_messages() {
        let mut input = frame(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#);
        input.push_str("Content-Type: application/vscode-jsonrpc; charset=utf-8\r\n");
        input.push_str(&frame(r#"{"jsonrpc":"2.0","method":"exit"}"#));

        let mut transport = Transport::new(input.as_bytes());

        let first = transport.read_message().await.unwrap();
        assert_eq!(first.method(), Some("initialize"));
        let second = transport.read_message().await.unwrap();
        assert_eq!(second.method(), Some("exit"));

        let eof = transport.read_message().await.unwrap_err();
        assert_eq!(eof.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let input = "Content-Type: application/json\r\n\r\n{}";
        let mut transport = Transport::new(input.as_bytes());
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_oversized_content_length() {
        let input = "Content-Length: 18446744073709551615\r\n\r\n{}";
        let mut transport = Transport::new(input.as_bytes());
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let input = format!("Content-Length: {}\r\n\r\n{{}}", MAX_CONTENT_LENGTH + 1);
        let mut transport = Transport::new(input.as_bytes());
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_unparsable_content_length() {
        let input = "Content-Length: 99999999999999999999999\r\n\r\n{}";
        let mut transport = Transport::new(input.as_bytes());
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_write_message() {
        let mut out: Vec<u8> = Vec::new();
        let message: Message = Notification::new("window/showMessage", None).into();
        write_message(&mut out, &message).await.unwrap();
        let written = String::from_utf8(out).unwrap();
        assert_eq!(
            written,
            frame(r#"{"jsonrpc":"2.0","method":"window/showMessage"}"#)
        );

        let mut out: Vec<u8> = Vec::new();
        let message: Message = Response::success(RequestId::Number(2), serde_json::Value::Null).into();
        write_message(&mut out, &message).await.unwrap();
        let mut transport = Transport::new(out.as_slice());
        let echoed = transport.read_message().await.unwrap();
        assert!(matches!(echoed, Message::Response(r) if r.is_success()));
    }
}
