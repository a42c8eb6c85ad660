//! Language server loop
//!
//! Reads one framed message at a time, hands it to the session and writes
//! whatever the session queued. Requests are never processed concurrently.

use std::io;

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

use crate::infra::lsp::protocol::{Message, Response, ResponseError, error_codes};
use crate::infra::lsp::transport::{Transport, write_message};
use crate::services::session::SessionController;

pub struct LanguageServer {
    session: SessionController,
}

impl LanguageServer {
    pub fn new(session: SessionController) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Serve over stdin/stdout until `exit` or end of input
    pub async fn run_stdio(&mut self) -> io::Result<i32> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        self.serve(stdin, &mut stdout).await
    }

    /// Serve until `exit` or end of input and return the process exit code.
    ///
    /// End of input without `exit` tears the session down the same way
    /// `exit` would.
    pub async fn serve<R, W>(&mut self, reader: R, writer: &mut W) -> io::Result<i32>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut transport = Transport::new(reader);
        tracing::info!("Language server started");

        loop {
            let message = match transport.read_message().await {
                Ok(message) => message,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::info!("Client disconnected without exit");
                    let code = self.session.exit();
                    self.flush(writer).await?;
                    return Ok(code);
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    tracing::warn!("Malformed message: {}", e);
                    let reply = Response::failure(
                        None,
                        ResponseError::new(error_codes::PARSE_ERROR, e.to_string()),
                    );
                    write_message(writer, &reply.into()).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let exit = self.session.handle_message(message);
            self.flush(writer).await?;

            if let Some(code) = exit {
                return Ok(code);
            }
        }
    }

    async fn flush<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        for message in self.session.take_outgoing() {
            write_message(writer, &message).await?;
        }
        Ok(())
    }
}
