//! Request/response connection to the server.
//!
//! The protocol is strictly one request at a time: every call writes one
//! frame and waits for the matching reply before returning.

use crate::ClientError;
use log::{info, warn};
use shared::{encode_frame, Request, Response, MAX_FRAME_LEN};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

pub struct ServerConnection<S = TcpStream> {
    stream: S,
}

impl ServerConnection<TcpStream> {
    /// Connects to `addr`, retrying every `retry` until the server answers.
    pub async fn connect(addr: &str, retry: Duration) -> Self {
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    info!("Connected to {}", addr);
                    return Self::new(stream);
                }
                Err(e) => {
                    warn!("Cannot reach {}: {}", addr, e);
                    println!(
                        "Server unreachable, retrying in {} seconds...",
                        retry.as_secs()
                    );
                    sleep(retry).await;
                }
            }
        }
    }
}

impl<S> ServerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    async fn send(&mut self, body: &str) -> Result<(), ClientError> {
        self.stream
            .write_all(&encode_frame(body.as_bytes()))
            .await
            .map_err(ClientError::Connection)?;
        self.stream.flush().await.map_err(ClientError::Connection)
    }

    /// Sends `body` and reads a bare 4-byte status code back.
    pub async fn request_code(&mut self, body: &str) -> Result<i32, ClientError> {
        self.send(body).await?;
        self.stream.read_i32().await.map_err(ClientError::Connection)
    }

    /// Sends `body` and reads a length-prefixed string back.
    pub async fn request_text(&mut self, body: &str) -> Result<String, ClientError> {
        self.send(body).await?;

        let len = self
            .stream
            .read_u32()
            .await
            .map_err(ClientError::Connection)? as usize;
        // Replies have no size cap. The buffer grows with the bytes received.
        let mut payload = Vec::with_capacity(len.min(MAX_FRAME_LEN));
        let read = (&mut self.stream)
            .take(len as u64)
            .read_to_end(&mut payload)
            .await
            .map_err(ClientError::Connection)?;
        if read < len {
            return Err(ClientError::Connection(io::ErrorKind::UnexpectedEof.into()));
        }

        String::from_utf8(payload).map_err(|e| shared::ProtocolError::from(e).into())
    }

    /// Sends `request` and reads the reply shape its opcode calls for.
    pub async fn call(&mut self, request: &Request) -> Result<Response, ClientError> {
        let body = request.encode();
        if request.opcode().replies_with_text() {
            self.request_text(&body).await.map(Response::Text)
        } else {
            self.request_code(&body).await.map(Response::Code)
        }
    }

    /// Sends the exit message and closes without waiting for a reply.
    pub async fn close(mut self, exit_message: &str) -> Result<(), ClientError> {
        self.send(exit_message).await?;
        self.stream.shutdown().await.map_err(ClientError::Connection)
    }
}
