//! Connection multiplexer.
//!
//! One task owns the listener and every client socket. Each open connection
//! has exactly one readiness future in flight, for reading or for writing
//! depending on its phase. When a future completes the connection is advanced
//! with non-blocking reads or writes and a fresh future is registered, unless
//! the connection was closed.

use crate::connection::{Connection, ConnectionId, Phase, ReadStatus, Readiness};
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use shared::{eq_ignore_case, ProtocolError};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use tokio::io::Ready;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// What to do with a connection after advancing it.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Keep it open and wait on its current interest.
    Wait,
    /// The peer sent the exit message.
    Exit,
    /// The peer closed its side.
    PeerClosed,
}

pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
    exit_message: String,
    buffer_size: usize,
    connections: HashMap<ConnectionId, Connection>,
    readiness: FuturesUnordered<BoxFuture<'static, Readiness>>,
    next_connection_id: ConnectionId,
}

impl Server {
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: Dispatcher,
        exit_message: &str,
        buffer_size: usize,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            dispatcher,
            exit_message: exit_message.to_string(),
            buffer_size,
            connections: HashMap::new(),
            readiness: FuturesUnordered::new(),
            next_connection_id: 1,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Serves connections until `shutdown` becomes true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let id = self.next_connection_id;
                        self.next_connection_id += 1;
                        let conn = Connection::new(id, addr, stream, self.buffer_size);
                        self.readiness.push(conn.readiness());
                        self.connections.insert(id, conn);
                        info!("Accepted connection {} from {} ({} open)", id, addr, self.connections.len());
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                Some((id, ready)) = self.readiness.next(), if !self.readiness.is_empty() => {
                    self.handle_ready(id, ready).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Stopping multiplexer, closing {} connections", self.connections.len());
        self.connections.clear();
        Ok(())
    }

    async fn handle_ready(&mut self, id: ConnectionId, ready: io::Result<Ready>) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };

        let step = match ready {
            Ok(_) => Self::advance(conn, &self.dispatcher, &self.exit_message).await,
            Err(e) => Err(e.into()),
        };

        match step {
            Ok(Step::Wait) => self.readiness.push(conn.readiness()),
            Ok(Step::Exit) => self.close(id, "exit requested"),
            Ok(Step::PeerClosed) => self.close(id, "closed by peer"),
            Err(e) => {
                warn!("Connection {} failed: {}", id, e);
                self.close(id, "error");
            }
        }
    }

    async fn advance(
        conn: &mut Connection,
        dispatcher: &Dispatcher,
        exit_message: &str,
    ) -> Result<Step, ProtocolError> {
        match conn.phase() {
            Phase::AwaitingRead => {
                if conn.fill()? == ReadStatus::Closed {
                    return Ok(Step::PeerClosed);
                }
                Self::process_frames(conn, dispatcher, exit_message).await
            }
            Phase::AwaitingWrite => {
                if !conn.flush()? {
                    return Ok(Step::Wait);
                }
                debug!("Reply to connection {} flushed", conn.id());
                // A request may have arrived together with the previous one.
                Self::process_frames(conn, dispatcher, exit_message).await
            }
        }
    }

    /// Dispatches buffered requests until one produces a reply or none is left.
    async fn process_frames(
        conn: &mut Connection,
        dispatcher: &Dispatcher,
        exit_message: &str,
    ) -> Result<Step, ProtocolError> {
        while let Some(body) = conn.take_request()? {
            if eq_ignore_case(&body, exit_message) {
                return Ok(Step::Exit);
            }
            debug!("Connection {} sent {} bytes", conn.id(), body.len());

            if let Some(response) = dispatcher.handle(&mut conn.session, &body).await {
                conn.queue_response(&response);
                return Ok(Step::Wait);
            }
        }
        Ok(Step::Wait)
    }

    fn close(&mut self, id: ConnectionId, reason: &str) {
        if let Some(conn) = self.connections.remove(&id) {
            info!(
                "Closed connection {} from {} ({}), {} open",
                id,
                conn.addr(),
                reason,
                self.connections.len()
            );
        }
    }
}
