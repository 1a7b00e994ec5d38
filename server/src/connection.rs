//! Per-connection state driven by the multiplexer.
//!
//! A connection alternates between two phases. While `AwaitingRead` it
//! accumulates bytes into its [`FrameDecoder`] until a whole request frame is
//! buffered. Once a reply is queued it switches to `AwaitingWrite` and stays
//! there until every byte of the reply has been written, then goes back to
//! reading. Only one readiness interest is ever registered at a time.

use futures::future::BoxFuture;
use futures::FutureExt;
use shared::{DecodeState, FrameDecoder, ProtocolError, Response};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{Interest, Ready};
use tokio::net::TcpStream;

pub type ConnectionId = u64;

/// Outcome of waiting on a connection's current interest.
pub type Readiness = (ConnectionId, io::Result<Ready>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingRead,
    AwaitingWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Open,
    /// The peer closed its side.
    Closed,
}

/// Authenticated user bound to a connection. Id 0 means anonymous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    user_id: u32,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user_id != 0
    }

    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    pub fn bind(&mut self, user_id: u32) {
        self.user_id = user_id;
    }

    pub fn clear(&mut self) {
        self.user_id = 0;
    }
}

pub struct Connection {
    id: ConnectionId,
    addr: SocketAddr,
    stream: Arc<TcpStream>,
    decoder: FrameDecoder,
    pub session: Session,
    outgoing: Vec<u8>,
    written: usize,
    phase: Phase,
    /// Reused for every read.
    scratch: Vec<u8>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, stream: TcpStream, read_chunk: usize) -> Self {
        Self {
            id,
            addr,
            stream: Arc::new(stream),
            decoder: FrameDecoder::with_capacity(read_chunk),
            session: Session::default(),
            outgoing: Vec::new(),
            written: 0,
            phase: Phase::AwaitingRead,
            scratch: vec![0u8; read_chunk.max(1)],
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn interest(&self) -> Interest {
        match self.phase {
            Phase::AwaitingRead => Interest::READABLE,
            Phase::AwaitingWrite => Interest::WRITABLE,
        }
    }

    /// Future resolving once the socket is ready for the current phase.
    pub fn readiness(&self) -> BoxFuture<'static, Readiness> {
        let id = self.id;
        let stream = Arc::clone(&self.stream);
        let interest = self.interest();
        async move { (id, stream.ready(interest).await) }.boxed()
    }

    /// Reads what the socket has, stopping early once a frame is complete.
    pub fn fill(&mut self) -> Result<ReadStatus, ProtocolError> {
        loop {
            match self.stream.try_read(&mut self.scratch) {
                Ok(0) => return Ok(ReadStatus::Closed),
                Ok(n) => {
                    self.decoder.extend(&self.scratch[..n])?;
                    if self.has_frame() {
                        return Ok(ReadStatus::Open);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ReadStatus::Open),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn has_frame(&self) -> bool {
        matches!(self.decoder.state(), DecodeState::FrameReady { .. })
    }

    /// Takes the next complete request body, leaving later bytes buffered.
    pub fn take_request(&mut self) -> Result<Option<String>, ProtocolError> {
        self.decoder.next_text()
    }

    pub fn queue_response(&mut self, response: &Response) {
        self.outgoing = response.encode();
        self.written = 0;
        self.phase = Phase::AwaitingWrite;
    }

    pub fn pending_bytes(&self) -> usize {
        self.outgoing.len() - self.written
    }

    /// Writes as much of the queued reply as the socket accepts.
    /// Returns true once the reply is fully sent.
    pub fn flush(&mut self) -> io::Result<bool> {
        while self.written < self.outgoing.len() {
            match self.stream.try_write(&self.outgoing[self.written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        self.outgoing.clear();
        self.written = 0;
        self.phase = Phase::AwaitingRead;
        Ok(true)
    }
}
