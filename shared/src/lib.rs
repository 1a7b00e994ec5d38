//! Types shared by the HOTELIER server and client.
//!
//! - [`codec`]: length-prefixed framing and the incremental frame decoder
//! - [`protocol`]: opcodes, status codes, request parsing and response encoding
//! - [`model`]: hotels, reviews, users and badges as persisted and sent on the wire

pub mod codec;
pub mod model;
pub mod protocol;

pub use codec::{encode_frame, DecodeState, FrameDecoder, LENGTH_PREFIX_LEN, MAX_FRAME_LEN};
pub use model::{current_timestamp, eq_ignore_case, Badge, Hotel, Rating, Review, User};
pub use protocol::{leader_changed_message, status, Opcode, Request, Response, ReviewScores};

/// Errors raised while framing or decoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),
    #[error("frame is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("connection closed mid-frame")]
    Truncated,
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
