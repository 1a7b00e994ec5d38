//! Server error type and the process exit status attached to startup failures.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("cannot read configuration file '{}': {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error("cannot load data file '{}': {reason}", .path.display())]
    DataFile { path: PathBuf, reason: String },

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Status the process exits with when this error aborts startup.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServerError::Config { .. } => 1,
            ServerError::DataFile { .. } => 2,
            ServerError::Bind { .. } => 3,
            ServerError::Io(_) => 4,
        }
    }
}
