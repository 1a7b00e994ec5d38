//! # HOTELIER Client Library
//!
//! Terminal client for the hotel review server. The user drives a numbered
//! menu; each choice becomes one request frame and the client waits for the
//! reply before showing the menu again.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! One TCP connection to the server with blocking request/reply calls and a
//! fixed-interval retry while the server is unreachable.
//!
//! ### Notifications Module (`notifications`)
//! A background task joined to the multicast group. Messages about new
//! leading hotels are queued and printed before the next menu.
//!
//! ### Input Module (`input`)
//! Prompts and validation for menu choices, request fields and review scores.
//!
//! ### Menu Module (`menu`)
//! The interactive loop tying the three together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::Console;
//! use client::menu::{App, Outcome};
//! use client::network::ServerConnection;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut app = App::new(Console::stdio(), None, "EXIT");
//!     loop {
//!         let conn = ServerConnection::connect("127.0.0.1:8080", Duration::from_secs(5)).await;
//!         if app.serve(conn).await? == Outcome::Exit {
//!             break;
//!         }
//!     }
//!     app.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod menu;
pub mod network;
pub mod notifications;

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server connection failed or was closed.
    #[error("connection error: {0}")]
    Connection(#[source] io::Error),
    #[error(transparent)]
    Protocol(#[from] shared::ProtocolError),
    /// Reading from or writing to the terminal failed.
    #[error("console error: {0}")]
    Console(#[from] io::Error),
}
