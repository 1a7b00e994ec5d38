//! # HOTELIER Server Library
//!
//! The server side of the hotel review platform. Clients connect over TCP,
//! register, log in, search hotels and submit reviews; every few seconds the
//! server re-ranks the hotels of each city and multicasts a short message
//! whenever a city gets a new leading hotel.
//!
//! ## Architecture
//!
//! ### Single-Task Multiplexer
//! All client sockets are owned by one task ([`network::Server`]). Sockets are
//! never read and written concurrently: a connection either waits for
//! readability while a request is assembled, or for writability while its
//! reply is flushed. Every store mutation happens on this task.
//!
//! ### Ranking Task
//! [`ranking::RankingEngine`] runs on a timer next to the multiplexer. It
//! takes read access to the store, rebuilds each city's ranking and publishes
//! it into a concurrent map that search requests read without locking the
//! store.
//!
//! ### Notifications
//! Leadership changes are sent as plain-text UDP datagrams to a multicast
//! group by [`notifier::Notifier`]. Sends are best effort.
//!
//! ## Module Organization
//!
//! - `config`: JSON configuration file
//! - `error`: startup and runtime errors with their exit codes
//! - `store`: hotels, users and reviews held in memory
//! - `persistence`: JSON data files
//! - `ranking`: scoring, per-city ranking index and the periodic engine
//! - `notifier`: multicast sender
//! - `dispatcher`: request handling
//! - `connection`: per-connection framing and session state
//! - `network`: the multiplexer
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::dispatcher::Dispatcher;
//! use server::network::Server;
//! use server::ranking::RankingIndex;
//! use server::store::Store;
//! use std::sync::Arc;
//! use tokio::sync::{watch, RwLock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(RwLock::new(Store::default()));
//!     let index = Arc::new(RankingIndex::new());
//!     let dispatcher = Dispatcher::new(store, index, None);
//!
//!     let server = Server::bind("127.0.0.1:8080".parse()?, dispatcher, "exit", 1024).await?;
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     server.run(shutdown_rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod network;
pub mod notifier;
pub mod persistence;
pub mod ranking;
pub mod store;

pub use error::ServerError;
