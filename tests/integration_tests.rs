//! Integration tests for the HOTELIER server and client
//!
//! These tests start a real multiplexer on an ephemeral port with temporary
//! data files and talk to it through the client library or raw sockets.

use client::network::ServerConnection;
use server::dispatcher::Dispatcher;
use server::network::Server;
use server::notifier::Notifier;
use server::persistence::DataFiles;
use server::ranking::{RankingEngine, RankingIndex};
use server::ServerError;
use shared::{encode_frame, leader_changed_message, Hotel};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const EXIT: &str = "EXIT";

struct TestServer {
    addr: SocketAddr,
    engine: RankingEngine,
    files: DataFiles,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<Result<(), ServerError>>,
    _dir: TempDir,
}

impl TestServer {
    async fn start(notifier: Notifier) -> Self {
        let dir = TempDir::new().unwrap();
        let files = DataFiles {
            hotels: dir.path().join("hotels.json"),
            users: dir.path().join("users.json"),
            reviews: dir.path().join("reviews.json"),
        };
        let hotels = vec![
            Hotel::new(1, "Hotel Roma 1", "Roma"),
            Hotel::new(2, "Hotel Roma 2", "Roma"),
            Hotel::new(3, "Hotel Roma 3", "Roma"),
            Hotel::new(4, "Hotel Milano 1", "Milano"),
        ];
        std::fs::write(&files.hotels, serde_json::to_string_pretty(&hotels).unwrap()).unwrap();

        let store = files.load().unwrap();
        let index = Arc::new(RankingIndex::with_cities(store.cities()));
        let store = Arc::new(RwLock::new(store));

        let engine = RankingEngine::new(Arc::clone(&store), Arc::clone(&index), notifier);
        engine.cycle().await;

        let dispatcher = Dispatcher::new(store, index, Some(files.clone()));
        // A small read chunk forces frames to span several reads.
        let server = Server::bind("127.0.0.1:0".parse().unwrap(), dispatcher, EXIT, 8)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(server.run(rx));

        Self {
            addr,
            engine,
            files,
            shutdown,
            handle,
            _dir: dir,
        }
    }

    async fn connect(&self) -> ServerConnection {
        ServerConnection::connect(&self.addr.to_string(), Duration::from_millis(50)).await
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        timeout(Duration::from_secs(2), self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

async fn read_code(stream: &mut TcpStream) -> i32 {
    timeout(Duration::from_secs(2), stream.read_i32())
        .await
        .unwrap()
        .unwrap()
}

async fn read_text(stream: &mut TcpStream) -> String {
    let len = timeout(Duration::from_secs(2), stream.read_u32())
        .await
        .unwrap()
        .unwrap();
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await.unwrap();
    String::from_utf8(body).unwrap()
}

/// REQUEST/RESPONSE TESTS
mod protocol_tests {
    use super::*;

    /// Walks through registration, login and review failures end to end
    #[tokio::test]
    async fn registration_login_scenario() {
        let server = TestServer::start(Notifier::disabled()).await;
        let mut conn = server.connect().await;

        assert_eq!(conn.request_code("1;alice;pw1").await.unwrap(), 0);
        assert_eq!(conn.request_code("1;alice;pw2").await.unwrap(), 3);
        assert_eq!(conn.request_code("2;alice;pw2").await.unwrap(), 1);
        assert_eq!(conn.request_code("2;alice;pw1").await.unwrap(), 0);
        assert_eq!(
            conn.request_code("5;Hotel Napoli 1;Napoli;3;3;3;3;3").await.unwrap(),
            1
        );
        assert_eq!(conn.request_code("5;Hotel Roma 1;Roma;3;6;3;3;3").await.unwrap(), 2);
        assert_eq!(conn.request_text("4;Napoli").await.unwrap(), "");
        assert_eq!(conn.request_text("6").await.unwrap(), "Recensore");

        conn.close(EXIT).await.unwrap();
        server.stop().await;
    }

    /// A request delivered one byte at a time is still decoded as one frame
    #[tokio::test]
    async fn fragmented_request() {
        let server = TestServer::start(Notifier::disabled()).await;
        let mut stream = TcpStream::connect(server.addr).await.unwrap();

        for byte in encode_frame(b"1;fragmented;password") {
            stream.write_all(&[byte]).await.unwrap();
            stream.flush().await.unwrap();
            sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(read_code(&mut stream).await, 0);

        server.stop().await;
    }

    /// Two requests sent in one write get two replies in order
    #[tokio::test]
    async fn coalesced_requests() {
        let server = TestServer::start(Notifier::disabled()).await;
        let mut stream = TcpStream::connect(server.addr).await.unwrap();

        let mut bytes = encode_frame(b"1;bob;pw");
        bytes.extend(encode_frame(b"2;bob;pw"));
        bytes.extend(encode_frame(b"6"));
        stream.write_all(&bytes).await.unwrap();

        assert_eq!(read_code(&mut stream).await, 0);
        assert_eq!(read_code(&mut stream).await, 0);
        assert_eq!(read_text(&mut stream).await, "Recensore");

        server.stop().await;
    }

    /// The exit message closes the connection without a reply
    #[tokio::test]
    async fn exit_message_closes_connection() {
        let server = TestServer::start(Notifier::disabled()).await;
        let mut stream = TcpStream::connect(server.addr).await.unwrap();

        stream.write_all(&encode_frame(b"exit")).await.unwrap();
        let mut buf = [0u8; 8];
        let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);

        server.stop().await;
    }

    /// Unknown opcodes get no reply and do not leak an earlier reply
    #[tokio::test]
    async fn unknown_opcode_is_ignored() {
        let server = TestServer::start(Notifier::disabled()).await;
        let mut stream = TcpStream::connect(server.addr).await.unwrap();

        stream.write_all(&encode_frame(b"9;whatever")).await.unwrap();
        stream.write_all(&encode_frame(b"6")).await.unwrap();
        assert_eq!(read_text(&mut stream).await, "Errore");

        server.stop().await;
    }

    /// Sessions belong to connections, not users
    #[tokio::test]
    async fn sessions_are_per_connection() {
        let server = TestServer::start(Notifier::disabled()).await;
        let mut first = server.connect().await;
        let mut second = server.connect().await;

        assert_eq!(first.request_code("1;carol;pw").await.unwrap(), 0);
        assert_eq!(first.request_code("2;carol;pw").await.unwrap(), 0);

        assert_eq!(second.request_text("6").await.unwrap(), "Errore");
        assert_eq!(first.request_text("6").await.unwrap(), "Recensore");

        // Logging in from the second connection does not log the first out.
        assert_eq!(second.request_code("2;carol;pw").await.unwrap(), 0);
        assert_eq!(first.request_text("6").await.unwrap(), "Recensore");

        server.stop().await;
    }
}

/// RANKING AND NOTIFICATION TESTS
mod ranking_tests {
    use super::*;

    /// A review moves the hotel to the top after the next ranking cycle
    #[tokio::test]
    async fn review_changes_city_ranking() {
        let server = TestServer::start(Notifier::disabled()).await;
        let mut conn = server.connect().await;

        let before: Vec<Hotel> =
            serde_json::from_str(&conn.request_text("4;roma").await.unwrap()).unwrap();
        let ids: Vec<u32> = before.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        conn.request_code("1;dave;pw").await.unwrap();
        conn.request_code("2;dave;pw").await.unwrap();
        assert_eq!(conn.request_code("5;hotel roma 3;ROMA;5;5;5;5;5").await.unwrap(), 0);

        let changes = server.engine.cycle().await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].hotel_id, 3);

        let after: Vec<Hotel> =
            serde_json::from_str(&conn.request_text("4;Roma").await.unwrap()).unwrap();
        assert_eq!(after[0].name, "Hotel Roma 3");
        assert_eq!(after[0].reviews, 1);

        server.stop().await;
    }

    /// Leadership changes reach a datagram listener
    #[tokio::test]
    async fn leader_change_is_announced() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let notifier = Notifier::bind(receiver.local_addr().unwrap()).await.unwrap();
        let server = TestServer::start(notifier).await;
        let mut conn = server.connect().await;

        conn.request_code("1;erin;pw").await.unwrap();
        conn.request_code("2;erin;pw").await.unwrap();
        conn.request_code("5;Hotel Roma 2;Roma;4;4;4;4;4").await.unwrap();
        server.engine.cycle().await;

        let mut buf = [0u8; 256];
        let (len, _) = timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            std::str::from_utf8(&buf[..len]).unwrap(),
            leader_changed_message("Roma", "Hotel Roma 2")
        );

        // Nothing changed since, so the next cycle is silent.
        assert!(server.engine.cycle().await.is_empty());

        server.stop().await;
    }
}

/// PERSISTENCE TESTS
mod persistence_tests {
    use super::*;

    /// Every accepted mutation is visible in the data files
    #[tokio::test]
    async fn mutations_reach_disk() {
        let server = TestServer::start(Notifier::disabled()).await;
        let mut conn = server.connect().await;

        conn.request_code("1;frank;pw").await.unwrap();
        conn.request_code("2;frank;pw").await.unwrap();
        conn.request_code("5;Hotel Milano 1;Milano;3;2;4;5;1").await.unwrap();

        let reloaded = server.files.load().unwrap();
        assert_eq!(reloaded.users().len(), 1);
        assert_eq!(reloaded.users()[0].username, "frank");
        assert_eq!(reloaded.users()[0].reviews, 1);
        assert_eq!(reloaded.reviews().len(), 1);

        let hotel = reloaded.find_hotel("Hotel Milano 1", "Milano").unwrap();
        assert_eq!(hotel.reviews, 1);
        assert_eq!(hotel.rate, 3.0);
        assert!(hotel.avg_review_date.is_some());

        server.stop().await;
    }

    /// Rejected requests leave the files untouched
    #[tokio::test]
    async fn rejected_review_is_not_saved() {
        let server = TestServer::start(Notifier::disabled()).await;
        let mut conn = server.connect().await;

        conn.request_code("1;gina;pw").await.unwrap();
        conn.request_code("2;gina;pw").await.unwrap();
        assert_eq!(conn.request_code("5;Hotel Roma 1;Roma;0;3;3;3;3").await.unwrap(), 2);

        assert!(!server.files.reviews.exists());
        server.stop().await;
    }
}
