//! Background listener for leadership change announcements.

use log::{debug, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Receives datagrams on its own task and queues them until drained.
pub struct NotificationListener {
    queue: mpsc::UnboundedReceiver<String>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl NotificationListener {
    /// Joins `group` on `port` and starts listening.
    ///
    /// The port is bound with address reuse so every client on the host
    /// receives the group's datagrams.
    pub async fn start(group: Ipv4Addr, port: u16, buffer_size: usize) -> io::Result<Self> {
        let socket = bind_group(group, port)?;
        info!("Listening for notifications on {}:{}", group, port);
        Ok(Self::with_socket(socket, Some(group), buffer_size))
    }

    /// Listens on an already bound socket. `group` is left on shutdown.
    pub fn with_socket(socket: UdpSocket, group: Option<Ipv4Addr>, buffer_size: usize) -> Self {
        let (tx, queue) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(listen(socket, group, buffer_size.max(1), tx, stop_rx));

        Self {
            queue,
            stop,
            handle,
        }
    }

    /// Every message received since the last call, oldest first.
    pub fn drain(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(message) = self.queue.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Stops the listener and waits for it to leave the group.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            warn!("Notification listener panicked: {}", e);
        }
    }
}

fn bind_group(group: Ipv4Addr, port: u16) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).into())?;
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    UdpSocket::from_std(socket.into())
}

async fn listen(
    socket: UdpSocket,
    group: Option<Ipv4Addr>,
    buffer_size: usize,
    queue: mpsc::UnboundedSender<String>,
    mut stop: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => {
                    let message = String::from_utf8_lossy(&buf[..len]).into_owned();
                    debug!("Notification from {}: {}", from, message);
                    if queue.send(message).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Notification socket error: {}", e);
                    break;
                }
            },
            _ = stop.changed() => break,
        }
    }

    if let Some(group) = group {
        if let Err(e) = socket.leave_multicast_v4(group, Ipv4Addr::UNSPECIFIED) {
            warn!("Failed to leave {}: {}", group, e);
        }
    }
    info!("Notification listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_messages_are_queued_in_order() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let mut listener = NotificationListener::with_socket(socket, None, 256);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"first", addr).await.unwrap();
        sender.send_to(b"second", addr).await.unwrap();

        let mut received = Vec::new();
        for _ in 0..100 {
            received.extend(listener.drain());
            if received.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(received, vec!["first".to_string(), "second".to_string()]);
        assert!(listener.drain().is_empty());

        listener.shutdown().await;
    }

    #[tokio::test]
    async fn test_listeners_share_the_group_port() {
        let port = std::net::UdpSocket::bind("0.0.0.0:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let group = Ipv4Addr::new(239, 255, 32, 33);

        let first = NotificationListener::start(group, port, 64).await.unwrap();
        let second = NotificationListener::start(group, port, 64).await.unwrap();

        first.shutdown().await;
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_without_messages() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener = NotificationListener::with_socket(socket, None, 64);
        tokio::time::timeout(Duration::from_secs(2), listener.shutdown())
            .await
            .unwrap();
    }
}
