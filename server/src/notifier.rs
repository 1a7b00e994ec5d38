//! Multicast announcements of ranking leadership changes.

use crate::ranking::LeaderChange;
use log::{debug, info, warn};
use shared::leader_changed_message;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Fire-and-forget datagram sender. Send failures are logged and dropped.
#[derive(Debug)]
pub struct Notifier {
    socket: Option<UdpSocket>,
    target: Option<SocketAddr>,
}

impl Notifier {
    pub async fn bind(target: SocketAddr) -> io::Result<Self> {
        let local = if target.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local).await?;
        if target.ip().is_multicast() {
            socket.set_multicast_ttl_v4(1)?;
        }
        info!("Notifications go to {}", target);

        Ok(Self {
            socket: Some(socket),
            target: Some(target),
        })
    }

    /// A notifier that drops every announcement.
    pub fn disabled() -> Self {
        Self {
            socket: None,
            target: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.socket.is_some()
    }

    /// Sends one datagram describing `change`. Returns whether it was sent.
    pub async fn announce(&self, change: &LeaderChange) -> bool {
        let (Some(socket), Some(target)) = (&self.socket, self.target) else {
            return false;
        };

        let message = leader_changed_message(&change.city, &change.hotel_name);
        match socket.send_to(message.as_bytes(), target).await {
            Ok(_) => {
                debug!("Announced: {}", message);
                true
            }
            Err(e) => {
                warn!("Failed to send notification to {}: {}", target, e);
                false
            }
        }
    }
}
