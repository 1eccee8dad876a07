//! Emitting side of the reply channel.
//!
//! Whatever writes the target's reply (a plugin, a script, `talkback sink`)
//! sends each fragment as one UDP datagram to the listener's endpoint, then
//! the sentinel.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::debug;

use crate::config::ListenerSettings;
use crate::domain::ReplyPolicy;

/// Sends reply fragments to one listener endpoint.
#[derive(Debug)]
pub struct Sink {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl Sink {
    /// Sink aimed at the endpoint described by `settings`.
    pub fn connect(settings: &ListenerSettings) -> io::Result<Self> {
        let destination = (settings.address.as_str(), settings.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("{} did not resolve", settings.endpoint()),
                )
            })?;
        Self::to(destination)
    }

    /// Sink aimed at an already resolved address.
    pub fn to(destination: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if destination.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        Ok(Self {
            socket,
            destination,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Send one fragment as a single datagram.
    pub fn send(&self, fragment: &str) -> io::Result<()> {
        debug!("[talkback:sink] -> {}: {:?}", self.destination, fragment);
        let sent = self.socket.send_to(fragment.as_bytes(), self.destination)?;
        if sent != fragment.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated ({} of {} bytes)", sent, fragment.len()),
            ));
        }
        Ok(())
    }

    pub fn paragraph(&self, policy: &ReplyPolicy) -> io::Result<()> {
        self.send(&policy.paragraph_break)
    }

    /// Send the sentinel, ending the reply.
    pub fn finish(&self, policy: &ReplyPolicy) -> io::Result<()> {
        self.send(&policy.sentinel)
    }
}
