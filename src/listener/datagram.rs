//! Received datagrams and the observers they are dispatched to.

use chrono::{DateTime, Local};
use std::net::SocketAddr;
use tracing::warn;

/// One decoded datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Payload decoded as text
    pub text: String,
    /// Sender of the datagram
    pub origin: SocketAddr,
    /// When the listener received it
    pub received_at: DateTime<Local>,
}

/// Something that accepts received datagrams.
///
/// Called on the listener's thread, in registration order. Returning an
/// error (or panicking) is logged by the listener and affects no other
/// observer.
pub trait DatagramObserver: Send + Sync {
    fn on_datagram(&self, datagram: &Datagram) -> anyhow::Result<()>;
}

impl<F> DatagramObserver for F
where
    F: Fn(&Datagram) -> anyhow::Result<()> + Send + Sync,
{
    fn on_datagram(&self, datagram: &Datagram) -> anyhow::Result<()> {
        self(datagram)
    }
}

/// Decode a payload as UTF-8, falling back to an escaped rendering.
pub fn decode_payload(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(e) => {
            let escaped = payload.escape_ascii().to_string();
            warn!(
                "[talkback:listener] Failed to decode datagram ({}): {}",
                e, escaped
            );
            escaped
        }
    }
}
