//! Background UDP datagram listener.
//!
//! Reply fragments arrive as individual UDP datagrams. The listener owns the
//! socket, runs the receive loop on a dedicated thread (or inline on the
//! caller), and hands every decoded [`Datagram`] to its registered
//! [`DatagramObserver`]s.

mod datagram;
mod server;

pub use datagram::{Datagram, DatagramObserver, decode_payload};
pub use server::{DatagramListener, ListenerScope};

/// Listener lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListenerState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl ListenerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerState::Idle => "idle",
            ListenerState::Starting => "starting",
            ListenerState::Running => "running",
            ListenerState::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the receive loop runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// On the calling thread; `start` returns after `stop`.
    Inline,
    /// On a dedicated thread.
    #[default]
    Background,
}

/// Errors raised while starting the listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind udp://{endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn receive thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("listener is {0}")]
    Busy(ListenerState),
}
