//! Settings sections of the configuration file

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::delivery::ExchangePolicy;
use crate::mailbox::DEFAULT_CAPACITY;

/// UDP endpoint replies are received on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSettings {
    /// Bind address (default: 127.0.0.1)
    #[serde(default = "default_address")]
    pub address: String,

    /// Bind port. Use 0 to let the OS pick one.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest datagram accepted, in bytes (default: 4096)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9999
}

fn default_buffer_size() -> usize {
    4096
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl ListenerSettings {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            buffer_size: default_buffer_size(),
        }
    }

    /// `address:port` as shown in logs and errors
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxSettings {
    /// Fragments buffered before the listener waits (default: 8)
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// How outgoing messages reach the target process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// Path of the delivery program. Required to send anything.
    #[serde(default)]
    pub program: Option<PathBuf>,

    /// Process name of the target (default: "Claude")
    #[serde(default = "default_target")]
    pub target: String,

    /// Window title to pick when the target owns several windows
    #[serde(default)]
    pub window_title: Option<String>,

    /// Submit every step of an exchange in one program invocation (default: true)
    #[serde(default = "default_true")]
    pub batch: bool,

    /// Control sequence that empties the target's input box. Empty disables `clear`.
    #[serde(default = "default_clear_sequence")]
    pub clear_sequence: String,

    /// Steps wrapped around every outgoing message
    #[serde(default)]
    pub exchange: ExchangePolicy,
}

fn default_target() -> String {
    "Claude".to_string()
}

fn default_true() -> bool {
    true
}

fn default_clear_sequence() -> String {
    "^a{BACKSPACE}".to_string()
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            program: None,
            target: default_target(),
            window_title: None,
            batch: default_true(),
            clear_sequence: default_clear_sequence(),
            exchange: ExchangePolicy::default(),
        }
    }
}
