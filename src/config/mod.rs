//! Configuration loading and management

mod io;
mod settings;

pub use io::{ENV_SENDER_PATH, ENV_TARGET, ENV_UDP_ADDR, ENV_UDP_PORT};
pub use settings::{DeliverySettings, ListenerSettings, MailboxSettings};

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::domain::{ReplyPolicy, Target};

/// Main configuration structure
///
/// Passed explicitly to every component that needs it; nothing reads
/// process-wide state after loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// UDP endpoint for incoming reply fragments
    #[serde(default)]
    pub listener: ListenerSettings,

    /// Reply buffering
    #[serde(default)]
    pub mailbox: MailboxSettings,

    /// End-of-reply and paragraph markers
    #[serde(default)]
    pub reply: ReplyPolicy,

    /// Delivery program and exchange shape
    #[serde(default)]
    pub delivery: DeliverySettings,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// The target named in the delivery settings
    pub fn target(&self) -> Target {
        let target = Target::new(&self.delivery.target);
        match &self.delivery.window_title {
            Some(title) if !title.trim().is_empty() => target.with_window(title),
            _ => target,
        }
    }

    /// Reject values the communication layer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.mailbox.capacity == 0 {
            bail!("mailbox.capacity must be at least 1");
        }
        if self.listener.buffer_size == 0 {
            bail!("listener.buffer_size must be at least 1");
        }
        if self.listener.address.trim().is_empty() {
            bail!("listener.address must not be empty");
        }
        if self.reply.sentinel.trim().is_empty() {
            bail!("reply.sentinel must not be empty");
        }
        if self.reply.sentinel.trim() == self.reply.paragraph_break.trim() {
            bail!(
                "reply.sentinel and reply.paragraph_break must differ (both are {:?})",
                self.reply.sentinel
            );
        }
        if self.delivery.target.trim().is_empty() {
            bail!("delivery.target must not be empty");
        }
        Ok(())
    }
}
