//! Observers that move received datagrams into a mailbox.

use std::sync::Arc;

use tracing::debug;

use crate::listener::{Datagram, DatagramObserver};
use crate::mailbox::{AsyncMailbox, Mailbox};

/// Posts every datagram into a blocking [`Mailbox`].
///
/// Runs on the listener thread and waits there while the mailbox is full.
#[derive(Debug, Clone)]
pub struct MailboxObserver(pub Arc<Mailbox>);

impl DatagramObserver for MailboxObserver {
    fn on_datagram(&self, datagram: &Datagram) -> anyhow::Result<()> {
        debug!("[talkback:comm] <- {:?}", datagram.text);
        self.0.post(datagram.text.clone())?;
        Ok(())
    }
}

/// Posts every datagram into an [`AsyncMailbox`] from the listener thread.
///
/// Uses [`AsyncMailbox::post_blocking`], so the handoff never enters the
/// tokio runtime.
#[derive(Debug, Clone)]
pub struct AsyncMailboxObserver(pub Arc<AsyncMailbox>);

impl DatagramObserver for AsyncMailboxObserver {
    fn on_datagram(&self, datagram: &Datagram) -> anyhow::Result<()> {
        debug!("[talkback:comm] <- {:?}", datagram.text);
        self.0.post_blocking(datagram.text.clone())?;
        Ok(())
    }
}
