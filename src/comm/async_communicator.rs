//! Task-based request/reply orchestration.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use super::error::{PostError, RecvError};
use super::inbox::AsyncMailboxObserver;
use crate::config::Config;
use crate::delivery::{AsyncDeliveryAgent, ExchangeBuilder, ExternalSender, StandardExchange};
use crate::domain::{Fragment, Target};
use crate::listener::{DatagramListener, ListenerError, ListenerScope};
use crate::mailbox::AsyncMailbox;

/// Async counterpart of [`super::Communicator`].
///
/// Delivery and draining run on the caller's task. The inbound path stays on
/// the listener thread and hands fragments to the [`AsyncMailbox`] without
/// entering the runtime.
pub struct AsyncCommunicator {
    target: Target,
    agent: Arc<dyn AsyncDeliveryAgent>,
    exchange: Arc<dyn ExchangeBuilder>,
    listener: DatagramListener,
    mailbox: Arc<AsyncMailbox>,
}

impl std::fmt::Debug for AsyncCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCommunicator")
            .field("target", &self.target)
            .field("listener", &self.listener)
            .field("pending", &self.mailbox.len())
            .finish()
    }
}

impl AsyncCommunicator {
    pub fn new(target: Target, agent: Arc<dyn AsyncDeliveryAgent>, config: &Config) -> Self {
        let exchange = StandardExchange::new(config.delivery.exchange.clone(), &config.reply);
        let mailbox = Arc::new(AsyncMailbox::new(
            config.mailbox.capacity,
            config.reply.clone(),
        ));
        let listener = DatagramListener::new(config.listener.clone());
        listener.register(Arc::new(AsyncMailboxObserver(Arc::clone(&mailbox))));

        Self {
            target,
            agent,
            exchange: Arc::new(exchange),
            listener,
            mailbox,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let sender = ExternalSender::from_settings(&config.delivery)?;
        Ok(Self::new(config.target(), Arc::new(sender), config))
    }

    pub fn with_exchange(mut self, exchange: Arc<dyn ExchangeBuilder>) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn listener(&self) -> &DatagramListener {
        &self.listener
    }

    pub fn mailbox(&self) -> &AsyncMailbox {
        &self.mailbox
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start listening; see [`super::Communicator::listen`].
    ///
    /// Dropping the scope joins the listener thread. On a multi-thread
    /// runtime the wait runs under `block_in_place`, so other tasks keep
    /// their worker.
    pub fn listen(&self) -> Result<AsyncCommunicatorScope<'_>, ListenerError> {
        self.mailbox.reopen();
        let listener = self.listener.scoped()?;
        info!("[talkback:comm] Talking to {}", self.target);
        Ok(AsyncCommunicatorScope {
            communicator: self,
            _listener: listener,
        })
    }

    pub async fn send(&self, message: &str) -> Result<(), PostError> {
        if !self.listener.is_running() {
            warn!("[talkback:comm] Sending while not listening; replies will be lost");
        }
        let steps = self.exchange.build(message);
        debug!(
            "[talkback:comm] -> {} ({} steps)",
            self.target,
            steps.len()
        );
        self.agent
            .deliver_steps(&self.target, &steps)
            .await
            .map_err(|failure| PostError::new(self.target.clone(), failure))
    }

    pub fn receive(&self) -> impl Stream<Item = Result<Fragment, RecvError>> + '_ {
        self.mailbox
            .receive_all()
            .map(|r| r.map_err(RecvError::from))
    }

    /// Send `message`, then return its reply stream. No stream on failure.
    pub async fn communicate(
        &self,
        message: &str,
    ) -> Result<impl Stream<Item = Result<Fragment, RecvError>> + '_, PostError> {
        self.send(message).await?;
        Ok(self.receive())
    }

    pub async fn clear(&self) -> Result<(), PostError> {
        self.agent
            .clear(&self.target)
            .await
            .map_err(|failure| PostError::new(self.target.clone(), failure))
    }
}

/// An active listening session of an [`AsyncCommunicator`].
#[must_use = "the listener stops as soon as the scope is dropped"]
pub struct AsyncCommunicatorScope<'a> {
    communicator: &'a AsyncCommunicator,
    _listener: ListenerScope<'a>,
}

impl std::ops::Deref for AsyncCommunicatorScope<'_> {
    type Target = AsyncCommunicator;

    fn deref(&self) -> &Self::Target {
        self.communicator
    }
}

impl Drop for AsyncCommunicatorScope<'_> {
    fn drop(&mut self) {
        self.communicator.mailbox.close();

        // The listener scope's own drop is a no-op afterwards.
        let listener = &self.communicator.listener;
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| listener.stop())
            }
            _ => listener.stop(),
        }
        debug!("[talkback:comm] Session with {} closed", self.communicator.target);
    }
}
