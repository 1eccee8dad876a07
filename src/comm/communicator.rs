//! Thread-based request/reply orchestration.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::{PostError, RecvError};
use super::inbox::MailboxObserver;
use crate::config::Config;
use crate::delivery::{DeliveryAgent, ExchangeBuilder, ExternalSender, StandardExchange};
use crate::domain::{Fragment, Target};
use crate::listener::{DatagramListener, ListenerError, ListenerScope};
use crate::mailbox::Mailbox;

/// Sends messages to one target and reads its replies back.
///
/// Composes a [`DeliveryAgent`] for the outbound side with a
/// [`DatagramListener`] and [`Mailbox`] for the inbound side. The listener
/// posts every datagram into the mailbox; [`receive`](Self::receive) drains
/// it up to the sentinel.
///
/// ```no_run
/// # fn demo() -> anyhow::Result<()> {
/// use talkback::{Communicator, Config};
///
/// let config = Config::load(None, std::path::Path::new("."))?;
/// let comm = Communicator::from_config(&config)?;
/// let session = comm.listen()?;
/// for fragment in session.communicate("Hello")? {
///     print!("{} ", fragment?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Communicator {
    target: Target,
    agent: Arc<dyn DeliveryAgent>,
    exchange: Arc<dyn ExchangeBuilder>,
    listener: DatagramListener,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("target", &self.target)
            .field("listener", &self.listener)
            .field("pending", &self.mailbox.len())
            .finish()
    }
}

impl Communicator {
    /// Build a communicator for `target` using the standard exchange shape.
    pub fn new(target: Target, agent: Arc<dyn DeliveryAgent>, config: &Config) -> Self {
        let exchange = StandardExchange::new(config.delivery.exchange.clone(), &config.reply);
        let mailbox = Arc::new(Mailbox::new(config.mailbox.capacity, config.reply.clone()));
        let listener = DatagramListener::new(config.listener.clone());
        listener.register(Arc::new(MailboxObserver(Arc::clone(&mailbox))));

        Self {
            target,
            agent,
            exchange: Arc::new(exchange),
            listener,
            mailbox,
        }
    }

    /// Build a communicator that delivers through the configured program.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let sender = ExternalSender::from_settings(&config.delivery)?;
        Ok(Self::new(config.target(), Arc::new(sender), config))
    }

    /// Replace the exchange builder used by [`send`](Self::send).
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

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Bound UDP address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start listening for replies.
    ///
    /// The returned scope keeps the socket bound. Dropping it closes the
    /// mailbox (releasing a listener blocked on a full mailbox) and stops the
    /// listener. Fragments still pending stay queued for the next scope.
    pub fn listen(&self) -> Result<CommunicatorScope<'_>, ListenerError> {
        self.mailbox.reopen();
        let listener = self.listener.scoped()?;
        info!("[talkback:comm] Talking to {}", self.target);
        Ok(CommunicatorScope {
            communicator: self,
            _listener: listener,
        })
    }

    /// Deliver one message as a full exchange.
    pub fn send(&self, message: &str) -> Result<(), PostError> {
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
            .map_err(|failure| PostError::new(self.target.clone(), failure))
    }

    /// Drain one reply, up to and excluding the sentinel.
    pub fn receive(&self) -> impl Iterator<Item = Result<Fragment, RecvError>> + '_ {
        self.mailbox.receive_all().map(|r| r.map_err(RecvError::from))
    }

    /// Send `message`, then return its reply stream.
    ///
    /// A failed send returns the error and no stream.
    pub fn communicate(
        &self,
        message: &str,
    ) -> Result<impl Iterator<Item = Result<Fragment, RecvError>> + '_, PostError> {
        self.send(message)?;
        Ok(self.receive())
    }

    /// Ask the agent to clear the target's pending input.
    pub fn clear(&self) -> Result<(), PostError> {
        self.agent
            .clear(&self.target)
            .map_err(|failure| PostError::new(self.target.clone(), failure))
    }
}

/// An active listening session of a [`Communicator`].
#[must_use = "the listener stops as soon as the scope is dropped"]
pub struct CommunicatorScope<'a> {
    communicator: &'a Communicator,
    // Dropped after `Drop::drop` has closed the mailbox.
    _listener: ListenerScope<'a>,
}

impl std::ops::Deref for CommunicatorScope<'_> {
    type Target = Communicator;

    fn deref(&self) -> &Self::Target {
        self.communicator
    }
}

impl Drop for CommunicatorScope<'_> {
    fn drop(&mut self) {
        self.communicator.mailbox.close();
        debug!("[talkback:comm] Session with {} closed", self.communicator.target);
    }
}
