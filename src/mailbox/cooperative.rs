//! Task-suspending mailbox for tokio callers.

use std::sync::{Mutex, MutexGuard};

use futures::StreamExt;
use futures::stream::FusedStream;
use tokio::sync::Notify;

use super::MailboxError;
use super::slots::{Pop, Push, Slots};
use crate::domain::{Fragment, ReplyPolicy};

/// Async counterpart of [`super::Mailbox`] with the same semantics.
///
/// The queue lock is never held across an await point; waiting is done on
/// [`Notify`] with the waiter registered before the queue is inspected.
#[derive(Debug)]
pub struct AsyncMailbox {
    slots: Mutex<Slots>,
    not_empty: Notify,
    not_full: Notify,
    policy: ReplyPolicy,
}

impl AsyncMailbox {
    pub fn new(capacity: usize, policy: ReplyPolicy) -> Self {
        Self {
            slots: Mutex::new(Slots::new(capacity)),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            policy,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, ReplyPolicy::default())
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert one fragment, suspending while the mailbox is at capacity.
    pub async fn post(&self, fragment: impl Into<Fragment>) -> Result<(), MailboxError> {
        let mut fragment = fragment.into();
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let outcome = self.lock().push(fragment);
            match outcome {
                Push::Stored => {
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Push::Closed => return Err(MailboxError::Closed),
                Push::Full(returned) => fragment = returned,
            }
            notified.await;
        }
    }

    /// Insert from a plain thread (e.g. the listener's receive loop).
    ///
    /// Does not touch the tokio runtime; the thread only waits while the
    /// mailbox is full. Must not be called from inside an async task.
    pub fn post_blocking(&self, fragment: impl Into<Fragment>) -> Result<(), MailboxError> {
        futures::executor::block_on(self.post(fragment))
    }

    /// Remove the oldest fragment, suspending until one is available.
    pub async fn receive(&self) -> Result<Fragment, MailboxError> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let popped = self.lock().pop();
            match popped {
                Pop::Item(fragment) => {
                    self.not_full.notify_one();
                    return Ok(fragment);
                }
                Pop::Closed => return Err(MailboxError::Closed),
                Pop::Empty => {}
            }
            notified.await;
        }
    }

    pub fn try_receive(&self) -> Option<Fragment> {
        let popped = self.lock().pop();
        match popped {
            Pop::Item(fragment) => {
                self.not_full.notify_one();
                Some(fragment)
            }
            Pop::Empty | Pop::Closed => None,
        }
    }

    /// Drain fragments until the sentinel arrives, as a stream.
    ///
    /// The sentinel is swallowed. The stream ends after yielding an error and
    /// keeps returning `None` once ended.
    pub fn receive_all(&self) -> impl FusedStream<Item = Result<Fragment, MailboxError>> + '_ {
        futures::stream::unfold(false, move |finished| async move {
            if finished {
                return None;
            }
            match self.receive().await {
                Ok(fragment) => self
                    .policy
                    .admit(fragment)
                    .map(|fragment| (Ok(fragment), false)),
                Err(e) => Some((Err(e), true)),
            }
        })
        .fuse()
    }

    pub fn close(&self) {
        self.lock().close();
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    pub fn reopen(&self) {
        self.lock().reopen();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_closed()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn policy(&self) -> &ReplyPolicy {
        &self.policy
    }
}
