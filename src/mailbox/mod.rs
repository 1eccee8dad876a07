//! Bounded reply mailboxes.
//!
//! The listener thread is the only producer and the caller is the only
//! consumer. Two variants share one queue core ([`slots`]) and one
//! [`ReplyPolicy`](crate::domain::ReplyPolicy):
//!
//! - [`Mailbox`] blocks the calling thread (condition variables)
//! - [`AsyncMailbox`] suspends the calling task (`tokio::sync::Notify`)

mod blocking;
mod cooperative;
mod slots;

pub use blocking::{Mailbox, ReplyStream};
pub use cooperative::AsyncMailbox;

/// Default number of fragments a mailbox holds before producers wait.
pub const DEFAULT_CAPACITY: usize = 8;

/// Fault raised while posting to or draining a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    #[error("mailbox is closed")]
    Closed,
}
