//! Errors surfaced by the communicators.

use crate::delivery::{DeliveryFailure, FailureReason};
use crate::domain::Target;
use crate::mailbox::MailboxError;

/// A message could not be delivered to the target.
///
/// Nothing is left half-sent from the caller's point of view: no reply
/// stream is handed out for a failed post.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to post message to {target}: {failure}")]
pub struct PostError {
    pub target: Target,
    #[source]
    pub failure: DeliveryFailure,
}

impl PostError {
    pub fn new(target: Target, failure: DeliveryFailure) -> Self {
        Self { target, failure }
    }

    pub fn reason(&self) -> FailureReason {
        self.failure.reason()
    }

    pub fn message(&self) -> &str {
        self.failure.message()
    }

    pub fn is_retryable(&self) -> bool {
        self.failure.is_retryable()
    }
}

/// Draining the reply stream faulted.
///
/// Fragments yielded before the fault remain valid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reply stream interrupted: {source}")]
pub struct RecvError {
    #[from]
    pub source: MailboxError,
}
