//! Request/reply orchestration.
//!
//! A communicator turns "send one message, then read a variable number of
//! reply fragments up to the sentinel" into a single call:
//!
//! ```text
//! caller ─ send ─> DeliveryAgent ─> target ─> sink ─ UDP ─> DatagramListener
//!    ^                                                           │
//!    └──────────── receive (drain to sentinel) <─ Mailbox <─ post┘
//! ```
//!
//! [`Communicator`] works with plain threads, [`AsyncCommunicator`] with
//! tokio tasks. One conversation at a time; concurrent `send` calls on the
//! same communicator are not supported.

mod async_communicator;
mod communicator;
mod error;
mod inbox;

pub use async_communicator::{AsyncCommunicator, AsyncCommunicatorScope};
pub use communicator::{Communicator, CommunicatorScope};
pub use error::{PostError, RecvError};
pub use inbox::{AsyncMailboxObserver, MailboxObserver};
