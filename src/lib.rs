//! talkback - converse with a process that only answers out of band
//!
//! Outgoing messages are typed into the target by an external delivery
//! program. The target writes its reply back fragment by fragment as UDP
//! datagrams and finishes with a sentinel fragment. talkback turns this into
//! one call: send a message, get back a lazy sequence of reply fragments.
//!
//! ## Building blocks
//!
//! - [`mailbox`]: bounded FIFO of fragments, drained up to the sentinel
//! - [`listener`]: background UDP receive loop with observers
//! - [`delivery`]: the outbound side channel and its failure reasons
//! - [`comm`]: [`Communicator`] and [`AsyncCommunicator`] tying them together
//! - [`sink`]: the emitting side used by whatever writes the reply

pub mod comm;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod listener;
pub mod mailbox;
pub mod sink;

pub use comm::{AsyncCommunicator, Communicator, PostError, RecvError};
pub use config::Config;
pub use domain::*;
