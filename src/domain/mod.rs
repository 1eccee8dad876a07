//! Core domain types for talkback

mod reply;
mod step;
mod target;

pub use reply::{DEFAULT_PARAGRAPH_BREAK, DEFAULT_SENTINEL, Fragment, ReplyPolicy};
pub use step::{DeliveryStep, PayloadMode};
pub use target::Target;
