//! CLI command implementations

pub mod chat;
pub mod init;
pub mod listen;
pub mod sink;
