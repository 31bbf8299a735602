//! Messenger-facing types: what the bot receives and what it sends back.

pub mod port;
pub mod types;
