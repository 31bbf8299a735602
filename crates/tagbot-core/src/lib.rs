//! Core domain + application logic for the tag bot.
//!
//! This crate is framework-agnostic. Telegram lives behind ports (traits)
//! implemented in the adapter crate.

pub mod access;
pub mod autosave;
pub mod bot;
pub mod config;
pub mod cooldown;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod ports;
pub mod registry;
pub mod snapshot;

pub use errors::{Error, Result};
