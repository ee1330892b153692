//! Core domain + application logic for the link catcher bot.
//!
//! This crate is framework-agnostic. The chat network, the HTTP client and the
//! link store live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod detect;
pub mod domain;
pub mod enrich;
pub mod errors;
pub mod fetch;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod registry;

pub use errors::{Error, Result};

#[cfg(test)]
pub(crate) mod testing;
