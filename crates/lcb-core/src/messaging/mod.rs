//! Cross-network messaging abstractions (console today; IRC-style networks later).

pub mod port;
pub mod throttled;
pub mod types;
