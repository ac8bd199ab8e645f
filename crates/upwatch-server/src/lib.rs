//! Process wiring for the upwatch monitoring engine: configuration, the
//! scheduler tasks, peer federation and the event broadcaster.
//!
//! The HTTP API surface lives outside this crate; it consumes [`state::AppState`]
//! and the check-in/pairing operations exposed there.

pub mod clients;
pub mod config;
pub mod events;
pub mod peer;
pub mod scheduler;
pub mod state;
