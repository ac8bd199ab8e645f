//! Shared domain model for the upwatch monitoring engine.
//!
//! Entities here are plain data: state transitions, evaluation and
//! aggregation live in `upwatch-engine`, persistence contracts in
//! `upwatch-store`. Everything carries string snowflake IDs from [`id`].

pub mod events;
pub mod id;
pub mod types;
