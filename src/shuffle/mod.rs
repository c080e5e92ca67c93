//! Shuffle Module
//!
//! Node-local shuffle services: output location tracking, the pluggable
//! shuffle strategy, and shuffle memory accounting. The data-redistribution
//! algorithms themselves live with the execution layer; this module provides
//! the services they are wired to.
//!
//! ## Core Concepts
//! - **Location tracking**: the coordinator holds the authoritative
//!   shuffle → partition → block-server map behind a named endpoint;
//!   workers are read-through clients of the same endpoint.
//! - **Strategy selection**: the shuffle manager is resolved through the
//!   component registry, with `hash`/`sort` as short aliases for the full
//!   identifiers.
//! - **Memory accounting**: per-task byte budgeting against a configured
//!   ceiling, released when the task finishes.

pub mod manager;
pub mod memory;
pub mod protocol;
pub mod tracker;

#[cfg(test)]
mod tests;
