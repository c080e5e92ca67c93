//! Engine Configuration Module
//!
//! Process-shared configuration for a single node. Every subsystem reads its
//! settings from one [`settings::EngineConfig`] handle; a few values (the
//! bound RPC port, the file server address) are written back after startup so
//! that later components and remote peers can discover them.
//!
//! ## Core Concepts
//! - **Keys**: All well-known keys live in [`keys`] as constants, next to
//!   their defaults.
//! - **Sharing**: The map is cheaply clonable; clones observe each other's
//!   writes.
//! - **Required keys**: `require()` turns an absent key into a fatal
//!   configuration error instead of a fallback.

pub mod keys;
pub mod settings;
