//! Runtime Environment Module
//!
//! Bootstraps and owns every node-local service the execution layer depends
//! on. One process (coordinator or worker) runs exactly one live
//! [`environment::RuntimeEnv`], built by the role-aware composition root in
//! [`create`] and torn down in reverse dependency order by
//! [`environment::RuntimeEnv::stop`].
//!
//! ## Core Mechanisms
//! - **Role-aware composition**: one code path wires structurally different
//!   environments for the coordinator (authoritative services, file server)
//!   and workers (resolved remote endpoints).
//! - **Process-wide handle**: `set_env`/`get_env` expose a single mutable
//!   slot; every other subsystem reaches shared services through it.
//! - **Scratch state**: the worker process pool and the metadata cache are
//!   the only parts of the environment mutated during task execution.

pub mod create;
pub mod diagnostics;
pub mod environment;
pub mod events;
pub mod files;
pub mod metadata_cache;

#[cfg(test)]
mod tests;
