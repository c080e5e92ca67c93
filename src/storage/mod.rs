//! Block Storage Module
//!
//! Node-local block storage with cluster-wide read-through.
//!
//! ## Core Concepts
//! - **Directory**: the storage master (coordinator) records which node
//!   holds which block; every node talks to it through a client façade over
//!   the `storage-master` endpoint.
//! - **Transport**: block bytes move over one of two interchangeable wire
//!   implementations (messaging-runtime HTTP or raw framed TCP), selected
//!   by configuration.
//! - **Two-phase startup**: a `BlockManager` serves nothing until it has
//!   registered with the master via `initialize`.
//! - **Layers**: broadcast and get-or-compute caching sit on top of the
//!   block store rather than owning storage of their own.

pub mod block;
pub mod broadcast;
pub mod cache;
pub mod master;
pub mod protocol;
pub mod transport;
