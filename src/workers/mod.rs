//! External Worker Process Pool Module
//!
//! Task threads lean on ephemeral helper processes (user-function runners)
//! that are expensive to spawn. The pool amortizes that cost by reusing
//! live processes, bounded per distinct (executable, environment)
//! configuration.
//!
//! ## Core Mechanisms
//! - **Keyed factories**: each (executable path, environment) pair gets one
//!   [`factory::WorkerFactory`] owning the idle processes for that key.
//! - **One lock for the map**: the key → factory map is the only structure
//!   here needing explicit mutual exclusion; factories synchronize their
//!   own idle sets, so distinct keys never serialize beyond the map lookup.
//! - **Ownership as cleanup**: a [`factory::WorkerHandle`] kills its child
//!   process when dropped, so a handle that cannot be returned anywhere is
//!   still reclaimed.

pub mod factory;
pub mod pool;
