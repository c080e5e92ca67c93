//! Metrics Module
//!
//! Node-local counters with a periodic report loop. Startup is two-phase
//! on the coordinator: the system is constructed during composition but
//! only starts reporting once an application id is supplied; workers start
//! immediately.

pub mod system;
