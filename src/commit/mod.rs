//! Commit Arbitration Module
//!
//! Speculative execution can run duplicate attempts of the same output
//! partition. The arbitrator decides which attempt may finalize its output:
//! first to ask wins, everyone else is denied. The coordinator holds the
//! decision state behind the `commit-arbitrator` endpoint; workers ask
//! through the resolved endpoint.

pub mod arbitrator;
