//! Fatal error taxonomy for environment construction.
//!
//! Most fallible paths in this crate propagate plain `anyhow` errors. The
//! three failures below are the ones callers need to tell apart, so they get
//! concrete variants and ride inside `anyhow::Error` (recover them with
//! `downcast_ref`).

use thiserror::Error;

/// Failures that abort environment construction.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A required configuration key is absent. Raised before any service is
    /// constructed.
    #[error("missing required configuration key: {0}")]
    Configuration(String),

    /// No usable constructor exists for a configured component identifier.
    #[error("no usable constructor for component `{0}`")]
    ComponentResolution(String),

    /// A remote endpoint did not answer its presence check within the
    /// resolution timeout.
    #[error("endpoint `{name}` unavailable at {address}")]
    EndpointUnavailable { name: String, address: String },
}
