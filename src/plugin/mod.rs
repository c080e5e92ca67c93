//! Pluggable Component Module
//!
//! Lets operators substitute engine components (serializers, shuffle
//! strategies) through configuration, without recompiling call sites.
//!
//! ## Core Mechanisms
//! - **Static registration**: every selectable implementation is registered
//!   in a [`resolver::ComponentRegistry`] under its identifier at startup;
//!   there is no runtime reflection.
//! - **Constructor fallback**: resolution tries, in order, a
//!   `(config, is_coordinator)` constructor, a `(config)` constructor, and a
//!   no-argument constructor, using the first one the implementation
//!   registered.
//! - **Aliases**: short names (e.g. `hash`) can be registered as aliases for
//!   full identifiers.

pub mod resolver;
