//! Serialization Module
//!
//! Pluggable serializers for control-plane payloads (broadcast values, task
//! closures). The engine moves such payloads as `serde_json::Value` trees;
//! a serializer turns a tree into wire bytes and back.
//!
//! Two implementations ship by default and are selected through
//! configuration via the component registry:
//! - **`json`**: plain JSON text, readable on the wire.
//! - **`bincode`**: canonical JSON text framed with a bincode length prefix,
//!   for compact transfer.

pub mod impls;

use anyhow::Result;

use crate::config::keys;
use crate::plugin::resolver::ComponentRegistry;

/// Byte-level serializer for control-plane payloads.
pub trait Serializer: Send + Sync {
    /// Full identifier of this implementation.
    fn name(&self) -> &'static str;

    fn serialize(&self, value: &serde_json::Value) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<serde_json::Value>;
}

pub const JSON_SERIALIZER: &str = "serializer::JsonSerializer";
pub const BINCODE_SERIALIZER: &str = "serializer::BincodeSerializer";

/// Builds the registry of selectable serializers, with short aliases next
/// to the full identifiers.
pub fn registry() -> ComponentRegistry<dyn Serializer> {
    let mut registry: ComponentRegistry<dyn Serializer> = ComponentRegistry::new();

    registry.register_with_config(JSON_SERIALIZER, |config| {
        Box::new(impls::JsonSerializer {
            pretty: config.get_bool(keys::SERIALIZER_JSON_PRETTY, false),
        })
    });
    registry.register_no_args(BINCODE_SERIALIZER, || {
        Box::new(impls::BincodeSerializer)
    });

    registry.register_alias("json", JSON_SERIALIZER);
    registry.register_alias("bincode", BINCODE_SERIALIZER);

    registry
}

#[cfg(test)]
mod tests;
