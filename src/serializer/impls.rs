use anyhow::Result;

use super::{BINCODE_SERIALIZER, JSON_SERIALIZER, Serializer};

/// Plain JSON text serializer.
pub struct JsonSerializer {
    pub pretty: bool,
}

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        JSON_SERIALIZER
    }

    fn serialize(&self, value: &serde_json::Value) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact serializer: canonical JSON text framed with a bincode length
/// prefix. The frame survives concatenated streams, which the raw JSON
/// form does not.
pub struct BincodeSerializer;

impl Serializer for BincodeSerializer {
    fn name(&self) -> &'static str {
        BINCODE_SERIALIZER
    }

    fn serialize(&self, value: &serde_json::Value) -> Result<Vec<u8>> {
        let text = serde_json::to_string(value)?;
        Ok(bincode::serialize(&text)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<serde_json::Value> {
        let text: String = bincode::deserialize(bytes)?;
        Ok(serde_json::from_str(&text)?)
    }
}
