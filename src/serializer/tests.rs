#[cfg(test)]
mod tests {
    use crate::config::keys;
    use crate::config::settings::EngineConfig;
    use crate::serializer::{self, BINCODE_SERIALIZER, JSON_SERIALIZER};

    #[test]
    fn test_json_serializer_resolves_by_alias() {
        let registry = serializer::registry();
        let config = EngineConfig::new();

        let s = registry.resolve("json", &config, false).unwrap();

        assert_eq!(s.name(), JSON_SERIALIZER);
    }

    #[test]
    fn test_json_payload_roundtrip() {
        let registry = serializer::registry();
        let config = EngineConfig::new();
        let s = registry.resolve("json", &config, false).unwrap();

        let payload = serde_json::json!({"stage": 3, "partitions": [0, 1, 2]});
        let bytes = s.serialize(&payload).unwrap();

        assert_eq!(s.deserialize(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_bincode_payload_roundtrip() {
        let registry = serializer::registry();
        let config = EngineConfig::new();
        let s = registry.resolve("bincode", &config, false).unwrap();

        let payload = serde_json::json!({"block": "broadcast_7", "size": 4096});
        let bytes = s.serialize(&payload).unwrap();

        assert_eq!(s.name(), BINCODE_SERIALIZER);
        assert_eq!(s.deserialize(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_serializer_key_selects_implementation() {
        let registry = serializer::registry();
        let config = EngineConfig::new();
        config.set(keys::SERIALIZER, "bincode");

        let s = registry
            .resolve_from_config(&config, keys::SERIALIZER, keys::DEFAULT_SERIALIZER, true)
            .unwrap();

        assert_eq!(s.name(), BINCODE_SERIALIZER);
    }
}
