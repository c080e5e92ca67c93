use anyhow::Result;
use std::collections::HashMap;

use crate::config::settings::EngineConfig;
use crate::error::RuntimeError;

type ConfigRoleCtor<T> = Box<dyn Fn(&EngineConfig, bool) -> Box<T> + Send + Sync>;
type ConfigCtor<T> = Box<dyn Fn(&EngineConfig) -> Box<T> + Send + Sync>;
type NoArgsCtor<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

/// The constructors one implementation has registered. An implementation
/// rarely provides more than one; resolution picks the richest available.
struct Registration<T: ?Sized> {
    with_config_and_role: Option<ConfigRoleCtor<T>>,
    with_config: Option<ConfigCtor<T>>,
    no_args: Option<NoArgsCtor<T>>,
}

impl<T: ?Sized> Registration<T> {
    fn empty() -> Self {
        Self {
            with_config_and_role: None,
            with_config: None,
            no_args: None,
        }
    }
}

/// Registry of selectable implementations for one component type `T`
/// (typically a trait object).
pub struct ComponentRegistry<T: ?Sized> {
    components: HashMap<String, Registration<T>>,
    aliases: HashMap<String, String>,
}

impl<T: ?Sized> ComponentRegistry<T> {
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn register_with_config_and_role<F>(&mut self, identifier: &str, ctor: F)
    where
        F: Fn(&EngineConfig, bool) -> Box<T> + Send + Sync + 'static,
    {
        self.entry(identifier).with_config_and_role = Some(Box::new(ctor));
    }

    pub fn register_with_config<F>(&mut self, identifier: &str, ctor: F)
    where
        F: Fn(&EngineConfig) -> Box<T> + Send + Sync + 'static,
    {
        self.entry(identifier).with_config = Some(Box::new(ctor));
    }

    pub fn register_no_args<F>(&mut self, identifier: &str, ctor: F)
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.entry(identifier).no_args = Some(Box::new(ctor));
    }

    /// Registers `alias` as another name for `full`. Aliases resolve before
    /// lookup, so `resolve("hash", ..)` and `resolve(full_id, ..)` build the
    /// same implementation.
    pub fn register_alias(&mut self, alias: &str, full: &str) {
        self.aliases.insert(alias.to_string(), full.to_string());
    }

    /// Maps an identifier through the alias table to its full form.
    pub fn canonical_identifier(&self, identifier: &str) -> String {
        self.aliases
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| identifier.to_string())
    }

    /// Resolves `identifier` to a fresh instance.
    ///
    /// Tries the constructor variants from richest to poorest and fails with
    /// a component-resolution error naming the identifier when the
    /// identifier is unknown or has no usable constructor.
    pub fn resolve(
        &self,
        identifier: &str,
        config: &EngineConfig,
        is_coordinator: bool,
    ) -> Result<Box<T>> {
        let canonical = self.canonical_identifier(identifier);

        let registration = self
            .components
            .get(&canonical)
            .ok_or_else(|| RuntimeError::ComponentResolution(identifier.to_string()))?;

        if let Some(ctor) = &registration.with_config_and_role {
            tracing::debug!("Resolved component {} (config + role)", canonical);
            return Ok(ctor(config, is_coordinator));
        }
        if let Some(ctor) = &registration.with_config {
            tracing::debug!("Resolved component {} (config)", canonical);
            return Ok(ctor(config));
        }
        if let Some(ctor) = &registration.no_args {
            tracing::debug!("Resolved component {} (no args)", canonical);
            return Ok(ctor());
        }

        Err(RuntimeError::ComponentResolution(identifier.to_string()).into())
    }

    /// Reads the identifier from `config` under `key` (falling back to
    /// `default` when absent), then resolves it.
    pub fn resolve_from_config(
        &self,
        config: &EngineConfig,
        key: &str,
        default: &str,
        is_coordinator: bool,
    ) -> Result<Box<T>> {
        let identifier = config.get_or(key, default);
        self.resolve(&identifier, config, is_coordinator)
    }

    fn entry(&mut self, identifier: &str) -> &mut Registration<T> {
        self.components
            .entry(identifier.to_string())
            .or_insert_with(Registration::empty)
    }
}

impl<T: ?Sized> Default for ComponentRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
