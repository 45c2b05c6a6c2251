//! Layer registry: resolves layer references to concrete layers.
//!
//! Modules are registered names; each holds dotted attribute paths bound to
//! a `LayerFactory`. Resolution walks the attribute path one segment at a
//! time so the error names the first segment that does not exist.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{LayerError, LayerResult};
use crate::layer::{ChannelLayer, LayerSettings};
use crate::memory::MemoryLayer;
use crate::redis_layer::RedisLayer;
use crate::reference::LayerRef;

/// Reference of the built-in in-process layer.
pub const MEMORY_LAYER: &str = "memory:channel_layer";

/// Reference of the built-in Redis layer.
pub const REDIS_LAYER: &str = "redis:channel_layer";

/// Builds a channel layer once a reference has been resolved.
#[async_trait]
pub trait LayerFactory: Send + Sync {
    async fn build(&self, settings: &LayerSettings) -> LayerResult<Arc<dyn ChannelLayer>>;
}

struct MemoryFactory;

#[async_trait]
impl LayerFactory for MemoryFactory {
    async fn build(&self, settings: &LayerSettings) -> LayerResult<Arc<dyn ChannelLayer>> {
        Ok(Arc::new(MemoryLayer::new(settings)))
    }
}

struct RedisFactory;

#[async_trait]
impl LayerFactory for RedisFactory {
    async fn build(&self, settings: &LayerSettings) -> LayerResult<Arc<dyn ChannelLayer>> {
        Ok(Arc::new(RedisLayer::connect(settings).await?))
    }
}

/// Hands out an already-built layer.
struct Instance(Arc<dyn ChannelLayer>);

#[async_trait]
impl LayerFactory for Instance {
    async fn build(&self, _settings: &LayerSettings) -> LayerResult<Arc<dyn ChannelLayer>> {
        Ok(self.0.clone())
    }
}

type Module = BTreeMap<String, Arc<dyn LayerFactory>>;

/// Registry of resolvable channel layers.
#[derive(Default)]
pub struct LayerRegistry {
    modules: BTreeMap<String, Module>,
}

impl LayerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in memory and Redis layers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert("memory", "channel_layer", Arc::new(MemoryFactory));
        registry.insert("redis", "channel_layer", Arc::new(RedisFactory));
        registry
    }

    /// Bind `reference` to a factory, replacing any previous binding.
    pub fn register(
        &mut self,
        reference: &str,
        factory: impl LayerFactory + 'static,
    ) -> LayerResult<()> {
        let reference: LayerRef = reference.parse()?;
        self.insert(
            reference.module(),
            &reference.attribute_path(),
            Arc::new(factory),
        );
        Ok(())
    }

    /// Bind `reference` to an existing layer instance.
    pub fn register_instance(
        &mut self,
        reference: &str,
        layer: Arc<dyn ChannelLayer>,
    ) -> LayerResult<()> {
        self.register(reference, Instance(layer))
    }

    /// All registered references, sorted.
    pub fn references(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|(module, attrs)| attrs.keys().map(move |attr| format!("{module}:{attr}")))
            .collect()
    }

    /// Find the factory bound to `reference`.
    pub fn lookup(&self, reference: &LayerRef) -> LayerResult<Arc<dyn LayerFactory>> {
        let module = self.modules.get(reference.module()).ok_or_else(|| {
            LayerError::Resolution(format!(
                "module '{}' not found (registered: {})",
                reference.module(),
                self.module_names().join(", ")
            ))
        })?;

        let segments = reference.segments();
        for depth in 1..=segments.len() {
            let prefix = segments[..depth].join(".");
            let nested = format!("{prefix}.");
            let walkable = module
                .keys()
                .any(|attr| *attr == prefix || attr.starts_with(&nested));
            if !walkable {
                return Err(LayerError::Resolution(format!(
                    "module '{}' has no attribute '{prefix}'",
                    reference.module()
                )));
            }
        }

        module
            .get(&reference.attribute_path())
            .cloned()
            .ok_or_else(|| LayerError::Resolution(format!("'{reference}' is not a channel layer")))
    }

    /// Resolve `reference` and build the layer it names.
    pub async fn resolve(
        &self,
        reference: &LayerRef,
        settings: &LayerSettings,
    ) -> LayerResult<Arc<dyn ChannelLayer>> {
        let factory = self.lookup(reference)?;
        let layer = factory.build(settings).await?;
        tracing::debug!(reference = %reference, "channel layer resolved");
        Ok(layer)
    }

    fn insert(&mut self, module: &str, attribute: &str, factory: Arc<dyn LayerFactory>) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(attribute.to_string(), factory);
    }

    fn module_names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }
}
