//! Channel layers for the MQTT bridge.
//!
//! - `ChannelLayer` trait: send to a named channel, receive from a set of channels
//! - `MemoryLayer`: in-process queues with capacity and expiry
//! - `RedisLayer`: Redis lists, shared with a separate web process
//! - `LayerRegistry`: resolves `module:attribute.path` references to layers
//! - `MockLayer` for testing the bridge without a real layer

pub mod error;
pub mod layer;
pub mod memory;
pub mod mock;
pub mod redis_layer;
pub mod reference;
pub mod registry;

// Re-exports for convenience.
pub use error::{LayerError, LayerResult};
pub use layer::{ChannelLayer, LayerSettings, Message};
pub use memory::MemoryLayer;
pub use mock::MockLayer;
pub use redis_layer::RedisLayer;
pub use reference::LayerRef;
pub use registry::{LayerFactory, LayerRegistry, MEMORY_LAYER, REDIS_LAYER};
