//! Rendering engine cache for secondary display presentations.
//!
//! Provides:
//! - `EngineRegistry` - Router-keyed engine cache with single construction
//! - Entrypoint building utilities
//! - In-memory engines (feature: memory)

pub mod entrypoint;
pub mod registry;

#[cfg(feature = "memory")]
pub mod memory;

pub use entrypoint::{EntrypointBuilder, EntrypointError};
pub use registry::{EngineHandle, EngineRegistry, RegistryError};

#[cfg(feature = "memory")]
pub use memory::{MemoryEngine, MemoryEngineFactory};
