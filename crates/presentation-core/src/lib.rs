//! Core abstractions for secondary display presentations.
//!
//! This crate provides the fundamental building blocks:
//! - `DisplayDescriptor` / `DisplayEvent` - Display snapshots and hotplug signals
//! - `BridgeEnvelope` / `MethodResponse` - Uniform method-call payloads
//! - `PlatformContext` - Explicit context replacing process-wide globals
//! - `PresentationConfig` - Tunables loaded from JSON
//! - Display, engine and presenter traits

pub mod config;
pub mod context;
pub mod display;
pub mod envelope;
pub mod traits;

pub use config::{PresentationConfig, ReplacePolicy};
pub use context::PlatformContext;
pub use display::{DisplayDescriptor, DisplayEvent, DisplayId, Rotation, RouterName};
pub use envelope::{BridgeEnvelope, Channel, MethodError, MethodResponse};
pub use traits::{
    DisplayListener, DisplayListenerHost, DisplayProvider, EngineFactory, EngineLaunch,
    ListenerId, PresentedWindow, Presenter, RenderEngine,
};
