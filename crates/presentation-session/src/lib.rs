//! Session orchestration for secondary display presentations.
//!
//! Provides:
//! - `SessionManager` - Show/hide the single secondary surface
//! - `SecondarySurface` / `SessionEndpoint` - Surface method handling
//! - `DisplayWatcher` - Cancellable display hotplug stream
//! - Platform implementations (memory)

pub mod manager;
pub mod platform;
pub mod surface;
pub mod watcher;

pub use manager::{ManagerError, SessionManager};
pub use surface::{EndpointError, SecondarySurface, SessionEndpoint, SessionId, SessionInfo};
pub use watcher::{DisplaySubscription, DisplayWatcher, SubscriptionHandle};
