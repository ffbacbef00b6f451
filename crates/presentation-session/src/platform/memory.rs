//! In-memory display platform.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use presentation_core::{
    DisplayDescriptor, DisplayId, DisplayListener, DisplayListenerHost, DisplayProvider,
    EngineFactory, ListenerId, PlatformContext, PresentedWindow, Presenter, RenderEngine,
    config::PRESENTATION_CATEGORY,
    traits::{DisplayError, ListenerError, SurfaceError},
};

type Windows = Arc<RwLock<HashMap<u64, DisplayId>>>;

/// In-memory platform simulating a display manager.
///
/// Useful for development, tests and headless hosts.
/// Displays are attached and detached by hand.
pub struct MemoryPlatform {
    displays: RwLock<BTreeMap<DisplayId, DisplayDescriptor>>,
    listeners: RwLock<HashMap<ListenerId, Arc<dyn DisplayListener>>>,
    windows: Windows,
    next_id: AtomicU64,
    presentation_category: String,
    fail_enumeration: AtomicBool,
}

impl MemoryPlatform {
    /// Create a platform with no displays.
    #[must_use]
    pub fn new() -> Self {
        Self::with_category(PRESENTATION_CATEGORY)
    }

    /// Create a platform recognising `category` as the presentation category.
    #[must_use]
    pub fn with_category(category: impl Into<String>) -> Self {
        Self {
            displays: RwLock::new(BTreeMap::new()),
            listeners: RwLock::new(HashMap::new()),
            windows: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            presentation_category: category.into(),
            fail_enumeration: AtomicBool::new(false),
        }
    }

    /// Build a context using this platform for every display concern.
    #[must_use]
    pub fn context(self: &Arc<Self>, engines: Arc<dyn EngineFactory>) -> PlatformContext {
        PlatformContext::new(self.clone(), self.clone(), self.clone(), engines)
    }

    /// Attach a display and notify listeners.
    pub fn attach(&self, display: DisplayDescriptor) {
        let id = display.display_id;
        if let Ok(mut displays) = self.displays.write() {
            displays.insert(id, display);
        }
        self.notify(|l| l.on_display_added(id));
    }

    /// Detach a display and notify listeners.
    pub fn detach(&self, id: DisplayId) {
        let removed = self
            .displays
            .write()
            .ok()
            .and_then(|mut displays| displays.remove(&id));
        if removed.is_some() {
            self.notify(|l| l.on_display_removed(id));
        }
    }

    /// Replace a display's properties and notify listeners.
    pub fn update(&self, display: DisplayDescriptor) {
        let id = display.display_id;
        if let Ok(mut displays) = self.displays.write() {
            displays.insert(id, display);
        }
        self.notify(|l| l.on_display_changed(id));
    }

    /// Make enumeration fail until reset.
    pub fn set_enumeration_failure(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().map_or(0, |l| l.len())
    }

    /// Displays with a window currently shown, sorted.
    #[must_use]
    pub fn visible_windows(&self) -> Vec<DisplayId> {
        let mut ids: Vec<DisplayId> = self
            .windows
            .read()
            .map(|w| w.values().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    // Dispatch holds the read lock so `unregister_listener` waits for
    // in-flight callbacks.
    fn notify(&self, f: impl Fn(&dyn DisplayListener)) {
        if let Ok(listeners) = self.listeners.read() {
            for listener in listeners.values() {
                f(listener.as_ref());
            }
        }
    }

    fn check_enumeration(&self) -> Result<(), DisplayError> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(DisplayError::Enumeration("display service not responding".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DisplayProvider for MemoryPlatform {
    async fn displays(&self, category: Option<&str>) -> Result<Vec<DisplayDescriptor>, DisplayError> {
        self.check_enumeration()?;
        let displays = self
            .displays
            .read()
            .map_err(|e| DisplayError::Enumeration(e.to_string()))?;

        Ok(displays
            .values()
            .filter(|d| match category {
                None => true,
                Some(c) if c == self.presentation_category => d.is_presentation(),
                Some(_) => false,
            })
            .cloned()
            .collect())
    }

    async fn display(&self, id: DisplayId) -> Result<Option<DisplayDescriptor>, DisplayError> {
        self.check_enumeration()?;
        Ok(self
            .displays
            .read()
            .map_err(|e| DisplayError::Enumeration(e.to_string()))?
            .get(&id)
            .cloned())
    }
}

impl DisplayListenerHost for MemoryPlatform {
    fn register_listener(&self, listener: Arc<dyn DisplayListener>) -> Result<ListenerId, ListenerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .write()
            .map_err(|e| ListenerError::Registration(e.to_string()))?
            .insert(id, listener);
        Ok(id)
    }

    fn unregister_listener(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.remove(&id);
        }
    }
}

/// Window shown by [`MemoryPlatform`].
pub struct MemoryWindow {
    key: u64,
    display_id: DisplayId,
    windows: Windows,
}

#[async_trait]
impl PresentedWindow for MemoryWindow {
    fn display_id(&self) -> DisplayId {
        self.display_id
    }

    async fn dismiss(&self) -> Result<(), SurfaceError> {
        self.windows
            .write()
            .map_err(|e| SurfaceError::Dismiss(e.to_string()))?
            .remove(&self.key);
        Ok(())
    }
}

#[async_trait]
impl Presenter for MemoryPlatform {
    async fn present(
        &self,
        display: &DisplayDescriptor,
        engine: Arc<dyn RenderEngine>,
    ) -> Result<Box<dyn PresentedWindow>, SurfaceError> {
        let attached = self
            .displays
            .read()
            .map_err(|e| SurfaceError::Construction(e.to_string()))?
            .contains_key(&display.display_id);
        if !attached {
            return Err(SurfaceError::Construction(format!(
                "display {} is not attached",
                display.display_id
            )));
        }

        let display_id = display.display_id;
        let key = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.windows
            .write()
            .map_err(|e| SurfaceError::Construction(e.to_string()))?
            .insert(key, display_id);
        tracing::debug!(display_id, router = %engine.router_name(), "Window presented");

        Ok(Box::new(MemoryWindow {
            key,
            display_id,
            windows: Arc::clone(&self.windows),
        }))
    }
}
