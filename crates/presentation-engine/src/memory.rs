//! In-memory rendering engines.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use presentation_core::{
    BridgeEnvelope, EngineFactory, EngineLaunch, RenderEngine, RouterName, traits::EngineError,
};

/// Engine that records everything dispatched to it.
///
/// Useful for development, tests and headless hosts.
pub struct MemoryEngine {
    router: RouterName,
    launch: EngineLaunch,
    dispatched: RwLock<Vec<BridgeEnvelope>>,
    resumed: AtomicBool,
    destroyed: AtomicBool,
}

impl MemoryEngine {
    /// Launch description the engine was started with.
    #[must_use]
    pub const fn launch(&self) -> &EngineLaunch {
        &self.launch
    }

    /// Messages dispatched so far.
    #[must_use]
    pub fn dispatched(&self) -> Vec<BridgeEnvelope> {
        self.dispatched
            .read()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Whether `resume` has run.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.resumed.load(Ordering::SeqCst)
    }

    /// Whether `destroy` has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderEngine for MemoryEngine {
    fn router_name(&self) -> &RouterName {
        &self.router
    }

    async fn resume(&self) {
        self.resumed.store(true, Ordering::SeqCst);
    }

    async fn dispatch(&self, envelope: BridgeEnvelope) -> Result<(), EngineError> {
        if self.is_destroyed() {
            return Err(EngineError::Dispatch(format!(
                "engine '{}' is destroyed",
                self.router
            )));
        }
        tracing::debug!(router = %self.router, method = %envelope.method, "Engine received message");
        self.dispatched
            .write()
            .map_err(|e| EngineError::Dispatch(e.to_string()))?
            .push(envelope);
        Ok(())
    }

    async fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// Factory producing [`MemoryEngine`]s.
pub struct MemoryEngineFactory {
    engines: RwLock<HashMap<RouterName, Arc<MemoryEngine>>>,
    failing: RwLock<HashSet<String>>,
    created: AtomicUsize,
    delay: Option<Duration>,
}

impl MemoryEngineFactory {
    /// Create a new factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            created: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Sleep for `delay` inside every construction.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make construction fail for `router`.
    pub fn fail_router(&self, router: &str) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(router.to_string());
        }
    }

    /// Undo [`Self::fail_router`].
    pub fn heal_router(&self, router: &str) {
        if let Ok(mut failing) = self.failing.write() {
            failing.remove(router);
        }
    }

    /// Number of engines constructed so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Most recent engine constructed for `router`.
    #[must_use]
    pub fn engine(&self, router: &RouterName) -> Option<Arc<MemoryEngine>> {
        self.engines.read().ok()?.get(router).cloned()
    }
}

impl Default for MemoryEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineFactory for MemoryEngineFactory {
    async fn create(
        &self,
        router: &RouterName,
        launch: &EngineLaunch,
    ) -> Result<Arc<dyn RenderEngine>, EngineError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let fails = self
            .failing
            .read()
            .map_err(|e| EngineError::Init(e.to_string()))?
            .contains(router.as_str());
        if fails {
            return Err(EngineError::Init(format!("entrypoint '{}' crashed", launch.entrypoint)));
        }

        let engine = Arc::new(MemoryEngine {
            router: router.clone(),
            launch: launch.clone(),
            dispatched: RwLock::new(Vec::new()),
            resumed: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        });
        self.engines
            .write()
            .map_err(|e| EngineError::Init(e.to_string()))?
            .insert(router.clone(), Arc::clone(&engine));
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(engine)
    }
}
