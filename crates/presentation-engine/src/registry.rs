//! Process-lifetime cache of rendering engines keyed by router name.

use std::{collections::HashMap, fmt, ops::Deref, sync::Arc};

use presentation_core::{EngineFactory, RenderEngine, RouterName, traits::EngineError};
use tokio::sync::{Mutex, OnceCell};

use crate::entrypoint::{EntrypointBuilder, EntrypointError};

/// Registry error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Engine init failed for router '{router}': {source}")]
    EngineInit {
        router: RouterName,
        #[source]
        source: EngineError,
    },
    #[error("Invalid entrypoint: {0}")]
    Entrypoint(#[from] EntrypointError),
    #[error("Engine not found: {0}")]
    NotFound(RouterName),
}

/// Shared reference to a cached engine.
#[derive(Clone)]
pub struct EngineHandle(Arc<dyn RenderEngine>);

impl EngineHandle {
    /// Whether two handles refer to the same engine instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Clone out the underlying engine.
    #[must_use]
    pub fn engine(&self) -> Arc<dyn RenderEngine> {
        Arc::clone(&self.0)
    }
}

impl Deref for EngineHandle {
    type Target = dyn RenderEngine;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EngineHandle")
            .field(&self.0.router_name().as_str())
            .finish()
    }
}

type Slot = Arc<OnceCell<EngineHandle>>;

/// Engine cache.
///
/// Entries are created on first `acquire` and live until `release`.
/// Concurrent first acquires of one router share a single construction.
pub struct EngineRegistry {
    factory: Arc<dyn EngineFactory>,
    entrypoint: EntrypointBuilder,
    engines: Mutex<HashMap<RouterName, Slot>>,
}

impl EngineRegistry {
    /// Create a registry using the default entrypoint.
    #[must_use]
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self::with_entrypoint(factory, EntrypointBuilder::default())
    }

    /// Create a registry with a custom entrypoint builder.
    #[must_use]
    pub fn with_entrypoint(factory: Arc<dyn EngineFactory>, entrypoint: EntrypointBuilder) -> Self {
        Self {
            factory,
            entrypoint,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached engine for `router`, constructing it on a miss.
    ///
    /// # Errors
    /// Returns error if construction fails. Nothing is cached in that case.
    pub async fn acquire(&self, router: &RouterName) -> Result<EngineHandle, RegistryError> {
        let slot = Arc::clone(self.engines.lock().await.entry(router.clone()).or_default());

        let result = slot
            .get_or_try_init(|| async {
                let launch = self.entrypoint.build(router)?;
                tracing::info!(
                    %router,
                    entrypoint = %launch.entrypoint,
                    "Starting rendering engine"
                );
                let engine = self
                    .factory
                    .create(router, &launch)
                    .await
                    .map_err(|source| RegistryError::EngineInit {
                        router: router.clone(),
                        source,
                    })?;
                engine.resume().await;
                Ok::<_, RegistryError>(EngineHandle(engine))
            })
            .await
            .cloned();

        // A failed slot stays uninitialized; the next acquire retries it in place.
        if let Err(e) = &result {
            tracing::warn!(%router, "Engine acquisition failed: {e}");
        }
        result
    }

    /// Return the cached engine for `router` without constructing one.
    ///
    /// # Errors
    /// Returns [`RegistryError::NotFound`] if no engine is cached.
    pub async fn lookup(&self, router: &RouterName) -> Result<EngineHandle, RegistryError> {
        self.engines
            .lock()
            .await
            .get(router)
            .and_then(|slot| slot.get().cloned())
            .ok_or_else(|| RegistryError::NotFound(router.clone()))
    }

    /// Remove and destroy the engine cached for `router`.
    ///
    /// Returns the removed handle, if there was one.
    pub async fn release(&self, router: &RouterName) -> Option<EngineHandle> {
        let slot = self.engines.lock().await.remove(router)?;
        let handle = slot.get().cloned()?;
        tracing::info!(%router, "Releasing rendering engine");
        handle.destroy().await;
        Some(handle)
    }

    /// Router names with a constructed engine.
    pub async fn routers(&self) -> Vec<RouterName> {
        let mut routers: Vec<RouterName> = self
            .engines
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(router, _)| router.clone())
            .collect();
        routers.sort();
        routers
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::memory::MemoryEngineFactory;

    fn router(name: &str) -> RouterName {
        RouterName::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_acquire_is_idempotent() {
        let factory = Arc::new(MemoryEngineFactory::new());
        let registry = EngineRegistry::new(factory.clone());

        let first = assert_ok!(registry.acquire(&router("secondary")).await);
        let second = assert_ok!(registry.acquire(&router("secondary")).await);

        assert!(first.ptr_eq(&second));
        assert_eq!(factory.created(), 1);
        assert!(factory.engine(&router("secondary")).unwrap().is_resumed());
    }

    #[tokio::test]
    async fn test_concurrent_acquire_constructs_once() {
        let factory = Arc::new(MemoryEngineFactory::new().with_delay(Duration::from_millis(20)));
        let registry = Arc::new(EngineRegistry::new(factory.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.acquire(&router("race")).await })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }

        assert_eq!(factory.created(), 1);
        assert!(handles.windows(2).all(|w| w[0].ptr_eq(&w[1])));
    }

    #[tokio::test]
    async fn test_init_failure_is_not_cached() {
        let factory = Arc::new(MemoryEngineFactory::new());
        factory.fail_router("broken");
        let registry = EngineRegistry::new(factory.clone());

        let err = assert_err!(registry.acquire(&router("broken")).await);
        assert!(matches!(err, RegistryError::EngineInit { .. }));
        assert!(matches!(
            registry.lookup(&router("broken")).await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(registry.routers().await.is_empty());

        factory.heal_router("broken");
        assert_ok!(registry.acquire(&router("broken")).await);
    }

    #[tokio::test]
    async fn test_waiter_retry_after_failed_init_keeps_single_engine() {
        let factory = Arc::new(MemoryEngineFactory::new().with_delay(Duration::from_millis(50)));
        factory.fail_router("r");
        let registry = Arc::new(EngineRegistry::new(factory.clone()));

        let first = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire(&router("r")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire(&router("r")).await })
        };

        // The second acquire is now retrying construction on the shared slot.
        assert_err!(first.await.unwrap());
        factory.heal_router("r");
        let second = assert_ok!(second.await.unwrap());

        let found = assert_ok!(registry.lookup(&router("r")).await);
        assert!(found.ptr_eq(&second));
        let third = assert_ok!(registry.acquire(&router("r")).await);
        assert!(third.ptr_eq(&second));
        assert_eq!(factory.created(), 1);
        assert_eq!(registry.routers().await, vec![router("r")]);
    }

    #[tokio::test]
    async fn test_lookup_and_release() {
        let factory = Arc::new(MemoryEngineFactory::new());
        let registry = EngineRegistry::new(factory.clone());

        assert_err!(registry.lookup(&router("a")).await);
        let handle = assert_ok!(registry.acquire(&router("a")).await);
        let found = assert_ok!(registry.lookup(&router("a")).await);
        assert!(handle.ptr_eq(&found));

        let released = registry.release(&router("a")).await.unwrap();
        assert!(released.ptr_eq(&handle));
        assert!(factory.engine(&router("a")).unwrap().is_destroyed());
        assert!(registry.release(&router("a")).await.is_none());

        let fresh = assert_ok!(registry.acquire(&router("a")).await);
        assert!(!fresh.ptr_eq(&handle));
        assert_eq!(factory.created(), 2);
    }
}
