//! Display hotplug watcher.

use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use futures::Stream;
use presentation_core::{
    DisplayEvent, DisplayId, DisplayListener, DisplayListenerHost, ListenerId,
    traits::ListenerError,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Listener installed on the platform hook.
///
/// Callbacks run on the platform's notification context; they only
/// enqueue, handing events to whichever task polls the subscription.
struct Forwarder {
    tx: Mutex<Option<mpsc::UnboundedSender<DisplayEvent>>>,
}

impl Forwarder {
    fn forward(&self, event: DisplayEvent) {
        let Ok(tx) = self.tx.lock() else {
            return;
        };
        if let Some(tx) = tx.as_ref() {
            if tx.send(event).is_err() {
                tracing::trace!(?event, "Display event dropped, subscriber gone");
            }
        }
    }

    fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}

impl DisplayListener for Forwarder {
    fn on_display_added(&self, id: DisplayId) {
        self.forward(DisplayEvent::Attached { display_id: id });
    }

    fn on_display_removed(&self, id: DisplayId) {
        self.forward(DisplayEvent::Detached { display_id: id });
    }
}

struct Registration {
    id: Mutex<Option<ListenerId>>,
    forwarder: Arc<Forwarder>,
    host: Arc<dyn DisplayListenerHost>,
}

impl Registration {
    fn cancel(&self) {
        let id = self.id.lock().ok().and_then(|mut id| id.take());
        if let Some(id) = id {
            self.forwarder.close();
            self.host.unregister_listener(id);
            tracing::debug!(listener = id, "Display listener unregistered");
        }
    }

    fn is_cancelled(&self) -> bool {
        self.id.lock().map_or(true, |id| id.is_none())
    }
}

/// Cloneable handle that cancels a [`DisplaySubscription`].
#[derive(Clone)]
pub struct SubscriptionHandle(Arc<Registration>);

impl SubscriptionHandle {
    /// Deregister the platform listener.
    ///
    /// Once this returns, the subscription yields no further events.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Whether the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Stream of display events for one subscriber.
///
/// Dropping the subscription cancels it.
pub struct DisplaySubscription {
    events: UnboundedReceiverStream<DisplayEvent>,
    registration: Arc<Registration>,
}

impl DisplaySubscription {
    /// Deregister the platform listener.
    pub fn cancel(&self) {
        self.registration.cancel();
    }

    /// Handle for cancelling from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle(Arc::clone(&self.registration))
    }

    /// Receive the next event; `None` once cancelled.
    pub async fn recv(&mut self) -> Option<DisplayEvent> {
        futures::StreamExt::next(self).await
    }
}

impl Stream for DisplaySubscription {
    type Item = DisplayEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.registration.is_cancelled() {
            return Poll::Ready(None);
        }
        Pin::new(&mut this.events).poll_next(cx)
    }
}

impl Drop for DisplaySubscription {
    fn drop(&mut self) {
        self.registration.cancel();
    }
}

/// Republishes platform display hotplug callbacks as [`DisplayEvent`]s.
///
/// Supports one subscriber at a time; subscribing again cancels the
/// previous subscription. Events are delivered in notification order and
/// never replayed.
pub struct DisplayWatcher {
    host: Arc<dyn DisplayListenerHost>,
    current: Mutex<Option<Arc<Registration>>>,
}

impl DisplayWatcher {
    /// Create a watcher over a platform hook.
    #[must_use]
    pub fn new(host: Arc<dyn DisplayListenerHost>) -> Self {
        Self {
            host,
            current: Mutex::new(None),
        }
    }

    /// Install a listener and return its event stream.
    ///
    /// # Errors
    /// Returns error if the platform rejects the listener.
    pub fn subscribe(&self) -> Result<DisplaySubscription, ListenerError> {
        // Held across cancel and register so concurrent subscribers serialize.
        let mut current = self
            .current
            .lock()
            .map_err(|e| ListenerError::Registration(e.to_string()))?;
        if let Some(previous) = current.take() {
            previous.cancel();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = Arc::new(Forwarder {
            tx: Mutex::new(Some(tx)),
        });
        let id = self.host.register_listener(forwarder.clone())?;
        tracing::debug!(listener = id, "Display listener registered");

        let registration = Arc::new(Registration {
            id: Mutex::new(Some(id)),
            forwarder,
            host: Arc::clone(&self.host),
        });
        *current = Some(Arc::clone(&registration));

        Ok(DisplaySubscription {
            events: UnboundedReceiverStream::new(rx),
            registration,
        })
    }

    /// Cancel the current subscription, if any.
    pub fn cancel(&self) {
        let previous = self.current.lock().ok().and_then(|mut c| c.take());
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}
