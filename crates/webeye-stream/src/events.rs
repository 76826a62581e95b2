use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use webeye_core::EngineEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Fan-out of engine events to host subscribers. Handlers run on whichever
/// thread raised the event, often an engine thread.
#[derive(Default)]
pub struct EventHub {
    handlers: Mutex<Vec<(SubscriptionId, Handler)>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(handler)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Subscribes a channel; events arrive in the order they were raised.
    pub fn channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }

    pub fn emit(&self, event: EngineEvent) {
        // Handlers run outside the lock so they may (un)subscribe.
        let handlers: Vec<Handler> = self.lock().iter().map(|(_, h)| h.clone()).collect();
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Handler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub").field("subscribers", &self.subscriber_count()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn unsubscribed_handlers_stop_receiving() {
        let hub = EventHub::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let id = hub.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hub.emit(EngineEvent::Started);
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        hub.emit(EngineEvent::Stopped);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn handler_may_unsubscribe_itself() {
        let hub = Arc::new(EventHub::default());
        let slot = Arc::new(Mutex::new(None::<SubscriptionId>));
        let (hub2, slot2) = (hub.clone(), slot.clone());
        let id = hub.subscribe(move |_| {
            if let Some(id) = slot2.lock().unwrap().take() {
                hub2.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        hub.emit(EngineEvent::Started);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn channel_delivers_in_order() {
        let hub = EventHub::default();
        let (_, mut rx) = hub.channel();

        hub.emit(EngineEvent::Started);
        hub.emit(EngineEvent::Failed {
            message: Some("timeout".into()),
        });

        assert_eq!(rx.recv().await, Some(EngineEvent::Started));
        assert_eq!(
            rx.recv().await,
            Some(EngineEvent::Failed {
                message: Some("timeout".into())
            })
        );
    }
}
