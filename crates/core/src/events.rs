//! Notifications sent to renderer subscribers.

use crate::config::RenderMode;
use crate::request::RenderResult;
use async_channel::{Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Something observable happened on a [`PageRenderer`](crate::PageRenderer).
#[derive(Debug, Clone)]
pub enum RendererEvent {
    /// A request finished rendering. Sent exactly once per admitted request
    /// that rendered successfully.
    PageRendered(RenderResult),
    /// A different document (or none) was set.
    DocumentChanged,
    /// The render mode was switched.
    RenderModeChanged(RenderMode),
}

impl RendererEvent {
    /// The render result, if this is a `PageRendered` event.
    pub fn into_page(self) -> Option<RenderResult> {
        match self {
            RendererEvent::PageRendered(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_page(&self) -> Option<&RenderResult> {
        match self {
            RendererEvent::PageRendered(result) => Some(result),
            _ => None,
        }
    }
}

/// Fan-out of events to every live subscriber.
///
/// Each subscriber owns an unbounded channel so that publishing never blocks
/// the render pump. Subscribers whose receiver was dropped are pruned on the
/// next publish.
#[derive(Debug, Default)]
pub(crate) struct EventHub {
    subscribers: Mutex<Vec<Sender<RendererEvent>>>,
}

impl EventHub {
    pub(crate) fn subscribe(&self) -> Receiver<RendererEvent> {
        let (tx, rx) = async_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub(crate) fn publish(&self, event: RendererEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.try_send(event.clone()).is_ok());
        if subscribers.is_empty() {
            debug!("No subscribers left for renderer events");
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_each_event() {
        let hub = EventHub::default();
        let first = hub.subscribe();
        let second = hub.subscribe();

        hub.publish(RendererEvent::DocumentChanged);

        assert!(matches!(first.try_recv(), Ok(RendererEvent::DocumentChanged)));
        assert!(matches!(second.try_recv(), Ok(RendererEvent::DocumentChanged)));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let hub = EventHub::default();
        let kept = hub.subscribe();
        let dropped = hub.subscribe();
        drop(dropped);
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(RendererEvent::RenderModeChanged(RenderMode::MultiThreaded));

        assert_eq!(hub.subscriber_count(), 1);
        assert!(matches!(
            kept.try_recv(),
            Ok(RendererEvent::RenderModeChanged(RenderMode::MultiThreaded))
        ));
    }

    #[test]
    fn test_non_page_events_have_no_result() {
        assert!(RendererEvent::DocumentChanged.into_page().is_none());
        assert!(RendererEvent::RenderModeChanged(RenderMode::SingleThreaded)
            .as_page()
            .is_none());
    }
}
