//! In-process execution context
//!
//! Mirrors the parts of a browser window the tracker relies on: a global
//! event target, the injected `ethereum` global, a parent link for frames,
//! and `postMessage` with target-origin filtering.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::debug;

use super::{
    ContextEvent, EventSender, ExecutionContext, ListenerId, WILDCARD_ORIGIN,
};
use crate::error::{Error, Result};
use crate::provider::Provider;

type ListenerTable = HashMap<String, Vec<(ListenerId, EventSender)>>;

/// A top-level page or an embedded frame
pub struct Window {
    origin: String,
    parent: Option<Arc<Window>>,
    listeners: Mutex<ListenerTable>,
    next_listener_id: AtomicU64,
    injected: RwLock<Option<Arc<dyn Provider>>>,
    closed: AtomicBool,
}

impl Window {
    /// Create a top-level context
    pub fn new(origin: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(origin.into(), None))
    }

    /// Create a frame embedded in `parent`
    pub fn new_frame(parent: &Arc<Window>, origin: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(origin.into(), Some(parent.clone())))
    }

    fn build(origin: String, parent: Option<Arc<Window>>) -> Self {
        Self {
            origin,
            parent,
            listeners: Mutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
            injected: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Origin of the outermost context in this frame tree
    pub fn top_origin(&self) -> &str {
        match &self.parent {
            Some(parent) => parent.top_origin(),
            None => &self.origin,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Install the legacy injected global, replacing any previous one
    pub fn set_injected_provider(&self, provider: Arc<dyn Provider>) {
        let mut slot = self.injected.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(provider);
    }

    /// Tear the context down: listeners are dropped and posts fail
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.lock_listeners().clear();
        debug!(origin = %self.origin, "Context closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of listeners installed for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock_listeners().get(event).map_or(0, Vec::len)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, ListenerTable> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ExecutionContext for Window {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn add_event_listener(&self, event: &str, listener: EventSender) -> ListenerId {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        if self.is_closed() {
            return id;
        }
        self.lock_listeners()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    fn remove_event_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut table = self.lock_listeners();
        let Some(list) = table.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(listener_id, _)| *listener_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            table.remove(event);
        }
        removed
    }

    fn dispatch_event(&self, event: ContextEvent) {
        let mut table = self.lock_listeners();
        if let Some(list) = table.get_mut(&event.name) {
            // Listeners whose receiver is gone are pruned
            list.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        }
    }

    fn injected_provider(&self) -> Option<Arc<dyn Provider>> {
        self.injected
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn parent(&self) -> Option<Arc<dyn ExecutionContext>> {
        self.parent
            .clone()
            .map(|parent| parent as Arc<dyn ExecutionContext>)
    }

    fn post_message(&self, data: Value, target_origin: &str, source_origin: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ContextClosed(self.origin.clone()));
        }

        if target_origin != WILDCARD_ORIGIN && target_origin != self.origin {
            debug!(
                target_origin = %target_origin,
                origin = %self.origin,
                "Message dropped: target origin mismatch"
            );
            return Ok(());
        }

        self.dispatch_event(ContextEvent::message(data, source_origin));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EventPayload, MESSAGE_EVENT};
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_dispatch_reaches_listeners_for_name_only() {
        let window = Window::new("https://top.example");
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        window.add_event_listener("a", tx_a);
        window.add_event_listener("b", tx_b);

        window.dispatch_event(ContextEvent::bare("a"));

        assert_eq!(rx_a.try_recv().unwrap().name, "a");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_post_message_origin_filtering() {
        let window = Window::new("https://top.example");
        let (tx, mut rx) = mpsc::unbounded_channel();
        window.add_event_listener(MESSAGE_EVENT, tx);

        window
            .post_message(json!({"n": 1}), "https://other.example", "https://frame.example")
            .unwrap();
        assert!(rx.try_recv().is_err());

        window
            .post_message(json!({"n": 2}), "*", "https://frame.example")
            .unwrap();
        let event = rx.try_recv().unwrap();
        match event.payload {
            EventPayload::Message(message) => {
                assert_eq!(message.data, json!({"n": 2}));
                assert_eq!(message.origin, "https://frame.example");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_window_rejects_posts() {
        let window = Window::new("https://top.example");
        window.close();
        let err = window.post_message(json!({}), "*", "https://frame.example");
        assert!(matches!(err, Err(Error::ContextClosed(_))));
    }

    #[test]
    fn test_frame_tree() {
        let top = Window::new("https://top.example");
        let frame = Window::new_frame(&top, "https://tracker.example");

        assert!(top.is_top_level());
        assert!(!frame.is_top_level());
        assert_eq!(frame.top_origin(), "https://top.example");
        assert_eq!(frame.parent().unwrap().origin(), "https://top.example");
        assert!(top.parent().is_none());
    }
}
