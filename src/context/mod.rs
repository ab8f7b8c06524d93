//! Execution contexts
//!
//! An execution context is an isolated script environment (a top-level page
//! or an embedded frame). It owns a global event target, may carry an injected
//! wallet provider, and can receive structured messages from other contexts.
//!
//! [`ExecutionContext`] is the seam; [`Window`] is the in-process
//! implementation used by the tracker, the tests and the demo command.

pub mod window;

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::provider::{Provider, ProviderDetail};

pub use window::Window;

/// Event name for cross-context messages
pub const MESSAGE_EVENT: &str = "message";

/// Target origin that matches any receiving context
pub const WILDCARD_ORIGIN: &str = "*";

/// Handle returned when a listener is installed
pub type ListenerId = u64;

/// Listener side of an event subscription
pub type EventSender = mpsc::UnboundedSender<ContextEvent>;

/// Event dispatched on a context's global target
#[derive(Debug, Clone)]
pub struct ContextEvent {
    pub name: String,
    pub payload: EventPayload,
}

impl ContextEvent {
    /// Event without payload (e.g. `requestProvider`)
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: EventPayload::Empty,
        }
    }

    /// Provider announcement
    pub fn announce(name: impl Into<String>, detail: ProviderDetail) -> Self {
        Self {
            name: name.into(),
            payload: EventPayload::Announce(detail),
        }
    }

    /// Cross-context message
    pub fn message(data: Value, origin: impl Into<String>) -> Self {
        Self {
            name: MESSAGE_EVENT.to_string(),
            payload: EventPayload::Message(MessageEvent {
                data,
                origin: origin.into(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    Empty,
    Announce(ProviderDetail),
    Message(MessageEvent),
}

/// Message delivered through the cross-context channel
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Structured payload as posted by the sender
    pub data: Value,
    /// Origin of the sending context
    pub origin: String,
}

/// An isolated script environment
pub trait ExecutionContext: Send + Sync {
    /// Origin string of this context (e.g. `https://dapp.example`)
    fn origin(&self) -> &str;

    /// Install a listener for `event`
    fn add_event_listener(&self, event: &str, listener: EventSender) -> ListenerId;

    /// Remove a listener; returns whether it was installed
    fn remove_event_listener(&self, event: &str, id: ListenerId) -> bool;

    /// Dispatch an event to every listener currently installed for its name
    fn dispatch_event(&self, event: ContextEvent);

    /// Legacy injected global provider (`window.ethereum`)
    fn injected_provider(&self) -> Option<Arc<dyn Provider>>;

    /// Enclosing context when this one is embedded
    fn parent(&self) -> Option<Arc<dyn ExecutionContext>>;

    /// Post structured data into this context.
    ///
    /// Delivery is silently skipped when `target_origin` is neither `*` nor
    /// this context's origin.
    fn post_message(&self, data: Value, target_origin: &str, source_origin: &str) -> Result<()>;
}

/// Scoped event listener, removed from its context on drop
pub struct ListenerGuard {
    context: Arc<dyn ExecutionContext>,
    event: String,
    id: ListenerId,
}

impl ListenerGuard {
    /// Install `listener` for `event` on `context`
    pub fn install(context: Arc<dyn ExecutionContext>, event: &str, listener: EventSender) -> Self {
        let id = context.add_event_listener(event, listener);
        Self {
            context,
            event: event.to_string(),
            id,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.context.remove_event_listener(&self.event, self.id);
    }
}
