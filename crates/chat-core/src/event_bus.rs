//! Listener registry for conversation changes.
//!
//! The bus is single-threaded (WASM constraint) and uses interior mutability
//! via RefCell. Listeners are invoked synchronously, in subscription order,
//! after the conversation has released its own state.

use std::cell::RefCell;
use std::rc::Rc;

use chat_types::event::ConversationChange;

pub type Listener = Rc<dyn Fn(&ConversationChange)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u32);

/// Shared event bus — clone-cheap via Rc.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<Registry>>,
}

#[derive(Default)]
struct Registry {
    next_id: u32,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&ConversationChange) + 'static) -> SubscriptionId {
        let mut registry = self.inner.borrow_mut();
        registry.next_id = registry.next_id.wrapping_add(1);
        let id = SubscriptionId(registry.next_id);
        registry.listeners.push((id, Rc::new(listener)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.inner.borrow_mut();
        let before = registry.listeners.len();
        registry.listeners.retain(|(sid, _)| *sid != id);
        registry.listeners.len() != before
    }

    /// Deliver a change to every current listener.
    pub fn emit(&self, change: &ConversationChange) {
        // Snapshot so listeners may (un)subscribe from inside the callback.
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(change);
        }
    }

    pub fn emit_all(&self, changes: Vec<ConversationChange>) {
        for change in &changes {
            self.emit(change);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}
