//! Typed publish/subscribe channel between the engine and the adapter.
//!
//! The engine reports results by "printing" lines from whatever thread it
//! runs inference on. The [`EventBus`] fans those emissions out to the
//! handlers registered for the event's [`EventKind`].
//!
//! # Delivery rules
//!
//! - Synchronous: handlers run on the emitting thread, inside [`EventBus::emit`].
//! - Ordered: handlers for one kind run in subscription order.
//! - Unbuffered: a handler subscribed after an emission never sees it.
//! - A handler unsubscribed while an emission is being dispatched is skipped
//!   if it has not run yet.
//!
//! Every [`EngineEvent`] carries the id of the engine call that produced it,
//! so a subscriber can ignore late output from an abandoned call.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The channels an engine can print on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A cue line (`[start --> end] text`).
    Transcribe,
    /// Any other stdout line (model info, system info).
    SystemInfo,
    /// A stderr line that does not end the call.
    Diagnostic,
    /// The engine finished the call.
    Completed,
    /// The engine gave up on the call.
    TranscribeError,
}

/// One emission from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    /// Id of the engine call this event belongs to.
    pub call: u64,
    pub kind: EventKind,
    pub payload: String,
}

impl EngineEvent {
    pub fn new(call: u64, kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            call,
            kind,
            payload: payload.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

type Handler = dyn Fn(&EngineEvent) + Send + Sync;

struct Listener {
    id: u64,
    kind: EventKind,
    active: Arc<AtomicBool>,
    handler: Arc<Handler>,
}

#[derive(Default)]
struct BusInner {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: u64) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.retain(|l| l.id != id);
    }
}

/// Multi-subscriber event channel. Cheap to clone; clones share listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    ///
    /// The returned [`Subscription`] removes the handler when it is dropped
    /// or when [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        let mut listeners = self.inner.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.push(Listener {
            id,
            kind,
            active: Arc::clone(&active),
            handler: Arc::new(handler),
        });

        Subscription {
            id,
            active,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current handler for its kind.
    ///
    /// The listener list is snapshotted before dispatch so handlers may
    /// subscribe or unsubscribe without deadlocking.
    pub fn emit(&self, event: &EngineEvent) {
        let targets: Vec<(Arc<AtomicBool>, Arc<Handler>)> = {
            let listeners = self.inner.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners
                .iter()
                .filter(|l| l.kind == event.kind)
                .map(|l| (Arc::clone(&l.active), Arc::clone(&l.handler)))
                .collect()
        };

        for (active, handler) in targets {
            if active.load(Ordering::Acquire) {
                handler(event);
            }
        }
    }

    /// Number of registered handlers across all kinds.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle returned by [`EventBus::on`]; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    bus: std::sync::Weak<BusInner>,
}

impl Subscription {
    /// Remove the handler now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    fn detach(&self) {
        self.active.store(false, Ordering::Release);
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
