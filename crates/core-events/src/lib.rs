//! Core notification types and delivery for the editing engine.
//!
//! The engine runs single-threaded and cooperative: notifications are
//! delivered synchronously, in emission order, to registered observers, and
//! additionally queued on an unbounded channel for host loops that prefer to
//! drain between tasks. Observers must not emit while being notified; the
//! session layer never emits while holding a document borrow, which keeps
//! delivery non-reentrant.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::atomic::AtomicU64;
use tracing::trace;

use core_doc::{AttachmentId, Range};

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Simple atomic counters (no locking, fetch_add relaxed). Inspectable in
// unit tests or periodically logged; a metrics integration can export them
// later without touching emission sites.
// -------------------------------------------------------------------------------------------------
pub static NOTIFICATIONS_EMITTED: AtomicU64 = AtomicU64::new(0);
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Notifications the engine publishes to UI wiring and other collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorNotification {
    /// The document reference changed. `revision` increments on every
    /// change, so renderers can skip no-op syncs.
    DocumentChange { revision: u64 },
    /// The authoritative selection moved.
    SelectionChange { range: Range },
    AttachmentAdd { id: AttachmentId },
    AttachmentEdit { id: AttachmentId },
    AttachmentRemove { id: AttachmentId },
    /// A coalesced render pass should run now.
    Render { revision: u64 },
    /// Paste is about to be applied; observers may inspect the payload.
    BeforePaste { payload: PastePayload },
    /// Paste was applied.
    Paste { payload: PastePayload },
}

/// What a paste carried after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum PastePayload {
    /// Plain string content.
    String(String),
    /// A pre-parsed document (the HTML import seam is external).
    Document(core_doc::Document),
}

impl PastePayload {
    pub fn len(&self) -> usize {
        match self {
            PastePayload::String(s) => s.chars().count(),
            PastePayload::Document(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Synchronous observer of editor notifications. Delivery order matches
/// registration order.
pub trait EditorObserver {
    fn notify(&mut self, notification: &EditorNotification);
}

/// Fan-out point for notifications: synchronous observers first, then the
/// channel drain.
#[derive(Default)]
pub struct NotificationBus {
    observers: Vec<Box<dyn EditorObserver>>,
    sender: Option<Sender<EditorNotification>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn EditorObserver>) {
        self.observers.push(observer);
    }

    /// Attach an unbounded drain channel, returning its receiver. At most
    /// one drain is attached; a second call replaces the first.
    pub fn attach_channel(&mut self) -> Receiver<EditorNotification> {
        let (tx, rx) = unbounded();
        self.sender = Some(tx);
        rx
    }

    pub fn emit(&mut self, notification: EditorNotification) {
        use std::sync::atomic::Ordering;
        NOTIFICATIONS_EMITTED.fetch_add(1, Ordering::Relaxed);
        trace!(
            target: "events.bus",
            observers = self.observers.len(),
            kind = notification_kind(&notification),
            "notification_emit"
        );
        for observer in &mut self.observers {
            observer.notify(&notification);
        }
        if let Some(sender) = &self.sender
            && sender.send(notification).is_err()
        {
            // Receiver dropped; stop queueing but keep observers working.
            CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
            self.sender = None;
        }
    }
}

fn notification_kind(notification: &EditorNotification) -> &'static str {
    match notification {
        EditorNotification::DocumentChange { .. } => "document_change",
        EditorNotification::SelectionChange { .. } => "selection_change",
        EditorNotification::AttachmentAdd { .. } => "attachment_add",
        EditorNotification::AttachmentEdit { .. } => "attachment_edit",
        EditorNotification::AttachmentRemove { .. } => "attachment_remove",
        EditorNotification::Render { .. } => "render",
        EditorNotification::BeforePaste { .. } => "before_paste",
        EditorNotification::Paste { .. } => "paste",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl EditorObserver for Recorder {
        fn notify(&mut self, notification: &EditorNotification) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.tag, notification_kind(notification)));
        }
    }

    #[test]
    fn observers_see_notifications_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = NotificationBus::new();
        bus.register(Box::new(Recorder {
            tag: "first",
            log: Arc::clone(&log),
        }));
        bus.register(Box::new(Recorder {
            tag: "second",
            log: Arc::clone(&log),
        }));
        bus.emit(EditorNotification::DocumentChange { revision: 1 });
        bus.emit(EditorNotification::Render { revision: 1 });
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[
                "first:document_change",
                "second:document_change",
                "first:render",
                "second:render"
            ]
        );
    }

    #[test]
    fn channel_drains_in_emission_order() {
        let mut bus = NotificationBus::new();
        let rx = bus.attach_channel();
        bus.emit(EditorNotification::DocumentChange { revision: 7 });
        bus.emit(EditorNotification::SelectionChange {
            range: Range::new(0, 2),
        });
        let drained: Vec<_> = rx.try_iter().collect();
        assert_eq!(drained.len(), 2);
        assert_eq!(
            drained[0],
            EditorNotification::DocumentChange { revision: 7 }
        );
    }

    #[test]
    fn dropped_receiver_does_not_break_observers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = NotificationBus::new();
        bus.register(Box::new(Recorder {
            tag: "only",
            log: Arc::clone(&log),
        }));
        let rx = bus.attach_channel();
        drop(rx);
        bus.emit(EditorNotification::Render { revision: 3 });
        bus.emit(EditorNotification::Render { revision: 4 });
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn paste_payload_lengths() {
        assert_eq!(PastePayload::String("héllo".into()).len(), 5);
        assert!(PastePayload::String(String::new()).is_empty());
    }
}
