//! Attachment lifecycle tracking.
//!
//! The composition diffs the attachment set on every document swap; this
//! manager records which attachments entered or left, releases transient
//! preview resources on removal, and buffers lifecycle events for the
//! notification layer to drain.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use core_doc::{Attachment, AttachmentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentEvent {
    Added(AttachmentId),
    Removed(AttachmentId),
}

#[derive(Default)]
pub struct AttachmentManager {
    attachments: BTreeMap<AttachmentId, Arc<Attachment>>,
    pending_events: Vec<AttachmentEvent>,
}

impl AttachmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: AttachmentId) -> Option<&Arc<Attachment>> {
        self.attachments.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = AttachmentId> + '_ {
        self.attachments.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    /// Reconcile with the attachments present in the current document.
    /// Newly seen attachments are tracked; departed ones are released.
    pub fn sync(&mut self, current: impl IntoIterator<Item = Arc<Attachment>>) {
        let mut next = BTreeMap::new();
        for attachment in current {
            next.insert(attachment.id(), attachment);
        }
        for id in next.keys() {
            if !self.attachments.contains_key(id) {
                debug!(target: "session.attachments", id = id.0, "attachment_added");
                self.pending_events.push(AttachmentEvent::Added(*id));
            }
        }
        for (id, attachment) in &self.attachments {
            if !next.contains_key(id) {
                debug!(target: "session.attachments", id = id.0, "attachment_removed");
                attachment.release();
                self.pending_events.push(AttachmentEvent::Removed(*id));
            }
        }
        self.attachments = next;
    }

    /// Buffered lifecycle events in occurrence order.
    pub fn drain_events(&mut self) -> Vec<AttachmentEvent> {
        std::mem::take(&mut self.pending_events)
    }
}
