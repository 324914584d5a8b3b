//! Identity-bearing embedded objects (images, files, generic content).
//!
//! An attachment's identity is a monotonic id; its attributes (url, filesize,
//! dimensions, caption, upload progress) are mutable and live outside the
//! persistent document structure. Document pieces and the attachment manager
//! share one `Arc<Attachment>` per object, so attribute edits are visible
//! everywhere without producing a new document.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

use crate::attrs::{AttrMap, AttrValue};

/// Attribute keys understood by attachment consumers.
pub mod keys {
    pub const URL: &str = "url";
    pub const PREVIEW_URL: &str = "preview_url";
    pub const FILENAME: &str = "filename";
    pub const FILESIZE: &str = "filesize";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const CAPTION: &str = "caption";
    pub const PROGRESS: &str = "progress";
}

static NEXT_ATTACHMENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttachmentId(pub u64);

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct Attachment {
    id: AttachmentId,
    attrs: Mutex<AttrMap>,
}

impl Attachment {
    pub fn new(attrs: AttrMap) -> Self {
        let id = AttachmentId(NEXT_ATTACHMENT_ID.fetch_add(1, Ordering::Relaxed));
        trace!(target: "doc.attachment", id = id.0, attrs = attrs.len(), "attachment_created");
        Self {
            id,
            attrs: Mutex::new(attrs),
        }
    }

    /// Reconstruct with a known id (snapshot load). Bumps the id counter past
    /// `id` so later fresh attachments never collide.
    pub fn with_id(id: AttachmentId, attrs: AttrMap) -> Self {
        NEXT_ATTACHMENT_ID.fetch_max(id.0 + 1, Ordering::Relaxed);
        Self {
            id,
            attrs: Mutex::new(attrs),
        }
    }

    pub fn id(&self) -> AttachmentId {
        self.id
    }

    fn attrs(&self) -> MutexGuard<'_, AttrMap> {
        self.attrs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn attributes(&self) -> AttrMap {
        self.attrs().clone()
    }

    pub fn attribute(&self, key: &str) -> Option<AttrValue> {
        self.attrs().get(key).cloned()
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attrs().insert(key, value);
    }

    pub fn merge_attributes(&self, attrs: &AttrMap) {
        let mut guard = self.attrs();
        *guard = guard.merged(attrs);
    }

    pub fn url(&self) -> Option<String> {
        self.attribute(keys::URL)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn upload_progress(&self) -> Option<f64> {
        self.attribute(keys::PROGRESS).and_then(|v| v.as_float())
    }

    pub fn set_upload_progress(&self, progress: f64) {
        self.set_attribute(keys::PROGRESS, progress.clamp(0.0, 100.0));
    }

    /// An attachment is pending while it has a preview but no final url.
    pub fn is_pending(&self) -> bool {
        self.url().is_none()
    }

    /// Revoke any transient preview resource. Called by the manager when the
    /// attachment leaves the document.
    pub fn release(&self) {
        let mut guard = self.attrs();
        if guard.contains_key(keys::PREVIEW_URL) {
            *guard = guard.without(keys::PREVIEW_URL);
            trace!(target: "doc.attachment", id = self.id.0, "preview_released");
        }
    }
}

impl Clone for Attachment {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            attrs: Mutex::new(self.attributes()),
        }
    }
}

impl PartialEq for Attachment {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Attachment {}

impl Serialize for Attachment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Attachment", 2)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("attributes", &self.attributes())?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Attachment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttachmentVisitor;

        impl<'de> Visitor<'de> for AttachmentVisitor {
            type Value = Attachment;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an attachment with id and attributes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Attachment, A::Error> {
                let mut id: Option<AttachmentId> = None;
                let mut attrs: Option<AttrMap> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "id" => id = Some(map.next_value()?),
                        "attributes" => attrs = Some(map.next_value()?),
                        _ => {
                            let _: de::IgnoredAny = map.next_value()?;
                        }
                    }
                }
                let id = id.ok_or_else(|| de::Error::missing_field("id"))?;
                Ok(Attachment::with_id(id, attrs.unwrap_or_default()))
            }
        }

        deserializer.deserialize_struct("Attachment", &["id", "attributes"], AttachmentVisitor)
    }
}
