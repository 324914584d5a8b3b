//! Persistent rich-text document model.
//!
//! Leaf to root: `SplittableList` (generic position-addressed container),
//! `Piece`/`Text` (atomic content runs and their composition), `Block` and
//! `Document` (block-structured content with structural invariants), plus
//! `Attachment` for embedded objects. Every edit produces a new value that
//! shares unmodified substructure through `Arc`; nothing here mutates in
//! place except `Attachment` attributes, which are shared by identity.

pub mod attachment;
pub mod attrs;
pub mod block;
pub mod document;
pub mod piece;
pub mod range;
pub mod split_list;
pub mod text;

pub use attachment::{Attachment, AttachmentId};
pub use attrs::{AttrMap, AttrValue};
pub use block::Block;
pub use document::Document;
pub use piece::{ATTACHMENT_CHARACTER, BLOCK_BREAK, Piece, PieceContent};
pub use range::{Location, Position, Range};
pub use split_list::{Splittable, SplittableList};
pub use text::Text;
