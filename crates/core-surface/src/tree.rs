//! Arena-backed model of the editable surface tree.
//!
//! This stands in for the host's contenteditable tree: element containers,
//! character data, plus the three marker species the coordinate mapper must
//! honor. A comment-like block-start marker opens every block (and carries
//! the block's attribute names, the way the host serializes them onto the
//! marker), zero-width cursor targets flank embedded objects so carets can
//! land beside them, and an object root's entire subtree has no document
//! position meaning.
//!
//! The canonical builder (`SurfaceTree::from_document`) produces the shape
//! the render layer is expected to maintain; the parser
//! (`SurfaceTree::parse_document`) is the reparse path the input controller
//! falls back to when an observed mutation cannot be reconciled.

use std::sync::Arc;

use core_doc::{AttrMap, Attachment, Block, Document, Piece, Text};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Element container (block wrapper or inline formatting span).
    Element { tag: String },
    /// Character data; the mapper counts its codepoints.
    Text { content: String, attributes: AttrMap },
    /// Comment-like marker at a block's start carrying block attributes.
    BlockStart { attributes: Vec<String> },
    /// Zero-width placeholder enabling caret placement beside an object.
    CursorTarget,
    /// Root of an embedded-object subtree. Internal nodes are skipped
    /// wholesale when walking.
    ObjectRoot { attachment: Arc<Attachment> },
}

#[derive(Debug, Clone)]
pub struct SurfaceNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceTree {
    nodes: Vec<SurfaceNode>,
}

impl SurfaceTree {
    pub fn new() -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.nodes.push(SurfaceNode {
            kind: NodeKind::Element {
                tag: "editor".to_string(),
            },
            parent: None,
            children: Vec::new(),
        });
        tree
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> Option<&SurfaceNode> {
        self.nodes.get(id)
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id).map(|n| &n.kind)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn append_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(SurfaceNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when `ancestor` is `id` or one of its ancestors.
    pub fn is_within(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.nodes.get(id).and_then(|n| n.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Nodes in document order. Object subtrees are entered only so far as
    /// their root; callers that must skip them check the kind.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            if !matches!(self.kind(id), Some(NodeKind::ObjectRoot { .. })) {
                for child in self.children(id).iter().rev() {
                    stack.push(*child);
                }
            }
        }
        out
    }

    /// Build the canonical surface shape for a document: one block element
    /// per block, opened by a block-start marker, text runs as text nodes,
    /// attachments as object subtrees flanked by cursor targets.
    pub fn from_document(document: &Document) -> Self {
        let mut tree = Self::new();
        let root = tree.root();
        for block in document.blocks() {
            let element = tree.append_child(
                root,
                NodeKind::Element {
                    tag: "block".to_string(),
                },
            );
            tree.append_child(
                element,
                NodeKind::BlockStart {
                    attributes: block.attributes().to_vec(),
                },
            );
            for piece in block.text().pieces() {
                if piece.is_block_break() {
                    continue;
                }
                match piece.as_attachment() {
                    Some(attachment) => {
                        tree.append_child(element, NodeKind::CursorTarget);
                        let object = tree.append_child(
                            element,
                            NodeKind::ObjectRoot {
                                attachment: Arc::clone(attachment),
                            },
                        );
                        // Internal object structure: present, position-less.
                        tree.append_child(
                            object,
                            NodeKind::Text {
                                content: attachment
                                    .attribute(core_doc::attachment::keys::FILENAME)
                                    .and_then(|v| v.as_str().map(str::to_string))
                                    .unwrap_or_default(),
                                attributes: AttrMap::new(),
                            },
                        );
                        tree.append_child(element, NodeKind::CursorTarget);
                    }
                    None => {
                        tree.append_child(
                            element,
                            NodeKind::Text {
                                content: piece.to_display_string(),
                                attributes: piece.attributes().clone(),
                            },
                        );
                    }
                }
            }
        }
        tree
    }

    /// Reparse the surface into a fresh document. This is the safety
    /// fallback for unreconcilable mutations: it trusts only the tree.
    pub fn parse_document(&self) -> Document {
        let mut blocks: Vec<Block> = Vec::new();
        let mut current_attrs: Vec<String> = Vec::new();
        let mut current_pieces: Vec<Piece> = Vec::new();
        let mut seen_marker = false;

        for id in self.walk() {
            match self.kind(id) {
                Some(NodeKind::BlockStart { attributes }) => {
                    if seen_marker {
                        blocks.push(Block::new(
                            Text::from_pieces(std::mem::take(&mut current_pieces)),
                            std::mem::take(&mut current_attrs),
                        ));
                    }
                    seen_marker = true;
                    current_attrs = attributes.clone();
                }
                Some(NodeKind::Text { content, attributes }) => {
                    if !content.is_empty() {
                        current_pieces
                            .push(Piece::string_with_attributes(content, attributes.clone()));
                    }
                }
                Some(NodeKind::ObjectRoot { attachment }) => {
                    current_pieces.push(Piece::attachment(Arc::clone(attachment)));
                }
                _ => {}
            }
        }
        if seen_marker || !current_pieces.is_empty() {
            blocks.push(Block::new(Text::from_pieces(current_pieces), current_attrs));
        }
        Document::from_blocks(blocks)
    }
}
