//! Bidirectional mapping between document locations and native surface
//! coordinates (container node + offset).
//!
//! Three marker species shape the walk: block-start markers delimit blocks,
//! cursor targets count for zero width but are preferred landing sites at
//! object boundaries, and object subtrees contribute exactly one position
//! with their internals skipped entirely.

use thiserror::Error;
use tracing::trace;

use core_doc::Location;

use crate::tree::{NodeId, NodeKind, SurfaceTree};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("container node {0} not found in the surface tree")]
    ContainerNotFound(NodeId),
    #[error("block index {0} out of range")]
    BlockOutOfRange(usize),
}

pub struct LocationMapper<'a> {
    tree: &'a SurfaceTree,
}

impl<'a> LocationMapper<'a> {
    pub fn new(tree: &'a SurfaceTree) -> Self {
        Self { tree }
    }

    /// Map a native `(container, offset)` pair to a document location.
    /// For text containers the offset counts codepoints; for element
    /// containers it is a child index, as in host selection APIs.
    pub fn find_location_from_container_and_offset(
        &self,
        container: NodeId,
        native_offset: usize,
    ) -> Result<Location, MappingError> {
        if self.tree.node(container).is_none() {
            return Err(MappingError::ContainerNotFound(container));
        }
        let mut walk = LocationWalk {
            tree: self.tree,
            container,
            native_offset,
            index: 0,
            seen_block: false,
            offset: 0,
            result: None,
        };
        walk.visit(self.tree.root());
        let location = walk
            .result
            .unwrap_or(Location::new(walk.index, walk.offset));
        trace!(
            target: "surface.mapper",
            container,
            native_offset,
            index = location.index,
            offset = location.offset,
            "native_to_location"
        );
        Ok(location)
    }

    /// Map a document location back to a native `(container, offset)` pair,
    /// preferring cursor targets at object boundaries so that zero-length
    /// insertion points beside embedded objects stay reachable.
    pub fn find_container_and_offset_from_location(
        &self,
        location: Location,
    ) -> Result<(NodeId, usize), MappingError> {
        let nodes = self.significant_nodes_for_index(location.index)?;
        let mut remaining = location.offset;
        let mut candidate: Option<(NodeId, usize)> = None;
        let mut block_element: Option<NodeId> = None;

        for id in nodes {
            match self.tree.kind(id) {
                Some(NodeKind::Element { .. }) => {
                    block_element.get_or_insert(id);
                }
                Some(NodeKind::CursorTarget) => {
                    if remaining == 0 {
                        return Ok((id, 0));
                    }
                }
                Some(NodeKind::Text { content, .. }) => {
                    let len = content.chars().count();
                    if remaining < len {
                        return Ok((id, remaining));
                    }
                    candidate = Some((id, len));
                    if remaining == len {
                        // Keep walking: a cursor target right after this
                        // run is the better landing site.
                        remaining = 0;
                        continue;
                    }
                    remaining -= len;
                }
                Some(NodeKind::ObjectRoot { .. }) => {
                    if remaining == 0 {
                        // Before the object with no cursor target seen:
                        // fall back to the last text run or the element.
                        break;
                    }
                    remaining -= 1;
                }
                _ => {}
            }
        }

        candidate
            .or_else(|| block_element.map(|id| (id, self.tree.children(id).len())))
            .ok_or(MappingError::BlockOutOfRange(location.index))
    }

    /// Native coordinates straight to a flat document position, through the
    /// document's authoritative converter.
    pub fn position_from_container_and_offset(
        &self,
        document: &core_doc::Document,
        container: NodeId,
        native_offset: usize,
    ) -> Result<core_doc::Position, MappingError> {
        let location = self.find_location_from_container_and_offset(container, native_offset)?;
        Ok(document.position_from_location(location))
    }

    /// Nodes belonging to the block at `index`, in document order: the
    /// content between its block-start marker and the next one. Object
    /// subtrees appear only as their root.
    fn significant_nodes_for_index(&self, index: usize) -> Result<Vec<NodeId>, MappingError> {
        let mut blocks_seen = 0usize;
        let mut inside = false;
        let mut element: Option<NodeId> = None;
        let mut out = Vec::new();
        for id in self.tree.walk() {
            match self.tree.kind(id) {
                Some(NodeKind::BlockStart { .. }) => {
                    if inside {
                        break;
                    }
                    if blocks_seen == index {
                        inside = true;
                        if let Some(el) = element {
                            out.push(el);
                        }
                    }
                    blocks_seen += 1;
                }
                Some(NodeKind::Element { .. }) => {
                    element = Some(id);
                    if inside {
                        out.push(id);
                    }
                }
                _ => {
                    if inside {
                        out.push(id);
                    }
                }
            }
        }
        if inside {
            Ok(out)
        } else {
            Err(MappingError::BlockOutOfRange(index))
        }
    }
}

struct LocationWalk<'t> {
    tree: &'t SurfaceTree,
    container: NodeId,
    native_offset: usize,
    index: usize,
    seen_block: bool,
    offset: usize,
    result: Option<Location>,
}

impl LocationWalk<'_> {
    fn visit(&mut self, id: NodeId) {
        if self.result.is_some() {
            return;
        }
        match self.tree.kind(id) {
            Some(NodeKind::BlockStart { .. }) => {
                if self.seen_block {
                    self.index += 1;
                }
                self.seen_block = true;
                self.offset = 0;
            }
            Some(NodeKind::Text { content, .. }) => {
                let len = content.chars().count();
                if id == self.container {
                    self.result = Some(Location::new(
                        self.index,
                        self.offset + self.native_offset.min(len),
                    ));
                    return;
                }
                self.offset += len;
            }
            Some(NodeKind::CursorTarget) => {
                if id == self.container {
                    self.result = Some(Location::new(self.index, self.offset));
                }
            }
            Some(NodeKind::ObjectRoot { .. }) => {
                // The object's internal tree has no position meaning: any
                // container inside it maps to the object's own position.
                if self.tree.is_within(id, self.container) {
                    self.result = Some(Location::new(self.index, self.offset));
                    return;
                }
                self.offset += 1;
                return;
            }
            Some(NodeKind::Element { .. }) => {
                if id == self.container {
                    let children = self.tree.children(id).to_vec();
                    for child in children.into_iter().take(self.native_offset) {
                        self.visit(child);
                        if self.result.is_some() {
                            return;
                        }
                    }
                    self.result = Some(Location::new(self.index, self.offset));
                    return;
                }
            }
            None => return,
        }
        let children: Vec<NodeId> = self.tree.children(id).to_vec();
        for child in children {
            self.visit(child);
            if self.result.is_some() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_doc::{AttrMap, Attachment, Block, Document, Piece, Range, Text};
    use std::sync::Arc;

    fn mapper_fixture(document: &Document) -> SurfaceTree {
        SurfaceTree::from_document(document)
    }

    fn text_nodes(tree: &SurfaceTree) -> Vec<NodeId> {
        tree.walk()
            .into_iter()
            .filter(|id| matches!(tree.kind(*id), Some(NodeKind::Text { .. })))
            .collect()
    }

    #[test]
    fn text_container_maps_to_location() {
        let document = Document::from_string("hello", AttrMap::new())
            .insert_block_break_at_range(Range::collapsed(3));
        let tree = mapper_fixture(&document);
        let mapper = LocationMapper::new(&tree);
        let texts = text_nodes(&tree);
        assert_eq!(
            mapper
                .find_location_from_container_and_offset(texts[0], 2)
                .unwrap(),
            Location::new(0, 2)
        );
        assert_eq!(
            mapper
                .find_location_from_container_and_offset(texts[1], 1)
                .unwrap(),
            Location::new(1, 1)
        );
    }

    #[test]
    fn location_round_trips_through_native_coordinates() {
        let document = Document::from_string("hello", AttrMap::new())
            .add_attribute_at_range("bold", true, Range::new(1, 3))
            .insert_block_break_at_range(Range::collapsed(4));
        let tree = mapper_fixture(&document);
        let mapper = LocationMapper::new(&tree);
        for index in 0..document.block_count() {
            for offset in 0..document.blocks()[index].content_len() {
                let location = Location::new(index, offset);
                let (container, native) = mapper
                    .find_container_and_offset_from_location(location)
                    .unwrap();
                let back = mapper
                    .find_location_from_container_and_offset(container, native)
                    .unwrap();
                assert_eq!(back, location, "at {index}:{offset}");
            }
        }
    }

    #[test]
    fn object_internals_map_to_object_position() {
        let attachment = Arc::new(Attachment::new(
            AttrMap::new().with("filename", "cat.png"),
        ));
        let text = Text::from_pieces(vec![
            Piece::string("ab"),
            Piece::attachment(attachment),
            Piece::string("cd"),
        ]);
        let document = Document::from_blocks(vec![Block::new(text, Vec::new())]);
        let tree = mapper_fixture(&document);
        let mapper = LocationMapper::new(&tree);

        let object = tree
            .walk()
            .into_iter()
            .find(|id| matches!(tree.kind(*id), Some(NodeKind::ObjectRoot { .. })))
            .unwrap();
        let internal = tree.children(object)[0];
        assert_eq!(
            mapper
                .find_location_from_container_and_offset(internal, 3)
                .unwrap(),
            Location::new(0, 2)
        );
    }

    #[test]
    fn boundaries_beside_objects_land_in_cursor_targets() {
        let attachment = Arc::new(Attachment::new(AttrMap::new()));
        let text = Text::from_pieces(vec![
            Piece::string("ab"),
            Piece::attachment(attachment),
            Piece::string("cd"),
        ]);
        let document = Document::from_blocks(vec![Block::new(text, Vec::new())]);
        let tree = mapper_fixture(&document);
        let mapper = LocationMapper::new(&tree);

        // Offset 2 is the boundary before the object, offset 3 right after:
        // both must resolve to cursor targets, not the object internals.
        for offset in [2usize, 3] {
            let (container, native) = mapper
                .find_container_and_offset_from_location(Location::new(0, offset))
                .unwrap();
            assert!(
                matches!(tree.kind(container), Some(NodeKind::CursorTarget)),
                "offset {offset} landed in {:?}",
                tree.kind(container)
            );
            assert_eq!(native, 0);
            let back = mapper
                .find_location_from_container_and_offset(container, native)
                .unwrap();
            assert_eq!(back, Location::new(0, offset));
        }
    }

    #[test]
    fn native_coordinates_resolve_to_flat_positions() {
        let document = Document::from_string("hello", AttrMap::new())
            .insert_block_break_at_range(Range::collapsed(3));
        let tree = mapper_fixture(&document);
        let mapper = LocationMapper::new(&tree);
        let texts = text_nodes(&tree);
        // Block 1 starts at position 4 (after "hel" and its sentinel).
        assert_eq!(
            mapper
                .position_from_container_and_offset(&document, texts[1], 1)
                .unwrap(),
            5
        );
    }

    #[test]
    fn unknown_container_is_an_error() {
        let document = Document::from_string("x", AttrMap::new());
        let tree = mapper_fixture(&document);
        let mapper = LocationMapper::new(&tree);
        assert_eq!(
            mapper.find_location_from_container_and_offset(9999, 0),
            Err(MappingError::ContainerNotFound(9999))
        );
    }

    #[test]
    fn out_of_range_block_is_an_error() {
        let document = Document::from_string("x", AttrMap::new());
        let tree = mapper_fixture(&document);
        let mapper = LocationMapper::new(&tree);
        assert!(matches!(
            mapper.find_container_and_offset_from_location(Location::new(5, 0)),
            Err(MappingError::BlockOutOfRange(5))
        ));
    }

    #[test]
    fn element_container_offsets_count_children() {
        let document = Document::from_string("hello", AttrMap::new());
        let tree = mapper_fixture(&document);
        let mapper = LocationMapper::new(&tree);
        let block_element = tree.children(tree.root())[0];
        // Child 0 is the block-start marker, child 1 the text run: an
        // element offset past both sits at the end of the text.
        let location = mapper
            .find_location_from_container_and_offset(block_element, 2)
            .unwrap();
        assert_eq!(location, Location::new(0, 5));
    }
}
