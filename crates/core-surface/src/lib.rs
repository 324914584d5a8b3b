//! Surface-side coordinate mapping and selection authority.
//!
//! `SurfaceTree` models the editable surface the host renders into;
//! `LocationMapper` translates between native `(container, offset)` pairs
//! and document locations; `SelectionManager` owns the one true selection.

pub mod location_mapper;
pub mod selection;
pub mod tree;

pub use location_mapper::{LocationMapper, MappingError};
pub use selection::SelectionManager;
pub use tree::{NodeId, NodeKind, SurfaceNode, SurfaceTree};
