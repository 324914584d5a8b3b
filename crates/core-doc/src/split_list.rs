//! Generic ordered container of splittable, consolidatable elements
//! addressed by cumulative length.
//!
//! Every range operation is implemented the same way: split the straddled
//! elements at both range endpoints, then slice or replace on exact index
//! boundaries. That single trick makes the operations boundary-safe no
//! matter where inside an element a range falls. All operations are pure
//! and return a new list; unchanged lists share storage through `Arc`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::range::{Position, Range};

/// An element that can report its length, split itself, and merge with a
/// compatible neighbor.
pub trait Splittable: Clone {
    fn len(&self) -> usize;

    /// Split into left/right halves. Only called with `0 < offset < len`;
    /// boundary offsets are handled by the list as no-op splits.
    fn split_at_offset(&self, offset: usize) -> (Self, Self);

    fn can_consolidate_with(&self, other: &Self) -> bool;

    /// Merge with the right-hand neighbor. Only called when
    /// `can_consolidate_with` returned true.
    fn consolidate_with(&self, other: &Self) -> Self;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct SplittableList<T> {
    objects: Arc<Vec<T>>,
}

impl<T> Default for SplittableList<T> {
    fn default() -> Self {
        Self {
            objects: Arc::new(Vec::new()),
        }
    }
}

impl<T: Splittable> SplittableList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_objects(objects: Vec<T>) -> Self {
        Self {
            objects: Arc::new(objects),
        }
    }

    pub fn objects(&self) -> &[T] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Total cumulative length across all elements.
    pub fn len(&self) -> usize {
        self.objects.iter().map(T::len).sum()
    }

    pub fn object_at_index(&self, index: usize) -> Option<&T> {
        self.objects.get(index)
    }

    /// Element index plus offset within that element for a position, or
    /// `None` past the end of the list.
    pub fn index_and_offset_at_position(&self, position: Position) -> Option<(usize, usize)> {
        let mut cursor = 0;
        for (index, object) in self.objects.iter().enumerate() {
            let next = cursor + object.len();
            if position < next {
                return Some((index, position - cursor));
            }
            cursor = next;
        }
        None
    }

    pub fn object_at_position(&self, position: Position) -> Option<&T> {
        let (index, _) = self.index_and_offset_at_position(position)?;
        self.objects.get(index)
    }

    /// Split the element straddling `position` into two halves. Splitting at
    /// an element boundary (including position 0 and the list's total
    /// length) returns the list unchanged.
    pub fn split_at_position(&self, position: Position) -> Self {
        let (list, _) = self.split_boundary(position);
        list
    }

    /// Split at `position` and report the element index the boundary now
    /// falls on. A past-the-end position maps to `object_count()`.
    fn split_boundary(&self, position: Position) -> (Self, usize) {
        match self.index_and_offset_at_position(position) {
            None => (self.clone(), self.objects.len()),
            Some((index, 0)) => (self.clone(), index),
            Some((index, offset)) => {
                let (left, right) = self.objects[index].split_at_offset(offset);
                let mut objects = Vec::with_capacity(self.objects.len() + 1);
                objects.extend_from_slice(&self.objects[..index]);
                objects.push(left);
                objects.push(right);
                objects.extend_from_slice(&self.objects[index + 1..]);
                (Self::from_objects(objects), index + 1)
            }
        }
    }

    pub fn insert_list_at_position(&self, list: &Self, position: Position) -> Self {
        let (split, index) = self.split_boundary(position);
        let mut objects = Vec::with_capacity(split.objects.len() + list.objects.len());
        objects.extend_from_slice(&split.objects[..index]);
        objects.extend_from_slice(&list.objects);
        objects.extend_from_slice(&split.objects[index..]);
        Self::from_objects(objects)
    }

    pub fn remove_range(&self, range: Range) -> Self {
        if range.is_collapsed() {
            return self.clone();
        }
        let (split, start_index) = self.split_boundary(range.start);
        let (split, end_index) = split.split_boundary(range.end);
        let mut objects = Vec::with_capacity(split.objects.len() - (end_index - start_index));
        objects.extend_from_slice(&split.objects[..start_index]);
        objects.extend_from_slice(&split.objects[end_index..]);
        Self::from_objects(objects)
    }

    /// Replace every element fully inside `range` (after boundary splits)
    /// with its image under `transform`.
    pub fn transform_range(&self, range: Range, mut transform: impl FnMut(&T) -> T) -> Self {
        if range.is_collapsed() {
            return self.clone();
        }
        let (split, start_index) = self.split_boundary(range.start);
        let (split, end_index) = split.split_boundary(range.end);
        let mut objects = Vec::with_capacity(split.objects.len());
        objects.extend_from_slice(&split.objects[..start_index]);
        for object in &split.objects[start_index..end_index] {
            objects.push(transform(object));
        }
        objects.extend_from_slice(&split.objects[end_index..]);
        Self::from_objects(objects)
    }

    /// Clones of the elements covered by `range`, split at its endpoints.
    pub fn objects_in_range(&self, range: Range) -> Vec<T> {
        if range.is_collapsed() {
            return Vec::new();
        }
        let (split, start_index) = self.split_boundary(range.start);
        let (split, end_index) = split.split_boundary(range.end);
        split.objects[start_index..end_index].to_vec()
    }

    /// Replace the single element containing `position` with its image under
    /// `edit`. A past-the-end position edits the final element; an empty
    /// list is returned unchanged.
    pub fn edit_object_at_position(&self, position: Position, edit: impl FnOnce(&T) -> T) -> Self {
        let index = match self.index_and_offset_at_position(position) {
            Some((index, _)) => index,
            None if !self.objects.is_empty() => self.objects.len() - 1,
            None => return self.clone(),
        };
        self.edit_object_at_index(index, edit)
    }

    pub fn edit_object_at_index(&self, index: usize, edit: impl FnOnce(&T) -> T) -> Self {
        let Some(object) = self.objects.get(index) else {
            return self.clone();
        };
        let mut objects = self.objects.as_ref().clone();
        objects[index] = edit(object);
        Self::from_objects(objects)
    }

    /// Splice `replacement` over the element index range `[start, end)`.
    pub fn splice_indices(&self, start: usize, end: usize, replacement: Vec<T>) -> Self {
        let start = start.min(self.objects.len());
        let end = end.clamp(start, self.objects.len());
        let mut objects =
            Vec::with_capacity(self.objects.len() - (end - start) + replacement.len());
        objects.extend_from_slice(&self.objects[..start]);
        objects.extend(replacement);
        objects.extend_from_slice(&self.objects[end..]);
        Self::from_objects(objects)
    }

    /// Greedy left-to-right merge of adjacent consolidatable elements.
    pub fn consolidate(&self) -> Self {
        self.consolidate_between(0, self.objects.len())
    }

    /// Consolidation restricted to the element index window `[start, end)`.
    pub fn consolidate_between(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.objects.len());
        if start >= end {
            return self.clone();
        }
        let mut objects: Vec<T> = self.objects[..start].to_vec();
        let mut window: Vec<T> = Vec::with_capacity(end - start);
        for object in &self.objects[start..end] {
            match window.last_mut() {
                Some(last) if last.can_consolidate_with(object) => {
                    *last = last.consolidate_with(object);
                }
                _ => window.push(object.clone()),
            }
        }
        objects.extend(window);
        objects.extend_from_slice(&self.objects[end..]);
        Self::from_objects(objects)
    }
}
