//! Ordered, in-memory collection of annotations.
//!
//! Iteration order is insertion order: later annotations draw on top and win
//! single-target hit tests.

use crate::annotation::{Annotation, AnnotationId};

#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an annotation and returns its id.
    pub fn add(&mut self, annotation: Annotation) -> AnnotationId {
        let id = annotation.id();
        self.annotations.push(annotation);
        id
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id() == id)
    }

    /// Replaces the text of the note with this id in place.
    ///
    /// Returns `false` when the id is unknown or does not name a note.
    pub fn update_text(&mut self, id: AnnotationId, text: impl Into<String>) -> bool {
        self.annotations
            .iter_mut()
            .find(|annotation| annotation.id() == id)
            .is_some_and(|annotation| annotation.set_text(text.into()))
    }

    /// Removes by identity; removing an absent id is a no-op.
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let index = self.annotations.iter().position(|annotation| annotation.id() == id)?;
        Some(self.annotations.remove(index))
    }

    /// Removes every listed id in one pass, returning how many were present.
    pub fn remove_all(&mut self, ids: &[AnnotationId]) -> usize {
        let before = self.annotations.len();
        self.annotations.retain(|annotation| !ids.contains(&annotation.id()));
        before - self.annotations.len()
    }

    /// Annotations bound to one page, in insertion order.
    pub fn for_page(&self, page_index: usize) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.iter().filter(move |annotation| annotation.page_index() == page_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.iter()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    /// Owned copy of every record, in insertion order.
    pub fn snapshot(&self) -> Vec<Annotation> {
        self.annotations.clone()
    }
}
