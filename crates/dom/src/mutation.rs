use crate::document::ElementId;

/// One batch of structural changes reported by a document observer.
///
/// Only image elements are reported. An element that was moved is not
/// reported at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    /// Image elements inserted into the document.
    pub added: Vec<ElementId>,
    /// Image elements removed from the document.
    pub removed: Vec<ElementId>,
}

impl MutationBatch {
    pub fn added(elements: Vec<ElementId>) -> Self {
        Self {
            added: elements,
            removed: Vec::new(),
        }
    }

    pub fn removed(elements: Vec<ElementId>) -> Self {
        Self {
            added: Vec::new(),
            removed: elements,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
