use std::fmt;

use crate::error::DomError;

/// Opaque identity of an element within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Loading progress of an element's current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Uninitialized,
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    /// Whether the current source has fully loaded.
    pub fn is_complete(&self) -> bool {
        matches!(self, ReadyState::Complete)
    }
}

/// Rendered box size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The subset of DOM operations the preloader needs.
///
/// Implementations are driven from a single task; no method may block on I/O.
pub trait Document: Send {
    /// All image elements currently connected, in document order.
    fn images(&self) -> Vec<ElementId>;

    /// Whether `id` names an existing `<img>` element.
    fn is_image(&self, id: ElementId) -> bool;

    /// Whether the element exists in this document's arena (connected or not).
    fn contains(&self, id: ElementId) -> bool;

    /// Whether the element is reachable from the document root.
    fn is_connected(&self, id: ElementId) -> bool;

    fn parent(&self, id: ElementId) -> Option<ElementId>;

    fn attribute(&self, id: ElementId, name: &str) -> Option<String>;

    /// Set an attribute. Assigning `src` restarts loading of the element.
    fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) -> Result<(), DomError>;

    /// Set an inline style property. An empty value clears it.
    fn set_style(&mut self, id: ElementId, property: &str, value: &str) -> Result<(), DomError>;

    fn ready_state(&self, id: ElementId) -> ReadyState;

    /// The element's current rendered box.
    fn rendered_size(&self, id: ElementId) -> Size;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> ElementId;

    fn add_class(&mut self, id: ElementId, class: &str) -> Result<(), DomError>;

    fn set_text(&mut self, id: ElementId, text: &str) -> Result<(), DomError>;

    /// Put `wrapper` where `target` is and move `target` inside it.
    fn wrap(&mut self, target: ElementId, wrapper: ElementId) -> Result<(), DomError>;

    /// Replace `target`'s parent with the parent's children, dropping the parent.
    fn unwrap_parent(&mut self, target: ElementId) -> Result<(), DomError>;

    fn append_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), DomError>;

    /// Detach an element (and its subtree) from its parent and forget it.
    fn remove(&mut self, id: ElementId) -> Result<(), DomError>;
}
