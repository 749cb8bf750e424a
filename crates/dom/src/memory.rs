//! In-memory document tree.
//!
//! Stands in for a browser DOM: tests drive load completion by hand with
//! [`MemoryDocument::finish_load`] and watch structural changes through
//! [`MemoryDocument::observe`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::document::{Document, ElementId, ReadyState, Size};
use crate::error::DomError;
use crate::mutation::MutationBatch;

const IMG: &str = "img";

#[derive(Debug, Default)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    classes: Vec<String>,
    text: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    ready: ReadyState,
    natural_size: Option<Size>,
    src_assignments: usize,
}

struct Tree {
    nodes: HashMap<ElementId, Node>,
    root: ElementId,
    next_id: u64,
    observers: Vec<mpsc::UnboundedSender<MutationBatch>>,
}

impl Tree {
    fn new() -> Self {
        let root = ElementId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                tag: "body".to_string(),
                ready: ReadyState::Complete,
                ..Node::default()
            },
        );

        Self {
            nodes,
            root,
            next_id: 1,
            observers: Vec::new(),
        }
    }

    fn node(&self, id: ElementId) -> Result<&Node, DomError> {
        self.nodes.get(&id).ok_or(DomError::NoSuchElement(id))
    }

    fn node_mut(&mut self, id: ElementId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(&id).ok_or(DomError::NoSuchElement(id))
    }

    fn create(&mut self, tag: &str) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                tag: tag.to_ascii_lowercase(),
                ..Node::default()
            },
        );
        id
    }

    fn detach(&mut self, id: ElementId) -> Result<(), DomError> {
        let parent = self.node_mut(id)?.parent.take();
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
        }
        Ok(())
    }

    fn append(&mut self, parent: ElementId, child: ElementId) -> Result<(), DomError> {
        self.node(parent)?;
        self.detach(child)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    fn is_connected(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == self.root {
                return true;
            }
            current = self.nodes.get(&c).and_then(|n| n.parent);
        }
        false
    }

    /// Depth-first walk from `from`, collecting matching elements in document order.
    fn collect(&self, from: ElementId, pred: &dyn Fn(&Node) -> bool, out: &mut Vec<ElementId>) {
        if let Some(node) = self.nodes.get(&from) {
            if pred(node) {
                out.push(from);
            }
            for child in &node.children {
                self.collect(*child, pred, out);
            }
        }
    }

    fn images_under(&self, from: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        self.collect(from, &|n: &Node| n.tag == IMG, &mut out);
        out
    }

    fn notify(&mut self, batch: MutationBatch) {
        if batch.is_empty() {
            return;
        }
        self.observers.retain(|tx| tx.send(batch.clone()).is_ok());
    }
}

/// Cloneable handle to a shared in-memory document.
///
/// Clones see the same tree, so a test can keep one handle while the
/// preloader owns another.
#[derive(Clone)]
pub struct MemoryDocument {
    tree: Arc<Mutex<Tree>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Create an empty document with a `body` root.
    pub fn new() -> Self {
        Self {
            tree: Arc::new(Mutex::new(Tree::new())),
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> ElementId {
        self.tree().root
    }

    /// Subscribe to host-side insertions and removals of images.
    pub fn observe(&self) -> impl Stream<Item = MutationBatch> + Send + 'static {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tree().observers.push(tx);
        UnboundedReceiverStream::new(rx)
    }

    /// Append a new element under `parent` without notifying observers.
    pub fn insert_element(&self, parent: ElementId, tag: &str) -> Result<ElementId, DomError> {
        let mut tree = self.tree();
        let id = tree.create(tag);
        tree.append(parent, id)?;
        Ok(id)
    }

    /// Append a loading `<img src=..>` under `parent` and report it.
    pub fn insert_image(&self, parent: ElementId, src: &str) -> Result<ElementId, DomError> {
        let ids = self.insert_images(parent, &[src])?;
        Ok(ids[0])
    }

    /// Append several images under `parent`, reported as a single batch.
    pub fn insert_images(
        &self,
        parent: ElementId,
        srcs: &[&str],
    ) -> Result<Vec<ElementId>, DomError> {
        let mut tree = self.tree();
        tree.node(parent)?;

        let mut added = Vec::with_capacity(srcs.len());
        for src in srcs {
            let id = tree.create(IMG);
            let node = tree.node_mut(id)?;
            node.attributes.insert("src".to_string(), src.to_string());
            node.ready = ReadyState::Loading;
            tree.append(parent, id)?;
            added.push(id);
        }

        tree.notify(MutationBatch::added(added.clone()));
        Ok(added)
    }

    /// Detach an element from the tree and report any images it contained.
    ///
    /// The element stays addressable, so it can be re-inserted.
    pub fn remove_element(&self, id: ElementId) -> Result<(), DomError> {
        let mut tree = self.tree();
        let was_connected = tree.is_connected(id);
        tree.detach(id)?;

        if was_connected {
            let removed = tree.images_under(id);
            tree.notify(MutationBatch::removed(removed));
        }
        Ok(())
    }

    /// Mark the element's current source as fully loaded.
    pub fn finish_load(&self, id: ElementId) -> Result<(), DomError> {
        let mut tree = self.tree();
        let node = tree.node_mut(id)?;
        node.ready = ReadyState::Complete;
        Ok(())
    }

    /// Set the intrinsic size an image reports once loaded.
    pub fn set_natural_size(&self, id: ElementId, size: Size) -> Result<(), DomError> {
        self.tree().node_mut(id)?.natural_size = Some(size);
        Ok(())
    }

    /// How many times `src` was assigned through [`Document::set_attribute`].
    pub fn src_assignments(&self, id: ElementId) -> usize {
        self.tree().nodes.get(&id).map_or(0, |n| n.src_assignments)
    }

    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        self.tree()
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, id: ElementId) -> Option<String> {
        self.tree().nodes.get(&id).map(|n| n.tag.clone())
    }

    pub fn classes(&self, id: ElementId) -> Vec<String> {
        self.tree()
            .nodes
            .get(&id)
            .map(|n| n.classes.clone())
            .unwrap_or_default()
    }

    pub fn text(&self, id: ElementId) -> Option<String> {
        self.tree().nodes.get(&id).map(|n| n.text.clone())
    }

    pub fn style(&self, id: ElementId, property: &str) -> Option<String> {
        self.tree()
            .nodes
            .get(&id)
            .and_then(|n| n.styles.get(property).cloned())
    }

    /// All attributes of an element, sorted by name.
    pub fn attributes(&self, id: ElementId) -> Vec<(String, String)> {
        self.tree()
            .nodes
            .get(&id)
            .map(|n| n.attributes.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Number of elements in the arena, connected or not.
    pub fn node_count(&self) -> usize {
        self.tree().nodes.len()
    }
}

impl Document for MemoryDocument {
    fn images(&self) -> Vec<ElementId> {
        let tree = self.tree();
        tree.images_under(tree.root)
    }

    fn is_image(&self, id: ElementId) -> bool {
        self.tree().nodes.get(&id).is_some_and(|n| n.tag == IMG)
    }

    fn contains(&self, id: ElementId) -> bool {
        self.tree().nodes.contains_key(&id)
    }

    fn is_connected(&self, id: ElementId) -> bool {
        self.tree().is_connected(id)
    }

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.tree().nodes.get(&id).and_then(|n| n.parent)
    }

    fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
        self.tree()
            .nodes
            .get(&id)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) -> Result<(), DomError> {
        let mut tree = self.tree();
        let node = tree.node_mut(id)?;
        node.attributes.insert(name.to_string(), value.to_string());

        if name == "src" {
            node.src_assignments += 1;
            node.ready = ReadyState::Loading;
        }
        Ok(())
    }

    fn set_style(&mut self, id: ElementId, property: &str, value: &str) -> Result<(), DomError> {
        let mut tree = self.tree();
        let node = tree.node_mut(id)?;
        if value.is_empty() {
            node.styles.remove(property);
        } else {
            node.styles.insert(property.to_string(), value.to_string());
        }
        Ok(())
    }

    fn ready_state(&self, id: ElementId) -> ReadyState {
        self.tree()
            .nodes
            .get(&id)
            .map(|n| n.ready)
            .unwrap_or_default()
    }

    fn rendered_size(&self, id: ElementId) -> Size {
        let tree = self.tree();
        let Some(node) = tree.nodes.get(&id) else {
            return Size::default();
        };

        let natural = if node.ready.is_complete() {
            node.natural_size.unwrap_or_default()
        } else {
            Size::default()
        };
        let dimension = |name: &str, fallback: u32| {
            node.attributes
                .get(name)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(fallback)
        };

        Size::new(dimension("width", natural.width), dimension("height", natural.height))
    }

    fn create_element(&mut self, tag: &str) -> ElementId {
        self.tree().create(tag)
    }

    fn add_class(&mut self, id: ElementId, class: &str) -> Result<(), DomError> {
        let mut tree = self.tree();
        let node = tree.node_mut(id)?;
        if !node.classes.iter().any(|c| c == class) {
            node.classes.push(class.to_string());
        }
        Ok(())
    }

    fn set_text(&mut self, id: ElementId, text: &str) -> Result<(), DomError> {
        self.tree().node_mut(id)?.text = text.to_string();
        Ok(())
    }

    fn wrap(&mut self, target: ElementId, wrapper: ElementId) -> Result<(), DomError> {
        let mut tree = self.tree();
        tree.node(wrapper)?;
        let parent = tree.node(target)?.parent.ok_or(DomError::Detached(target))?;
        tree.detach(wrapper)?;

        let siblings = &mut tree.node_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|c| *c == target)
            .ok_or(DomError::Detached(target))?;
        siblings[index] = wrapper;

        tree.node_mut(wrapper)?.parent = Some(parent);
        tree.node_mut(wrapper)?.children.push(target);
        tree.node_mut(target)?.parent = Some(wrapper);
        Ok(())
    }

    fn unwrap_parent(&mut self, target: ElementId) -> Result<(), DomError> {
        let mut tree = self.tree();
        let parent = tree.node(target)?.parent.ok_or(DomError::Detached(target))?;
        let grandparent = tree.node(parent)?.parent.ok_or(DomError::Detached(parent))?;

        let moved = std::mem::take(&mut tree.node_mut(parent)?.children);
        for child in &moved {
            tree.node_mut(*child)?.parent = Some(grandparent);
        }

        let siblings = &mut tree.node_mut(grandparent)?.children;
        let index = siblings
            .iter()
            .position(|c| *c == parent)
            .ok_or(DomError::Detached(parent))?;
        let tail = siblings.split_off(index + 1);
        siblings.pop();
        siblings.extend(moved);
        siblings.extend(tail);

        tree.nodes.remove(&parent);
        Ok(())
    }

    fn append_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), DomError> {
        self.tree().append(parent, child)
    }

    fn remove(&mut self, id: ElementId) -> Result<(), DomError> {
        let mut tree = self.tree();
        tree.detach(id)?;

        let mut doomed = Vec::new();
        tree.collect(id, &|_: &Node| true, &mut doomed);
        for d in doomed {
            tree.nodes.remove(&d);
        }
        Ok(())
    }
}
