//! Arena-backed document tree.
//!
//! Every node lives in one `Vec` owned by the [`Document`] and is addressed by
//! a [`NodeId`]. Child lists hold ids; the parent link is a plain id used for
//! navigation only. Detaching a node unlinks it from its parent but never frees
//! the slot, so ids stay valid for the lifetime of the document.

use indexmap::IndexMap;

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// An element: tag name plus attributes in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: IndexMap<String, String>,
}

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A document tree with a single root element.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Document {
    /// Create a document holding an empty root element.
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut doc = Self::empty();
        doc.root = doc.create_element(root_name);
        doc
    }

    /// A document with no nodes. Only the parser uses this, and it always sets
    /// a root before handing the document out.
    pub(crate) fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of arena slots, detached nodes included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.push(NodeKind::Element(Element {
            name: name.into(),
            attributes: IndexMap::new(),
        }))
    }

    /// Create a detached element with attributes.
    pub fn create_element_with(&mut self, name: impl Into<String>, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(name);
        for (key, value) in attrs {
            self.set_attr(id, *key, *value);
        }
        id
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    /// Create an element holding a single text child.
    pub fn create_text_element(&mut self, name: impl Into<String>, text: impl Into<String>) -> NodeId {
        let element = self.create_element(name);
        let text = self.create_text(text);
        self.append_child(element, text);
        element
    }

    // ---- inspection -------------------------------------------------------

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(e) => Some(e),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(e) => Some(e),
            NodeKind::Text(_) => None,
        }
    }

    /// Tag name, or `None` for text nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        !self.is_element(id)
    }

    /// True if `id` is an element called `name`.
    pub fn is_named(&self, id: NodeId, name: &str) -> bool {
        self.name(id) == Some(name)
    }

    /// True if `id` is an element whose name is one of `names`.
    pub fn is_named_any(&self, id: NodeId, names: &[&str]) -> bool {
        self.name(id).is_some_and(|n| names.contains(&n))
    }

    /// Content of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => Some(t),
            NodeKind::Element(_) => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|e| e.attributes.get(name))
            .map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// True if the attribute is present and equal to `"true"`.
    pub fn attr_is_true(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name) == Some("true")
    }

    pub fn attributes(&self, id: NodeId) -> Option<&IndexMap<String, String>> {
        self.element(id).map(|e| &e.attributes)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    pub fn children_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_named(*c, name))
            .collect()
    }

    pub fn first_child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.is_named(*c, name))
    }

    fn position_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let pos = self.children(parent).iter().position(|c| *c == id)?;
        Some((parent, pos))
    }

    /// Next sibling of any kind.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, pos) = self.position_in_parent(id)?;
        self.children(parent).get(pos + 1).copied()
    }

    /// Previous sibling of any kind.
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, pos) = self.position_in_parent(id)?;
        pos.checked_sub(1).map(|p| self.children(parent)[p])
    }

    /// Next sibling element, skipping text.
    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, pos) = self.position_in_parent(id)?;
        self.children(parent)[pos + 1..]
            .iter()
            .copied()
            .find(|c| self.is_element(*c))
    }

    /// Previous sibling element, skipping text.
    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, pos) = self.position_in_parent(id)?;
        self.children(parent)[..pos]
            .iter()
            .rev()
            .copied()
            .find(|c| self.is_element(*c))
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    pub fn has_ancestor_named(&self, id: NodeId, name: &str) -> bool {
        self.ancestors(id).any(|a| self.is_named(a, name))
    }

    /// True if `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|a| a == self.root)
    }

    /// All descendants of `id` in document order, `id` itself excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Descendant elements called `name`, in document order.
    pub fn descendants_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|d| self.is_named(*d, name))
            .collect()
    }

    /// Concatenated text of `id` and all its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| self.text(d))
            .collect()
    }

    /// True if the node has no element children and only whitespace text.
    pub fn is_blank(&self, id: NodeId) -> bool {
        self.children(id)
            .iter()
            .all(|c| self.text(*c).is_some_and(|t| t.trim().is_empty()))
    }

    // ---- mutation ---------------------------------------------------------

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) {
        if let Some(e) = self.element_mut(id) {
            e.name = name.into();
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        if let Some(e) = self.element_mut(id) {
            e.attributes.insert(name.into(), value.into());
        }
    }

    /// Remove an attribute, keeping the order of the others.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id)
            .and_then(|e| e.attributes.shift_remove(name))
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let NodeKind::Text(t) = &mut self.nodes[id.0].kind {
            *t = text.into();
        }
    }

    /// Unlink `id` from its parent. The node and its subtree stay in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(parent != child && !self.ancestors(parent).any(|a| a == child));
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_child_at(parent, 0, child);
    }

    /// Insert `child` at `index` among `parent`'s children (clamped to the end).
    pub fn insert_child_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Insert `node` directly before `reference`. No-op if `reference` is detached.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        if reference == node {
            return;
        }
        self.detach(node);
        if let Some((parent, pos)) = self.position_in_parent(reference) {
            self.insert_child_at(parent, pos, node);
        }
    }

    /// Insert `node` directly after `reference`. No-op if `reference` is detached.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        if reference == node {
            return;
        }
        self.detach(node);
        if let Some((parent, pos)) = self.position_in_parent(reference) {
            self.insert_child_at(parent, pos + 1, node);
        }
    }

    /// Put `replacement` where `old` was and detach `old`.
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) {
        self.replace_with_many(old, &[replacement]);
    }

    /// Put `replacements` (in order) where `old` was and detach `old`.
    pub fn replace_with_many(&mut self, old: NodeId, replacements: &[NodeId]) {
        let mut anchor = old;
        for node in replacements {
            self.insert_after(anchor, *node);
            anchor = *node;
        }
        if !replacements.contains(&old) {
            self.detach(old);
        }
    }

    /// Replace `id` by its own children.
    pub fn unwrap(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        self.replace_with_many(id, &children);
    }

    /// Detach every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
    }

    /// Replace the children of `id` by `children`, in order.
    pub fn set_children(&mut self, id: NodeId, children: &[NodeId]) {
        self.clear_children(id);
        for child in children {
            self.append_child(id, *child);
        }
    }

    /// Wrap `id` in a new element called `name`, returning the wrapper.
    pub fn wrap(&mut self, id: NodeId, name: impl Into<String>) -> NodeId {
        let wrapper = self.create_element(name);
        self.insert_before(id, wrapper);
        self.append_child(wrapper, id);
        wrapper
    }

    /// Copy the subtree at `id` into new detached nodes.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let copy = self.push(self.nodes[id.0].kind.clone());
        for child in self.children(id).to_vec() {
            let child_copy = self.deep_clone(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Copy the subtree at `id` of another document into this one, detached.
    pub fn import(&mut self, other: &Document, id: NodeId) -> NodeId {
        let copy = self.push(other.nodes[id.0].kind.clone());
        for child in other.children(id) {
            let child_copy = self.import(other, *child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Map from attached node to its position in document order.
    pub fn document_order(&self) -> std::collections::HashMap<NodeId, usize> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect()
    }
}

/// Iterator over a node's ancestors, innermost first.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}
