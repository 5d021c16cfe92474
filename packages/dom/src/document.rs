//! # Host Document
//!
//! Arena-backed document tree standing in for the live page.
//!
//! The document is owned by the host. Editing code holds [`NodeId`] handles,
//! never references, so host code can keep mutating the tree between events.
//! Every structural, attribute, or character-data change is queued as a
//! [`MutationRecord`] that observers drain with [`Document::take_records`].

use crate::error::{DomError, DomResult, SelectorError};
use crate::html;
use crate::node::{is_void_element, Attribute, ElementData, Node, NodeData, NodeId};
use crate::selector::SelectorList;
use crate::style::{self, Rect};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    ChildList,
    Attributes { name: String },
    CharacterData,
}

/// One observed change, in the spirit of a DOM `MutationRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: RecordKind,
}

/// Insertion point for typed text: a text node and a char offset, or an
/// element and a child index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub node: NodeId,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    records: Vec<MutationRecord>,
    computed: HashMap<NodeId, Vec<(String, String)>>,
    rects: HashMap<NodeId, Rect>,
    focused: Option<NodeId>,
    caret: Option<Caret>,
}

impl Document {
    /// Create an empty `html > head + body` document
    pub fn new() -> Self {
        let mut doc = Self::empty();
        doc.build_skeleton(Vec::new());
        doc
    }

    /// Parse markup into a document.
    ///
    /// Markup without an `<html>` root is treated as body content.
    pub fn parse(source: &str) -> Self {
        let mut doc = Self::empty();
        let roots = html::parse_fragment(&mut doc, source);
        let html_root = roots
            .iter()
            .copied()
            .find(|id| doc.tag_name(*id) == Some("html"));

        match html_root {
            Some(html) => {
                let root = doc.root;
                doc.attach(root, html);
            }
            None => doc.build_skeleton(roots),
        }

        doc
    }

    fn empty() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
            root: NodeId(0),
            records: Vec::new(),
            computed: HashMap::new(),
            rects: HashMap::new(),
            focused: None,
            caret: None,
        }
    }

    fn build_skeleton(&mut self, body_content: Vec<NodeId>) {
        let root = self.root;
        let html = self.create_element("html");
        let head = self.create_element("head");
        let body = self.create_element("body");
        self.attach(root, html);
        self.attach(html, head);
        self.attach(html, body);
        for node in body_content {
            self.attach(body, node);
        }
    }

    // ---- node access -------------------------------------------------

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.nodes.get(id.0).ok_or(DomError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(DomError::NodeNotFound(id))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).map(|node| &node.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.data(id) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> DomResult<&mut ElementData> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id), Some(NodeData::Text { .. }))
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    /// Content of a text or comment node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            Some(NodeData::Text { content }) | Some(NodeData::Comment { content }) => {
                Some(content.as_str())
            }
            _ => None,
        }
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root).next()
    }

    pub fn head(&self) -> Option<NodeId> {
        self.find_tag("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.find_tag("body")
    }

    fn find_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .find(|id| self.tag_name(*id) == Some(tag))
    }

    // ---- creation ----------------------------------------------------

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(data));
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text {
            content: content.into(),
        })
    }

    pub fn create_comment(&mut self, content: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment {
            content: content.into(),
        })
    }

    /// Attach a freshly created, parentless node without recording a change.
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
    }

    /// Set an attribute on a freshly created node without recording a change.
    pub(crate) fn push_attribute(&mut self, id: NodeId, name: String, value: String) {
        if let Ok(element) = self.element_mut(id) {
            if element.attribute(&name).is_none() {
                element.attributes.push(Attribute { name, value });
            }
        }
    }

    /// Deep-copy a subtree. The copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> DomResult<NodeId> {
        let data = self.node(id)?.data.clone();
        let children = self.node(id)?.children.clone();
        let copy = self.alloc(data);
        for child in children {
            let child_copy = self.deep_clone(child)?;
            self.attach(copy, child_copy);
        }
        Ok(copy)
    }

    // ---- navigation --------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|parent| self.is_element(*parent))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.is_element(*child))
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent)[index + 1..]
            .iter()
            .copied()
            .find(|sibling| self.is_element(*sibling))
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent)[..index]
            .iter()
            .rev()
            .copied()
            .find(|sibling| self.is_element(*sibling))
    }

    /// Ancestors from the parent up to the document node
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// Descendants in document order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|ancestor| ancestor == self.root)
    }

    /// Inclusive containment: a node contains itself.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|candidate| candidate == ancestor)
    }

    // ---- tree mutation -----------------------------------------------

    fn check_container(&self, id: NodeId) -> DomResult<()> {
        match &self.node(id)?.data {
            NodeData::Document => Ok(()),
            NodeData::Element(element) if !is_void_element(&element.tag) => Ok(()),
            _ => Err(DomError::NotAContainer(id)),
        }
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.check_container(parent)?;
        self.node(child)?;
        if child == self.root || self.contains(child, parent) {
            debug!(?parent, ?child, "refusing insert that would create a cycle");
            return Err(DomError::CycleDetected { parent, child });
        }
        Ok(())
    }

    fn record(&mut self, target: NodeId, kind: RecordKind) {
        self.records.push(MutationRecord { target, kind });
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` before `reference`, or at the end when
    /// `reference` is `None`. The child is first removed from its old parent.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        self.check_insertable(parent, child)?;

        if let Some(reference) = reference {
            if reference == child {
                return Ok(());
            }
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        self.detach(child)?;

        let children = &self.node(parent)?.children;
        let index = reference
            .and_then(|reference| children.iter().position(|c| *c == reference))
            .unwrap_or(children.len());

        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.record(parent, RecordKind::ChildList);
        Ok(())
    }

    /// Insert `child` at a child index of `parent` (clamped to the end).
    pub fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> DomResult<()> {
        let reference = self.children(parent).get(index).copied();
        self.insert_before(parent, child, reference)
    }

    /// Remove a node from its parent. The node stays in the arena.
    pub fn detach(&mut self, id: NodeId) -> DomResult<()> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };

        self.node_mut(parent)?.children.retain(|child| *child != id);
        self.node_mut(id)?.parent = None;
        self.record(parent, RecordKind::ChildList);
        Ok(())
    }

    /// Swap the whole child list of `parent`, returning the previous
    /// children (now detached, in their original order).
    pub fn replace_children(
        &mut self,
        parent: NodeId,
        children: Vec<NodeId>,
    ) -> DomResult<Vec<NodeId>> {
        self.check_container(parent)?;
        for child in &children {
            self.check_insertable(parent, *child)?;
        }

        let previous = std::mem::take(&mut self.node_mut(parent)?.children);
        for child in &previous {
            self.node_mut(*child)?.parent = None;
        }

        for child in children {
            self.detach(child)?;
            self.node_mut(child)?.parent = Some(parent);
            self.node_mut(parent)?.children.push(child);
        }

        self.record(parent, RecordKind::ChildList);
        Ok(previous)
    }

    // ---- attributes --------------------------------------------------

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|element| element.attribute(name))
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        self.element(id)
            .map(|element| element.attributes.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let element = self.element_mut(id)?;
        match element.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) if attr.value == value => return Ok(()),
            Some(attr) => attr.value = value.to_string(),
            None => element.attributes.push(Attribute {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }

        self.record(
            id,
            RecordKind::Attributes {
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// Remove an attribute, returning its previous value
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<Option<String>> {
        let element = self.element_mut(id)?;
        let Some(index) = element.attributes.iter().position(|attr| attr.name == name) else {
            return Ok(None);
        };

        let removed = element.attributes.remove(index);
        self.record(
            id,
            RecordKind::Attributes {
                name: name.to_string(),
            },
        );
        Ok(Some(removed.value))
    }

    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.attribute(id, "id").filter(|value| !value.is_empty())
    }

    pub fn class_list(&self, id: NodeId) -> Vec<String> {
        self.attribute(id, "class")
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> DomResult<()> {
        if self.has_class(id, class) {
            return Ok(());
        }
        let mut classes = self.class_list(id);
        classes.push(class.to_string());
        self.set_attribute(id, "class", &classes.join(" "))
    }

    /// Remove a class; the `class` attribute is dropped once it is empty.
    pub fn remove_class(&mut self, id: NodeId, class: &str) -> DomResult<()> {
        if !self.has_class(id, class) {
            return Ok(());
        }
        let classes: Vec<String> = self
            .class_list(id)
            .into_iter()
            .filter(|existing| existing != class)
            .collect();

        if classes.is_empty() {
            self.remove_attribute(id, "class").map(|_| ())
        } else {
            self.set_attribute(id, "class", &classes.join(" "))
        }
    }

    // ---- text and markup ---------------------------------------------

    /// Replace the content of a text or comment node
    pub fn set_text(&mut self, id: NodeId, content: impl Into<String>) -> DomResult<()> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text { content: slot } | NodeData::Comment { content: slot } => {
                *slot = content.into();
            }
            _ => return Err(DomError::NotAContainer(id)),
        }
        self.record(id, RecordKind::CharacterData);
        Ok(())
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match self.data(id) {
            Some(NodeData::Text { content }) => content.clone(),
            Some(NodeData::Comment { .. }) | None => String::new(),
            Some(_) => self
                .descendants(id)
                .filter_map(|node| match self.data(node) {
                    Some(NodeData::Text { content }) => Some(content.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        html::serialize_children(self, id, &mut out);
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        html::serialize_node(self, id, &mut out);
        out
    }

    /// Parse `markup` and replace the children of `id` with it.
    ///
    /// Returns the previous children, detached but intact, so the exact
    /// prior content can be restored with [`Document::replace_children`].
    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) -> DomResult<Vec<NodeId>> {
        self.check_container(id)?;
        let children = match self.tag_name(id) {
            Some(tag) if crate::node::is_raw_text_element(tag) => {
                if markup.is_empty() {
                    Vec::new()
                } else {
                    vec![self.create_text(markup)]
                }
            }
            _ => html::parse_fragment(self, markup),
        };
        self.replace_children(id, children)
    }

    // ---- selectors ---------------------------------------------------

    pub fn select(&self, selector: &SelectorList) -> Vec<NodeId> {
        self.descendants(self.root)
            .filter(|id| selector.matches(self, *id))
            .collect()
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select(&list))
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants(self.root)
            .find(|id| list.matches(self, *id)))
    }

    pub fn matches(&self, id: NodeId, selector: &str) -> Result<bool, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(list.matches(self, id))
    }

    // ---- layout ------------------------------------------------------

    /// Record a computed style value reported by the host's layout engine.
    pub fn set_computed_style(&mut self, id: NodeId, property: &str, value: &str) {
        let entry = self.computed.entry(id).or_default();
        style::merge_declarations(
            entry,
            vec![(property.to_ascii_lowercase(), value.to_string())],
        );
    }

    /// Host-reported value, then the inline `style` attribute, then the
    /// tag's default.
    pub fn computed_style(&self, id: NodeId, property: &str) -> Option<String> {
        let tag = self.tag_name(id)?;

        if let Some(value) = self
            .computed
            .get(&id)
            .and_then(|decls| decls.iter().find(|(name, _)| name == property))
        {
            return Some(value.1.clone());
        }

        if let Some(inline) = self.attribute(id, "style") {
            if let Some((_, value)) = style::parse_declarations(inline)
                .into_iter()
                .find(|(name, _)| name == property)
            {
                return Some(value);
            }
        }

        style::default_property(tag, property).map(str::to_string)
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        self.rects.insert(id, rect);
    }

    pub fn bounding_rect(&self, id: NodeId) -> Rect {
        self.rects.get(&id).copied().unwrap_or_default()
    }

    // ---- focus and caret ---------------------------------------------

    pub fn focus(&mut self, id: NodeId) {
        self.focused = Some(id);
    }

    pub fn blur(&mut self) {
        self.focused = None;
        self.caret = None;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn caret(&self) -> Option<Caret> {
        self.caret
    }

    pub fn set_caret(&mut self, caret: Caret) {
        self.caret = Some(caret);
    }

    /// Move the caret to the end of the last text inside `id`.
    pub fn place_caret_at_end(&mut self, id: NodeId) -> DomResult<Caret> {
        self.node(id)?;
        let last_text = self.descendants(id).filter(|node| self.is_text(*node)).last();
        let caret = match last_text {
            Some(text) => Caret {
                node: text,
                offset: self.text(text).map(|t| t.chars().count()).unwrap_or(0),
            },
            None => Caret {
                node: id,
                offset: self.children(id).len(),
            },
        };
        self.caret = Some(caret);
        Ok(caret)
    }

    /// Insert text at the caret, as typing would.
    pub fn insert_text(&mut self, text: &str) -> DomResult<()> {
        let caret = self.caret.ok_or(DomError::NoCaret)?;
        let inserted = text.chars().count();

        if let Some(current) = self.text(caret.node).filter(|_| self.is_text(caret.node)) {
            let mut content = current.to_string();
            content.insert_str(byte_offset(&content, caret.offset), text);
            self.set_text(caret.node, content)?;
            self.caret = Some(Caret {
                node: caret.node,
                offset: caret.offset + inserted,
            });
        } else {
            let node = self.create_text(text);
            self.insert_at(caret.node, caret.offset, node)?;
            self.caret = Some(Caret {
                node,
                offset: inserted,
            });
        }
        Ok(())
    }

    /// Insert a `<br>` at the caret, splitting the current text node.
    pub fn insert_line_break(&mut self) -> DomResult<()> {
        let caret = self.caret.ok_or(DomError::NoCaret)?;
        let br = self.create_element("br");

        if let Some(current) = self.text(caret.node).filter(|_| self.is_text(caret.node)) {
            let at = byte_offset(current, caret.offset);
            let (head, tail) = (current[..at].to_string(), current[at..].to_string());
            let parent = self
                .parent(caret.node)
                .ok_or(DomError::NodeNotFound(caret.node))?;
            let index = self
                .index_in_parent(caret.node)
                .ok_or(DomError::NodeNotFound(caret.node))?;

            self.set_text(caret.node, head)?;
            self.insert_at(parent, index + 1, br)?;
            let rest = self.create_text(tail);
            self.insert_at(parent, index + 2, rest)?;
            self.caret = Some(Caret {
                node: rest,
                offset: 0,
            });
        } else {
            self.insert_at(caret.node, caret.offset, br)?;
            self.caret = Some(Caret {
                node: caret.node,
                offset: caret.offset + 1,
            });
        }
        Ok(())
    }

    // ---- change records ----------------------------------------------

    /// Drain queued change records
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    /// Put records back in front of anything queued since they were taken.
    pub fn restore_records(&mut self, mut earlier: Vec<MutationRecord>) {
        earlier.append(&mut self.records);
        self.records = earlier;
    }

    pub fn pending_records(&self) -> usize {
        self.records.len()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

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

pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(current).iter().rev().copied());
        Some(current)
    }
}
