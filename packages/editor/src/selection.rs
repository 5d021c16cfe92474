//! # Selection & Hover Tracker
//!
//! Tracks the hovered and selected elements and mirrors them onto the page
//! as reserved marker attributes. The host page owns the elements; the
//! tracker only ever adds and removes its own markers.
//!
//! ```text
//!   idle ──move──▶ hovering(el) ──click──▶ selected(el) ──click same──▶ inline-editing(el)
//!                                            ▲    │                            │
//!                                            │    └──click other──▶ selected(el')
//!                                            └──────── commit / cancel ─────────┘
//! ```

use crate::config::EditorConfig;
use crate::observation::silently;
use pagecraft_dom::{Document, NodeId};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Hovering(NodeId),
    Selected(NodeId),
    InlineEditing(NodeId),
}

/// Read-only view handed to selection UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSnapshot {
    pub selected_element: Option<NodeId>,
    pub highlighted_element: Option<NodeId>,
    pub selected_selector: Option<String>,
    pub is_inline_editing: bool,
    pub ignore_class_names_in_selector: bool,
}

/// How a primary click on the page should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickIntent {
    /// Inside the editor's own container; the page keeps it
    PassThrough,
    /// Select a different element
    Select(NodeId),
    /// Second click on the element that is already selected
    Repeat(NodeId),
}

#[derive(Debug, Clone)]
pub struct SelectionTracker {
    hover_attribute: String,
    selected_attribute: String,
    container: Option<NodeId>,
    highlighted: Option<NodeId>,
    selected: Option<NodeId>,
    selected_selector: Option<String>,
    inline_editing: bool,
    ignore_class_names: bool,
}

impl SelectionTracker {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            hover_attribute: config.hover_attribute.clone(),
            selected_attribute: config.selected_attribute.clone(),
            container: None,
            highlighted: None,
            selected: None,
            selected_selector: None,
            inline_editing: false,
            ignore_class_names: config.ignore_class_names,
        }
    }

    /// The editor's own UI subtree, never intercepted
    pub fn set_container(&mut self, container: Option<NodeId>) {
        self.container = container;
    }

    pub fn container(&self) -> Option<NodeId> {
        self.container
    }

    pub fn is_editor_node(&self, doc: &Document, node: NodeId) -> bool {
        self.container
            .is_some_and(|container| doc.contains(container, node))
    }

    /// The element an event on `node` belongs to, unless it is editor UI
    pub fn page_element(&self, doc: &Document, node: NodeId) -> Option<NodeId> {
        let element = if doc.is_element(node) {
            node
        } else {
            doc.parent_element(node)?
        };
        (!self.is_editor_node(doc, element) && doc.is_connected(element)).then_some(element)
    }

    pub fn state(&self) -> SelectionState {
        match (self.selected, self.highlighted) {
            (Some(selected), _) if self.inline_editing => SelectionState::InlineEditing(selected),
            (Some(selected), _) => SelectionState::Selected(selected),
            (None, Some(highlighted)) => SelectionState::Hovering(highlighted),
            (None, None) => SelectionState::Idle,
        }
    }

    /// Move the hover marker. Returns whether it moved.
    pub fn hover(&mut self, doc: &mut Document, target: Option<NodeId>) -> bool {
        if target == self.highlighted {
            return false;
        }

        let previous = std::mem::replace(&mut self.highlighted, target);
        let attribute = self.hover_attribute.clone();
        silently(doc, |doc| {
            if let Some(previous) = previous {
                let _ = doc.remove_attribute(previous, &attribute);
            }
            if let Some(target) = target {
                let _ = doc.set_attribute(target, &attribute, "");
            }
        });
        true
    }

    pub fn classify_click(&self, doc: &Document, target: NodeId) -> ClickIntent {
        match self.page_element(doc, target) {
            None => ClickIntent::PassThrough,
            Some(element) if Some(element) == self.selected => ClickIntent::Repeat(element),
            Some(element) => ClickIntent::Select(element),
        }
    }

    pub fn select(&mut self, doc: &mut Document, element: NodeId, selector: Option<String>) {
        debug!(element = %element, selector = ?selector, "selected element");
        let previous = self.selected.replace(element);
        self.selected_selector = selector;
        self.inline_editing = false;

        let attribute = self.selected_attribute.clone();
        silently(doc, |doc| {
            if let Some(previous) = previous.filter(|previous| *previous != element) {
                let _ = doc.remove_attribute(previous, &attribute);
            }
            let _ = doc.set_attribute(element, &attribute, "");
        });
    }

    pub fn set_inline_editing(&mut self, editing: bool) {
        self.inline_editing = editing && self.selected.is_some();
    }

    /// Remove markers from the page without forgetting the state
    pub fn clear_decorations(&self, doc: &mut Document) {
        let marks = [
            (self.highlighted, &self.hover_attribute),
            (self.selected, &self.selected_attribute),
        ];
        silently(doc, |doc| {
            for (node, attribute) in marks {
                if let Some(node) = node {
                    let _ = doc.remove_attribute(node, attribute);
                }
            }
        });
    }

    /// Put markers back after the page changed under them.
    ///
    /// A selected element the page replaced is found again by its selector.
    pub fn redraw(&mut self, doc: &mut Document) {
        if let Some(selected) = self.selected.filter(|node| !doc.is_connected(*node)) {
            let found = self
                .selected_selector
                .as_deref()
                .and_then(|selector| doc.query_selector(selector).ok().flatten())
                .filter(|node| !self.is_editor_node(doc, *node));
            debug!(stale = %selected, found = ?found, "re-resolved selected element");
            self.selected = found;
            if found.is_none() {
                self.selected_selector = None;
                self.inline_editing = false;
            }
        }

        if self.highlighted.is_some_and(|node| !doc.is_connected(node)) {
            self.highlighted = None;
        }

        let marks = [
            (self.highlighted, self.hover_attribute.clone()),
            (self.selected, self.selected_attribute.clone()),
        ];
        silently(doc, |doc| {
            for (node, attribute) in marks {
                if let Some(node) = node {
                    let _ = doc.set_attribute(node, &attribute, "");
                }
            }
        });
    }

    /// Clear markers and forget everything
    pub fn clear(&mut self, doc: &mut Document) {
        self.clear_decorations(doc);
        self.highlighted = None;
        self.selected = None;
        self.selected_selector = None;
        self.inline_editing = false;
    }

    pub fn highlighted(&self) -> Option<NodeId> {
        self.highlighted
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn selected_selector(&self) -> Option<&str> {
        self.selected_selector.as_deref()
    }

    pub fn is_inline_editing(&self) -> bool {
        self.inline_editing
    }

    pub fn ignore_class_names(&self) -> bool {
        self.ignore_class_names
    }

    pub fn set_ignore_class_names(&mut self, ignore: bool) {
        self.ignore_class_names = ignore;
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            selected_element: self.selected,
            highlighted_element: self.highlighted,
            selected_selector: self.selected_selector.clone(),
            is_inline_editing: self.inline_editing,
            ignore_class_names_in_selector: self.ignore_class_names,
        }
    }
}
