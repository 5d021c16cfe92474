//! # Inline-Edit Controller
//!
//! Content-editable editing of a selected element.
//!
//! While an edit is open the element holds deep clones of its children, so
//! the user types into copies and the original nodes stay untouched. Commit
//! and cancel both put the originals back; a commit reports the edited
//! markup, which the caller turns into a `set html` mutation and lets the
//! executor apply like any other change.
//!
//! Observation stays suspended for the whole edit.

use crate::errors::{EditorError, EditorResult};
use crate::events::{Key, KeyEvent};
use crate::observation::{silently, Observation, SuspendGuard};
use pagecraft_dom::{is_raw_text_element, Document, NodeId};
use tracing::{debug, info};

const CONTENT_EDITABLE: &str = "contenteditable";

/// An element is editable when no descendant element carries text of its own.
pub fn is_eligible(doc: &Document, element: NodeId) -> bool {
    let Some(tag) = doc.tag_name(element) else {
        return false;
    };
    if is_raw_text_element(tag) {
        return false;
    }

    !doc.descendants(element)
        .filter(|node| doc.is_element(*node))
        .any(|node| has_own_text(doc, node))
}

fn has_own_text(doc: &Document, element: NodeId) -> bool {
    doc.children(element)
        .iter()
        .filter(|child| doc.is_text(**child))
        .any(|child| doc.text(*child).is_some_and(|text| !text.trim().is_empty()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Commit,
    Cancel,
    LineBreak,
    /// Ordinary typing; the host's editing handles it
    PassThrough,
}

pub fn key_action(event: &KeyEvent) -> KeyAction {
    match event.key {
        Key::Enter if event.modifiers.alt => KeyAction::LineBreak,
        Key::Enter if !event.modifiers.any() => KeyAction::Commit,
        Key::Escape => KeyAction::Cancel,
        _ => KeyAction::PassThrough,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineOutcome {
    Committed { element: NodeId, html: String },
    Unchanged { element: NodeId },
    Cancelled { element: NodeId },
}

impl InlineOutcome {
    pub fn element(&self) -> NodeId {
        match self {
            InlineOutcome::Committed { element, .. }
            | InlineOutcome::Unchanged { element }
            | InlineOutcome::Cancelled { element } => *element,
        }
    }
}

#[derive(Debug)]
struct ActiveEdit {
    element: NodeId,
    original_children: Vec<NodeId>,
    original_html: String,
    previous_editable: Option<String>,
    _guard: SuspendGuard,
}

#[derive(Debug)]
pub struct InlineEditController {
    editing_attribute: String,
    active: Option<ActiveEdit>,
}

impl InlineEditController {
    pub fn new(editing_attribute: impl Into<String>) -> Self {
        Self {
            editing_attribute: editing_attribute.into(),
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn element(&self) -> Option<NodeId> {
        self.active.as_ref().map(|edit| edit.element)
    }

    /// Markup the element had when the edit began
    pub fn original_html(&self) -> Option<&str> {
        self.active.as_ref().map(|edit| edit.original_html.as_str())
    }

    pub fn enter(
        &mut self,
        doc: &mut Document,
        element: NodeId,
        observation: &Observation,
    ) -> EditorResult<()> {
        if self.active.is_some() {
            return Ok(());
        }
        if !is_eligible(doc, element) {
            return Err(EditorError::NotEditable(element));
        }

        let guard = observation.suspend();
        let editing_attribute = self.editing_attribute.clone();

        let (original_children, original_html, previous_editable) =
            silently(doc, |doc| -> EditorResult<_> {
                let original_html = doc.inner_html(element);
                let children = doc.children(element).to_vec();
                let mut clones = Vec::with_capacity(children.len());
                for child in children {
                    clones.push(doc.deep_clone(child)?);
                }
                let original_children = doc.replace_children(element, clones)?;

                let previous_editable = doc.attribute(element, CONTENT_EDITABLE).map(str::to_string);
                doc.set_attribute(element, CONTENT_EDITABLE, "true")?;
                doc.set_attribute(element, &editing_attribute, "")?;
                doc.focus(element);
                doc.place_caret_at_end(element)?;
                Ok((original_children, original_html, previous_editable))
            })?;

        info!(element = %element, "entered inline edit");
        self.active = Some(ActiveEdit {
            element,
            original_children,
            original_html,
            previous_editable,
            _guard: guard,
        });
        Ok(())
    }

    /// Insert a literal line break at the caret
    pub fn line_break(&mut self, doc: &mut Document) -> EditorResult<()> {
        let Some(edit) = &self.active else {
            return Ok(());
        };
        let caret_inside = doc
            .caret()
            .is_some_and(|caret| doc.contains(edit.element, caret.node));
        if !caret_inside {
            doc.place_caret_at_end(edit.element)?;
        }
        doc.insert_line_break()?;
        Ok(())
    }

    /// End the edit, keeping what was typed
    pub fn commit(&mut self, doc: &mut Document) -> EditorResult<Option<InlineOutcome>> {
        let Some(edit) = self.active.take() else {
            return Ok(None);
        };
        let element = edit.element;
        let html = doc.inner_html(element);
        let unchanged = html == edit.original_html;
        self.finish(doc, edit)?;

        debug!(element = %element, unchanged, "committed inline edit");
        Ok(Some(if unchanged {
            InlineOutcome::Unchanged { element }
        } else {
            InlineOutcome::Committed { element, html }
        }))
    }

    /// End the edit, discarding what was typed
    pub fn cancel(&mut self, doc: &mut Document) -> EditorResult<Option<InlineOutcome>> {
        let Some(edit) = self.active.take() else {
            return Ok(None);
        };
        let element = edit.element;
        self.finish(doc, edit)?;
        debug!(element = %element, "cancelled inline edit");
        Ok(Some(InlineOutcome::Cancelled { element }))
    }

    fn finish(&self, doc: &mut Document, edit: ActiveEdit) -> EditorResult<()> {
        let ActiveEdit {
            element,
            original_children,
            previous_editable,
            _guard,
            ..
        } = edit;

        // Records from typing into the clones are meaningless once they are gone.
        let pending: Vec<_> = doc
            .take_records()
            .into_iter()
            .filter(|record| !doc.contains(element, record.target) && doc.is_connected(record.target))
            .collect();

        let restored = restore(
            doc,
            element,
            original_children,
            previous_editable,
            &self.editing_attribute,
        );

        doc.take_records();
        doc.restore_records(pending);
        restored
    }
}

fn restore(
    doc: &mut Document,
    element: NodeId,
    original_children: Vec<NodeId>,
    previous_editable: Option<String>,
    editing_attribute: &str,
) -> EditorResult<()> {
    doc.replace_children(element, original_children)?;
    match previous_editable {
        Some(value) => doc.set_attribute(element, CONTENT_EDITABLE, &value)?,
        None => {
            doc.remove_attribute(element, CONTENT_EDITABLE)?;
        }
    }
    doc.remove_attribute(element, editing_attribute)?;
    doc.blur();
    Ok(())
}
