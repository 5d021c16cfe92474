//! # Mutation Executor
//!
//! Applies an ordered mutation list to the live document and keeps exactly
//! one [`RevertHandle`] for the pass currently on the page.
//!
//! ## Reconciliation
//!
//! Every apply first reverts the previous pass, then applies the full list
//! again. Both happen under one observation suspension with the resulting
//! change records drained, so observers never see the intermediate state.
//! Calling apply twice with the same list never double-applies.
//!
//! ## Inverses
//!
//! Each action records the state it overwrote:
//!
//! - attribute, `class` and `style` changes keep the previous attribute value
//! - `html` keeps the exact previous child nodes, detached but intact
//! - `position` keeps the previous parent and next sibling
//!
//! Steps are undone in reverse order. A step whose node the host has since
//! removed from the page is skipped.

use crate::mutations::{
    DeclarativeMutation, MutationAction, MutationKind, ATTR_CLASS, ATTR_STYLE,
};
use crate::observation::{silently, Observation};
use pagecraft_dom::{
    merge_declarations, parse_declarations, serialize_declarations, Document, DomResult, NodeId,
};
use std::rc::Rc;
use tracing::{debug, info, instrument, warn};

/// Inverse of one DOM change
#[derive(Debug, Clone, PartialEq)]
pub enum RevertStep {
    Attribute {
        node: NodeId,
        name: String,
        previous: Option<String>,
    },
    Children {
        node: NodeId,
        previous: Vec<NodeId>,
    },
    Position {
        node: NodeId,
        /// Where the move put `node`
        destination: NodeId,
        parent: Option<NodeId>,
        next_sibling: Option<NodeId>,
    },
}

impl RevertStep {
    pub fn node(&self) -> NodeId {
        match self {
            RevertStep::Attribute { node, .. }
            | RevertStep::Children { node, .. }
            | RevertStep::Position { node, .. } => *node,
        }
    }

    /// Returns `Ok(false)` when the step no longer applies
    fn undo(self, doc: &mut Document) -> DomResult<bool> {
        match self {
            RevertStep::Attribute {
                node,
                name,
                previous,
            } => {
                if !doc.is_connected(node) {
                    return Ok(false);
                }
                match previous {
                    Some(value) => doc.set_attribute(node, &name, &value)?,
                    None => {
                        doc.remove_attribute(node, &name)?;
                    }
                }
                Ok(true)
            }
            RevertStep::Children { node, previous } => {
                if !doc.is_connected(node) {
                    return Ok(false);
                }
                doc.replace_children(node, previous)?;
                Ok(true)
            }
            RevertStep::Position {
                node,
                destination,
                parent,
                next_sibling,
            } => match parent {
                _ if !doc.is_connected(node) || doc.parent(node) != Some(destination) => Ok(false),
                Some(parent) if doc.is_connected(parent) => {
                    let reference = next_sibling.filter(|next| doc.parent(*next) == Some(parent));
                    doc.insert_before(parent, node, reference)?;
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => {
                    doc.detach(node)?;
                    Ok(true)
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevertReport {
    pub reverted: usize,
    pub skipped: usize,
}

/// The inverse of one apply pass.
///
/// Consumed by [`RevertHandle::revert`], so it can run at most once.
#[derive(Debug, Default)]
#[must_use = "dropping a revert handle makes the applied pass irreversible"]
pub struct RevertHandle {
    steps: Vec<RevertStep>,
}

impl RevertHandle {
    pub fn steps(&self) -> &[RevertStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn revert(self, doc: &mut Document) -> RevertReport {
        let mut report = RevertReport::default();

        for step in self.steps.into_iter().rev() {
            let node = step.node();
            match step.undo(doc) {
                Ok(true) => report.reverted += 1,
                Ok(false) => {
                    debug!(node = %node, "revert target left the page; skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(node = %node, error = %e, "revert step failed");
                    report.skipped += 1;
                }
            }
        }

        report
    }
}

/// Apply `mutations` in order and return the inverse of everything done.
///
/// This is the whole replay runtime: no observation, no reconciliation.
pub fn apply_mutations(doc: &mut Document, mutations: &[DeclarativeMutation]) -> RevertHandle {
    let mut steps = Vec::new();

    for mutation in mutations {
        let targets = match doc.query_selector_all(&mutation.selector) {
            Ok(targets) => targets,
            Err(e) => {
                warn!(selector = %mutation.selector, error = %e, "skipping mutation with invalid selector");
                continue;
            }
        };

        if targets.is_empty() {
            debug!(selector = %mutation.selector, "selector matched nothing; mutation waits for its target");
            continue;
        }

        debug!(mutation = %mutation, matches = targets.len(), "applying mutation");

        if let MutationKind::Position = mutation.kind() {
            apply_position(doc, mutation, &targets, &mut steps);
            continue;
        }

        for target in targets {
            if let Err(e) = apply_to(doc, mutation, target, &mut steps) {
                warn!(mutation = %mutation, node = %target, error = %e, "mutation failed on target");
            }
        }
    }

    RevertHandle { steps }
}

fn apply_to(
    doc: &mut Document,
    mutation: &DeclarativeMutation,
    target: NodeId,
    steps: &mut Vec<RevertStep>,
) -> DomResult<()> {
    let value = mutation.value_or_empty();

    match mutation.kind() {
        MutationKind::Html => {
            let markup = match mutation.action {
                MutationAction::Append => doc.inner_html(target) + value,
                MutationAction::Set => value.to_string(),
                MutationAction::Remove => String::new(),
            };
            let previous = doc.set_inner_html(target, &markup)?;
            steps.push(RevertStep::Children {
                node: target,
                previous,
            });
        }
        MutationKind::Class => {
            let mut classes = match mutation.action {
                MutationAction::Set => Vec::new(),
                _ => doc.class_list(target),
            };
            for token in value.split_whitespace() {
                match mutation.action {
                    MutationAction::Remove => classes.retain(|class| class != token),
                    _ if classes.iter().any(|class| class == token) => {}
                    _ => classes.push(token.to_string()),
                }
            }
            let next = (!classes.is_empty()).then(|| classes.join(" "));
            write_attribute(doc, target, ATTR_CLASS, next, steps)?;
        }
        MutationKind::Style => {
            let next = match mutation.action {
                MutationAction::Set => Some(value.to_string()),
                MutationAction::Append => {
                    let mut declarations = doc
                        .attribute(target, ATTR_STYLE)
                        .map(parse_declarations)
                        .unwrap_or_default();
                    merge_declarations(&mut declarations, parse_declarations(value));
                    Some(serialize_declarations(&declarations)).filter(|s| !s.is_empty())
                }
                MutationAction::Remove if value.trim().is_empty() => None,
                MutationAction::Remove => {
                    let names = style_property_names(value);
                    let remaining: Vec<_> = doc
                        .attribute(target, ATTR_STYLE)
                        .map(parse_declarations)
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|(property, _)| !names.contains(property))
                        .collect();
                    Some(serialize_declarations(&remaining)).filter(|s| !s.is_empty())
                }
            };
            write_attribute(doc, target, ATTR_STYLE, next, steps)?;
        }
        MutationKind::Attribute(name) => {
            let name = name.to_ascii_lowercase();
            let next = match mutation.action {
                MutationAction::Set => Some(value.to_string()),
                MutationAction::Append => Some(
                    doc.attribute(target, &name)
                        .map(|existing| format!("{}{}", existing, value))
                        .unwrap_or_else(|| value.to_string()),
                ),
                MutationAction::Remove => None,
            };
            write_attribute(doc, target, &name, next, steps)?;
        }
        MutationKind::Position => {}
    }

    Ok(())
}

/// `remove style` takes property names, bare or as declarations
fn style_property_names(value: &str) -> Vec<String> {
    value
        .split([';', ','])
        .filter_map(|part| {
            let name = part.split(':').next().unwrap_or("").trim();
            (!name.is_empty()).then(|| name.to_ascii_lowercase())
        })
        .collect()
}

fn write_attribute(
    doc: &mut Document,
    target: NodeId,
    name: &str,
    next: Option<String>,
    steps: &mut Vec<RevertStep>,
) -> DomResult<()> {
    let previous = doc.attribute(target, name).map(str::to_string);
    if previous == next {
        return Ok(());
    }

    match &next {
        Some(value) => doc.set_attribute(target, name, value)?,
        None => {
            doc.remove_attribute(target, name)?;
        }
    }

    steps.push(RevertStep::Attribute {
        node: target,
        name: name.to_string(),
        previous,
    });
    Ok(())
}

fn apply_position(
    doc: &mut Document,
    mutation: &DeclarativeMutation,
    targets: &[NodeId],
    steps: &mut Vec<RevertStep>,
) {
    if mutation.action != MutationAction::Set {
        warn!(mutation = %mutation, "position only supports the set action; ignoring");
        return;
    }

    let Some(target) = mutation.position_target() else {
        warn!(mutation = %mutation, "position mutation without parentSelector; ignoring");
        return;
    };

    let parent = match doc.query_selector(&target.parent_selector) {
        Ok(Some(parent)) => parent,
        Ok(None) => {
            debug!(parent = %target.parent_selector, "position parent not found");
            return;
        }
        Err(e) => {
            warn!(parent = %target.parent_selector, error = %e, "invalid parent selector");
            return;
        }
    };

    let before = match &target.insert_before_selector {
        Some(selector) => match doc.query_selector(selector) {
            Ok(found) => found.filter(|node| doc.parent(*node) == Some(parent)),
            Err(e) => {
                warn!(before = %selector, error = %e, "invalid insert-before selector; appending");
                None
            }
        },
        None => None,
    };

    for node in targets {
        if let Err(e) = move_node(doc, *node, parent, before, steps) {
            warn!(node = %node, error = %e, "position mutation failed on target");
        }
    }
}

fn move_node(
    doc: &mut Document,
    node: NodeId,
    parent: NodeId,
    before: Option<NodeId>,
    steps: &mut Vec<RevertStep>,
) -> DomResult<()> {
    if before == Some(node) {
        return Ok(());
    }
    if doc.contains(node, parent) {
        warn!(node = %node, parent = %parent, "moving an element into itself; ignoring");
        return Ok(());
    }

    let old_parent = doc.parent(node);
    let old_next = doc.next_sibling(node);
    if old_parent == Some(parent) && old_next == before {
        return Ok(());
    }

    doc.insert_before(parent, node, before)?;
    steps.push(RevertStep::Position {
        node,
        destination: parent,
        parent: old_parent,
        next_sibling: old_next,
    });
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The previous pass was reverted and the list applied again
    Applied {
        steps: usize,
        reverted: usize,
        skipped: usize,
    },
    /// The list is already on the page
    Unchanged,
    /// Observation is suspended; the list is applied once it resumes
    Deferred,
}

/// Keeps the page reconciled with the current mutation list.
#[derive(Debug)]
pub struct MutationExecutor {
    observation: Observation,
    revert: Option<RevertHandle>,
    applied: Option<Rc<[DeclarativeMutation]>>,
    deferred: Option<Rc<[DeclarativeMutation]>>,
}

impl MutationExecutor {
    pub fn new(observation: Observation) -> Self {
        Self {
            observation,
            revert: None,
            applied: None,
            deferred: None,
        }
    }

    /// Reconcile the page with `mutations`.
    ///
    /// A list identical (by pointer) to the one already applied is left alone.
    #[instrument(skip_all, fields(mutations = mutations.len()))]
    pub fn apply(&mut self, doc: &mut Document, mutations: Rc<[DeclarativeMutation]>) -> ApplyOutcome {
        let unchanged = self.deferred.is_none()
            && self
                .applied
                .as_ref()
                .is_some_and(|applied| Rc::ptr_eq(applied, &mutations));
        if unchanged {
            return ApplyOutcome::Unchanged;
        }
        self.reconcile(doc, mutations)
    }

    /// Revert and re-apply the current list, e.g. after the host re-rendered
    pub fn resync(&mut self, doc: &mut Document) -> ApplyOutcome {
        match self.deferred.clone().or_else(|| self.applied.clone()) {
            Some(mutations) => self.reconcile(doc, mutations),
            None => ApplyOutcome::Unchanged,
        }
    }

    /// Perform an apply that was deferred while observation was suspended
    pub fn flush_deferred(&mut self, doc: &mut Document) -> ApplyOutcome {
        match self.deferred.clone() {
            Some(mutations) => self.reconcile(doc, mutations),
            None => ApplyOutcome::Unchanged,
        }
    }

    fn reconcile(&mut self, doc: &mut Document, mutations: Rc<[DeclarativeMutation]>) -> ApplyOutcome {
        if self.observation.is_suspended() {
            debug!(depth = self.observation.depth(), "observation suspended; deferring apply");
            self.deferred = Some(mutations);
            return ApplyOutcome::Deferred;
        }

        let _guard = self.observation.suspend();
        let previous = self.revert.take();
        let (report, handle) = silently(doc, |doc| {
            let report = previous.map(|handle| handle.revert(doc)).unwrap_or_default();
            (report, apply_mutations(doc, &mutations))
        });

        info!(
            mutations = mutations.len(),
            steps = handle.len(),
            reverted = report.reverted,
            skipped = report.skipped,
            "applied mutation list"
        );

        let outcome = ApplyOutcome::Applied {
            steps: handle.len(),
            reverted: report.reverted,
            skipped: report.skipped,
        };
        self.revert = Some(handle);
        self.applied = Some(mutations);
        self.deferred = None;
        outcome
    }

    /// Undo the current pass and forget the applied list
    pub fn revert(&mut self, doc: &mut Document) -> RevertReport {
        self.applied = None;
        self.deferred = None;
        let Some(handle) = self.revert.take() else {
            return RevertReport::default();
        };

        let _guard = self.observation.suspend();
        let report = silently(doc, |doc| handle.revert(doc));
        info!(reverted = report.reverted, skipped = report.skipped, "reverted mutation list");
        report
    }

    pub fn applied(&self) -> Option<&Rc<[DeclarativeMutation]>> {
        self.applied.as_ref()
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn observation(&self) -> &Observation {
        &self.observation
    }
}
