//! # Edit Session
//!
//! One editing session over a host page. The session owns every piece of
//! editor state and is the only entry point the host talks to: it forwards
//! input events, reports page changes, and drives timers through
//! [`EditSession::tick`].
//!
//! ```text
//!  host events ──▶ EditSession ──▶ tracker / inline edit / rearrange
//!                      │                         │
//!                      │        new mutations    │
//!                      ▼◀────────────────────────┘
//!                  registry ──▶ history
//!                      │
//!                      ▼
//!                  executor ──▶ live document
//! ```
//!
//! Every registry change goes through the same path: record history, then
//! reconcile the page against the whole list.

use crate::config::EditorConfig;
use crate::debounce::Debouncer;
use crate::errors::EditorResult;
use crate::events::{EventDisposition, KeyEvent, MouseButton, PointerEvent};
use crate::executor::{ApplyOutcome, MutationExecutor, RevertReport};
use crate::ghost::Ghost;
use crate::injector::{GlobalInjector, NoopScriptRunner, ScriptError, ScriptRunner};
use crate::inline_edit::{is_eligible, key_action, InlineEditController, InlineOutcome, KeyAction};
use crate::mutations::{DeclarativeMutation, PositionTarget, Variation, VariationPayload};
use crate::observation::Observation;
use crate::rearrange::{DropPlan, RearrangeController, RearrangeSnapshot};
use crate::registry::MutationRegistry;
use crate::resolver::{ResolveOptions, SelectorResolver};
use crate::selection::{ClickIntent, SelectionSnapshot, SelectionTracker};
use crate::undo_stack::RegistryHistory;
use pagecraft_dom::{Document, MutationRecord, NodeId, RecordKind};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which kind of interception is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    /// Preview only; the page receives every event
    #[default]
    Off,
    /// Hover, select and inline edit
    Select,
    /// Drag elements to new positions
    Rearrange,
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditMode::Off => write!(f, "off"),
            EditMode::Select => write!(f, "select"),
            EditMode::Rearrange => write!(f, "rearrange"),
        }
    }
}

pub struct EditSession {
    config: EditorConfig,
    mode: EditMode,

    registry: MutationRegistry,
    history: RegistryHistory,

    observation: Observation,
    executor: MutationExecutor,
    injector: GlobalInjector,
    resolver: SelectorResolver,

    tracker: SelectionTracker,
    inline: InlineEditController,
    rearrange: RearrangeController,
    ghost: Ghost,

    /// CSS typed into the editor, committed to the registry once typing pauses
    css_commit: Debouncer<String>,
    resync: Debouncer<()>,

    /// Last dropped element and the selector its position mutation targets
    last_drop: Option<(NodeId, String)>,

    script_runner: Box<dyn ScriptRunner>,
    script_errors: Box<dyn FnMut(ScriptError)>,
}

impl EditSession {
    pub fn new(config: EditorConfig, variation: Variation) -> EditorResult<Self> {
        config.validate()?;
        let observation = Observation::new();

        Ok(Self {
            mode: EditMode::Off,
            registry: MutationRegistry::from_variation(variation),
            history: RegistryHistory::with_max_levels(config.history_depth),
            executor: MutationExecutor::new(observation.clone()),
            observation,
            injector: GlobalInjector::new(&config),
            resolver: SelectorResolver::new(&config),
            tracker: SelectionTracker::new(&config),
            inline: InlineEditController::new(config.editing_attribute.clone()),
            rearrange: RearrangeController::new(&config),
            ghost: Ghost::new(&config),
            css_commit: Debouncer::new(config.css_commit_delay()),
            resync: Debouncer::new(config.resync_delay()),
            last_drop: None,
            script_runner: Box::new(NoopScriptRunner),
            script_errors: Box::new(|_| {}),
            config,
        })
    }

    pub fn with_script_runner(mut self, runner: impl ScriptRunner + 'static) -> Self {
        self.script_runner = Box::new(runner);
        self
    }

    pub fn with_script_error_sink(mut self, sink: impl FnMut(ScriptError) + 'static) -> Self {
        self.script_errors = Box::new(sink);
        self
    }

    /// The editor's own UI subtree. Events inside it are never intercepted.
    pub fn set_container(&mut self, container: Option<NodeId>) {
        self.tracker.set_container(container);
    }

    /// Show the variation on the page
    pub fn start(&mut self, doc: &mut Document) -> EditorResult<ApplyOutcome> {
        let outcome = self.apply_registry(doc);
        self.sync_globals(doc)?;
        info!(mutations = self.registry.len(), "edit session started");
        Ok(outcome)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn registry(&self) -> &MutationRegistry {
        &self.registry
    }

    pub fn history(&self) -> &RegistryHistory {
        &self.history
    }

    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    pub fn executor(&self) -> &MutationExecutor {
        &self.executor
    }

    pub fn injector(&self) -> &GlobalInjector {
        &self.injector
    }

    /// Switch interception mode, tearing down whatever the old mode left behind
    pub fn set_mode(&mut self, doc: &mut Document, mode: EditMode) -> EditorResult<()> {
        if mode == self.mode {
            return Ok(());
        }

        self.commit_inline(doc)?;
        self.rearrange.end_drag(doc);
        self.ghost.remove(doc)?;
        self.tracker.clear(doc);
        self.flush_css();
        self.resync.cancel();
        self.last_drop = None;

        info!(from = %self.mode, to = %mode, "edit mode changed");
        self.mode = mode;
        Ok(())
    }

    // ---- input events --------------------------------------------------

    pub fn pointer_move(&mut self, doc: &mut Document, event: PointerEvent) -> EditorResult<EventDisposition> {
        match self.mode {
            EditMode::Off => Ok(EventDisposition::PASS),
            EditMode::Rearrange if self.rearrange.is_dragging() => {
                self.ghost.move_to(doc, event.x, event.y)?;
                if let Some(hovered) = self.page_element(doc, event.target) {
                    self.rearrange.pointer_move(doc, hovered, event.x, event.y);
                }
                Ok(EventDisposition::CAPTURE)
            }
            EditMode::Select | EditMode::Rearrange => {
                if !self.inline.is_active() {
                    let hovered = self.page_element(doc, event.target);
                    self.tracker.hover(doc, hovered);
                }
                Ok(EventDisposition::PASS)
            }
        }
    }

    pub fn pointer_down(&mut self, doc: &mut Document, event: PointerEvent) -> EditorResult<EventDisposition> {
        if self.mode != EditMode::Rearrange || event.button != MouseButton::Primary {
            return Ok(EventDisposition::PASS);
        }
        let Some(element) = self.page_element(doc, event.target) else {
            return Ok(EventDisposition::PASS);
        };
        if Some(element) == doc.body() || Some(element) == doc.document_element() {
            return Ok(EventDisposition::PASS);
        }
        let Some(selector) = self.resolve(doc, element) else {
            return Ok(EventDisposition::PASS);
        };

        self.tracker.hover(doc, None);
        self.rearrange.begin_drag(doc, element, selector);
        let mount = self
            .tracker
            .container()
            .or_else(|| doc.body())
            .unwrap_or_else(|| doc.root());
        self.ghost.show(doc, element, mount, event.x, event.y)?;
        Ok(EventDisposition::CAPTURE)
    }

    pub fn pointer_up(&mut self, doc: &mut Document, _event: PointerEvent) -> EditorResult<EventDisposition> {
        if self.mode != EditMode::Rearrange || !self.rearrange.is_dragging() {
            return Ok(EventDisposition::PASS);
        }
        self.finish_drag(doc)?;
        Ok(EventDisposition::CAPTURE)
    }

    pub fn click(&mut self, doc: &mut Document, event: PointerEvent) -> EditorResult<EventDisposition> {
        if self.mode == EditMode::Off || event.button != MouseButton::Primary {
            return Ok(EventDisposition::PASS);
        }
        if self.mode == EditMode::Rearrange {
            // keep links and buttons inert while rearranging
            return Ok(match self.page_element(doc, event.target) {
                Some(_) => EventDisposition::CAPTURE,
                None => EventDisposition::PASS,
            });
        }

        if let Some(editing) = self.inline.element() {
            if doc.contains(editing, event.target) {
                return Ok(EventDisposition::PASS);
            }
            self.commit_inline(doc)?;
        }

        match self.tracker.classify_click(doc, event.target) {
            ClickIntent::PassThrough => Ok(EventDisposition::PASS),
            ClickIntent::Select(element) => {
                let selector = self.resolve(doc, element);
                self.tracker.select(doc, element, selector);
                Ok(EventDisposition::CAPTURE)
            }
            ClickIntent::Repeat(element) => {
                if is_eligible(doc, element) {
                    self.tracker.clear_decorations(doc);
                    self.inline.enter(doc, element, &self.observation)?;
                    self.tracker.set_inline_editing(true);
                } else {
                    debug!(element = %element, "element has nested text; inline edit unavailable");
                }
                Ok(EventDisposition::CAPTURE)
            }
        }
    }

    pub fn key_down(&mut self, doc: &mut Document, event: &KeyEvent) -> EditorResult<EventDisposition> {
        if !self.inline.is_active() {
            return Ok(EventDisposition::PASS);
        }
        match key_action(event) {
            KeyAction::Commit => {
                self.commit_inline(doc)?;
            }
            KeyAction::Cancel => {
                self.cancel_inline(doc)?;
            }
            KeyAction::LineBreak => {
                self.inline.line_break(doc)?;
            }
            KeyAction::PassThrough => return Ok(EventDisposition::PASS),
        }
        Ok(EventDisposition::CAPTURE)
    }

    // ---- inline editing --------------------------------------------------

    /// Finish an open inline edit, keeping the typed content
    pub fn commit_inline(&mut self, doc: &mut Document) -> EditorResult<Option<InlineOutcome>> {
        let outcome = self.inline.commit(doc)?;
        if let Some(outcome) = &outcome {
            self.tracker.set_inline_editing(false);
            match outcome {
                InlineOutcome::Committed { element, html } => {
                    let selector = self
                        .resolve(doc, *element)
                        .or_else(|| self.tracker.selected_selector().map(str::to_string));
                    match selector {
                        Some(selector) => {
                            let mutation = DeclarativeMutation::set_html(selector, html.clone());
                            self.commit_mutations(doc, vec![mutation], "Edit text");
                        }
                        None => {
                            warn!(element = %element, "edited element has no selector");
                            self.apply_registry(doc);
                        }
                    }
                }
                _ => {
                    self.apply_registry(doc);
                }
            }
        }
        Ok(outcome)
    }

    /// Finish an open inline edit, discarding the typed content
    pub fn cancel_inline(&mut self, doc: &mut Document) -> EditorResult<Option<InlineOutcome>> {
        let outcome = self.inline.cancel(doc)?;
        if outcome.is_some() {
            self.tracker.set_inline_editing(false);
            self.apply_registry(doc);
        }
        Ok(outcome)
    }

    // ---- rearranging ----------------------------------------------------

    fn finish_drag(&mut self, doc: &mut Document) -> EditorResult<Option<DeclarativeMutation>> {
        let plan = self.rearrange.drop(doc);
        self.ghost.remove(doc)?;
        match plan {
            Some(plan) => Ok(self.record_move(doc, plan)),
            None => Ok(None),
        }
    }

    /// Turn a drop into a `position` mutation.
    ///
    /// Dropping the element that was dropped last replaces its trailing
    /// mutation instead of stacking a second one.
    fn record_move(&mut self, doc: &mut Document, plan: DropPlan) -> Option<DeclarativeMutation> {
        let before = self.registry.mutations();
        self.history.begin_batch(Rc::clone(&before));
        self.history.set_batch_description("Move element");
        let mutation = self.move_in_batch(doc, plan, before);
        self.history.end_batch(self.registry.mutations());
        mutation
    }

    /// Registry edits of one drop; the caller owns the history batch
    fn move_in_batch(
        &mut self,
        doc: &mut Document,
        plan: DropPlan,
        before: Rc<[DeclarativeMutation]>,
    ) -> Option<DeclarativeMutation> {
        let mut selector = plan.dragged_selector.clone();

        let repeat = self.registry.last().filter(|last| {
            last.is_position()
                && (last.selector == plan.dragged_selector
                    || self.last_drop.as_ref() == Some(&(plan.dragged, last.selector.clone())))
        });
        if let Some(last) = repeat {
            selector = last.selector.clone();
            self.registry.pop();
            self.apply_registry(doc);
        }

        let parent_selector = self
            .resolve(doc, plan.parent)
            .filter(|_| doc.is_connected(plan.parent));
        let Some(parent_selector) = parent_selector else {
            warn!(selector = %selector, "drop container vanished; keeping previous position");
            self.registry.restore(before);
            self.apply_registry(doc);
            return None;
        };
        let anchor = plan
            .before
            .filter(|node| doc.is_connected(*node) && doc.parent(*node) == Some(plan.parent));

        let in_place = doc.parent(plan.dragged) == Some(plan.parent)
            && doc.next_element_sibling(plan.dragged) == anchor;
        let mutation = if in_place {
            debug!(selector = %selector, "element dropped where it already is");
            None
        } else {
            let before_selector = anchor.and_then(|node| self.resolve(doc, node));
            Some(DeclarativeMutation::position(
                selector.clone(),
                PositionTarget::new(parent_selector, before_selector),
            ))
        };

        if let Some(mutation) = &mutation {
            info!(mutation = %mutation, parent = ?mutation.parent_selector, "element moved");
            self.registry.push(mutation.clone());
            self.last_drop = Some((plan.dragged, selector));
        } else {
            self.last_drop = None;
        }

        self.apply_registry(doc);
        mutation
    }

    // ---- host page synchronization --------------------------------------

    /// Drain the host's change records and schedule a resync if any came
    /// from the page itself. Returns how many did.
    pub fn host_changed(&mut self, doc: &mut Document, now: Instant) -> usize {
        let records = doc.take_records();
        if self.observation.is_suspended() {
            debug!(dropped = records.len(), "observation suspended; ignoring page changes");
            return 0;
        }

        let relevant = records
            .iter()
            .filter(|record| !self.is_editor_record(doc, record))
            .count();
        if relevant > 0 {
            debug!(records = relevant, "page changed; resync scheduled");
            self.resync.schedule((), now);
        }
        relevant
    }

    fn is_editor_record(&self, doc: &Document, record: &MutationRecord) -> bool {
        if let RecordKind::Attributes { name } = &record.kind {
            if self.config.reserved_attributes().contains(&name.as_str()) {
                return true;
            }
        }
        self.tracker.is_editor_node(doc, record.target)
            || self.injector.is_injected(doc, record.target)
            || self.ghost.contains(doc, record.target)
    }

    /// Run timers that are due
    pub fn tick(&mut self, doc: &mut Document, now: Instant) -> EditorResult<()> {
        if let Some(css) = self.css_commit.poll(now) {
            debug!(bytes = css.len(), "committing global CSS");
            self.registry.set_css(css);
        }
        if !self.rearrange.is_dragging() && self.resync.poll(now).is_some() {
            self.resync_now(doc)?;
        }
        Ok(())
    }

    /// Re-apply everything right away, e.g. after the host re-rendered
    pub fn resync_now(&mut self, doc: &mut Document) -> EditorResult<ApplyOutcome> {
        self.resync.cancel();
        self.tracker.clear_decorations(doc);
        let outcome = self.executor.resync(doc);
        self.tracker.redraw(doc);
        self.sync_globals(doc)?;
        Ok(outcome)
    }

    // ---- global CSS / JS --------------------------------------------------

    /// Preview CSS immediately; commit it once typing pauses
    pub fn set_css_draft(&mut self, doc: &mut Document, css: &str, now: Instant) -> EditorResult<()> {
        self.injector.set_css(doc, css)?;
        self.css_commit.schedule(css.to_string(), now);
        Ok(())
    }

    pub fn set_css(&mut self, doc: &mut Document, css: &str) -> EditorResult<()> {
        self.css_commit.cancel();
        self.injector.set_css(doc, css)?;
        self.registry.set_css(css);
        Ok(())
    }

    pub fn set_js(&mut self, doc: &mut Document, js: &str) -> EditorResult<()> {
        self.registry.set_js(js);
        self.injector
            .set_js(doc, js, self.script_runner.as_mut(), &mut *self.script_errors)?;
        Ok(())
    }

    fn flush_css(&mut self) {
        if let Some(css) = self.css_commit.flush() {
            self.registry.set_css(css);
        }
    }

    fn sync_globals(&mut self, doc: &mut Document) -> EditorResult<()> {
        let css = self
            .css_commit
            .pending()
            .cloned()
            .unwrap_or_else(|| self.registry.css().to_string());
        self.injector.set_css(doc, &css)?;
        let js = self.registry.js().to_string();
        self.injector
            .set_js(doc, &js, self.script_runner.as_mut(), &mut *self.script_errors)?;
        Ok(())
    }

    // ---- registry edits --------------------------------------------------

    pub fn add_mutations(
        &mut self,
        doc: &mut Document,
        mutations: Vec<DeclarativeMutation>,
    ) -> EditorResult<ApplyOutcome> {
        self.commit_inline(doc)?;
        Ok(self.commit_mutations(doc, mutations, "Add changes"))
    }

    pub fn remove_mutation(&mut self, doc: &mut Document, index: usize) -> EditorResult<DeclarativeMutation> {
        self.commit_inline(doc)?;
        let before = self.registry.mutations();
        let removed = self.registry.remove(index)?;
        self.history.record(
            before,
            self.registry.mutations(),
            Some(format!("Remove {}", removed)),
        );
        self.last_drop = None;
        self.apply_registry(doc);
        Ok(removed)
    }

    /// Replace the whole list, e.g. after editing it in the side panel
    pub fn replace_mutations(
        &mut self,
        doc: &mut Document,
        mutations: Vec<DeclarativeMutation>,
    ) -> EditorResult<ApplyOutcome> {
        self.commit_inline(doc)?;
        let before = self.registry.mutations();
        self.registry.replace(mutations);
        self.history
            .record(before, self.registry.mutations(), Some("Replace changes".to_string()));
        self.last_drop = None;
        Ok(self.apply_registry(doc))
    }

    fn commit_mutations(
        &mut self,
        doc: &mut Document,
        mutations: Vec<DeclarativeMutation>,
        description: &str,
    ) -> ApplyOutcome {
        let before = self.registry.mutations();
        self.registry.extend(mutations);
        self.history
            .record(before, self.registry.mutations(), Some(description.to_string()));
        self.apply_registry(doc)
    }

    pub fn undo(&mut self, doc: &mut Document) -> EditorResult<bool> {
        self.commit_inline(doc)?;
        let Some(snapshot) = self.history.undo() else {
            return Ok(false);
        };
        self.registry.restore(snapshot);
        self.last_drop = None;
        self.apply_registry(doc);
        Ok(true)
    }

    pub fn redo(&mut self, doc: &mut Document) -> EditorResult<bool> {
        self.commit_inline(doc)?;
        let Some(snapshot) = self.history.redo() else {
            return Ok(false);
        };
        self.registry.restore(snapshot);
        self.last_drop = None;
        self.apply_registry(doc);
        Ok(true)
    }

    /// Rewrite the selected element's markup with `transform` and record
    /// the result as a `set html` change.
    pub fn transform_selected(
        &mut self,
        doc: &mut Document,
        transform: impl FnOnce(&str) -> String,
    ) -> EditorResult<Option<DeclarativeMutation>> {
        self.commit_inline(doc)?;
        let Some(element) = self.tracker.selected() else {
            return Ok(None);
        };

        let current = doc.inner_html(element);
        let next = transform(&current);
        if next == current {
            return Ok(None);
        }
        let Some(selector) = self.resolve(doc, element) else {
            return Ok(None);
        };

        let mutation = DeclarativeMutation::set_html(selector, next);
        self.commit_mutations(doc, vec![mutation.clone()], "Transform copy");
        Ok(Some(mutation))
    }

    fn apply_registry(&mut self, doc: &mut Document) -> ApplyOutcome {
        self.tracker.clear_decorations(doc);
        let outcome = self.executor.apply(doc, self.registry.mutations());
        self.tracker.redraw(doc);
        outcome
    }

    // ---- views ------------------------------------------------------------

    pub fn selection(&self) -> SelectionSnapshot {
        self.tracker.snapshot()
    }

    pub fn rearrange_state(&self) -> RearrangeSnapshot {
        self.rearrange.snapshot()
    }

    pub fn set_ignore_class_names(&mut self, ignore: bool) {
        self.tracker.set_ignore_class_names(ignore);
    }

    /// Current variation, including CSS still waiting to be committed
    pub fn variation(&mut self) -> Variation {
        self.flush_css();
        self.registry.to_variation()
    }

    pub fn payload(&mut self) -> VariationPayload {
        self.variation().to_payload()
    }

    /// End the session: leave every mode, take the variation off the page,
    /// and hand back the final variation.
    pub fn close(mut self, doc: &mut Document) -> EditorResult<(Variation, RevertReport)> {
        self.set_mode(doc, EditMode::Off)?;
        self.injector.clear(doc)?;
        let report = self.executor.revert(doc);
        let variation = self.variation();
        info!(mutations = variation.dom_mutations.len(), "edit session closed");
        Ok((variation, report))
    }

    fn resolve(&self, doc: &Document, element: NodeId) -> Option<String> {
        let options = ResolveOptions {
            ignore_class_names: self.tracker.ignore_class_names(),
        };
        self.resolver.resolve(doc, element, options)
    }

    fn page_element(&self, doc: &Document, node: NodeId) -> Option<NodeId> {
        self.tracker
            .page_element(doc, node)
            .filter(|element| !self.ghost.contains(doc, *element))
            .filter(|element| !self.injector.is_injected(doc, *element))
    }
}
