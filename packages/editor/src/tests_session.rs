use crate::config::EditorConfig;
use crate::events::{EventDisposition, Key, KeyEvent, PointerEvent};
use crate::executor::ApplyOutcome;
use crate::injector::{ScriptError, ScriptRunner};
use crate::mutations::{DeclarativeMutation, MutationAction, Variation};
use crate::session::{EditMode, EditSession};
use pagecraft_dom::{Document, NodeId, Rect};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

const PAGE: &str = r#"<div id="a"><p id="x">Hello</p><p id="y">World</p></div><aside id="editor"><button id="save">Save</button></aside>"#;

fn by_id(doc: &Document, id: &str) -> NodeId {
    doc.query_selector(&format!("#{}", id)).unwrap().unwrap()
}

fn start(markup: &str, variation: Variation, mode: EditMode) -> (Document, EditSession) {
    let mut doc = Document::parse(markup);
    doc.take_records();
    let mut session = EditSession::new(EditorConfig::default(), variation).unwrap();
    session.set_container(doc.query_selector("#editor").unwrap());
    session.start(&mut doc).unwrap();
    session.set_mode(&mut doc, mode).unwrap();
    (doc, session)
}

fn set_class(selector: &str, class: &str) -> DeclarativeMutation {
    DeclarativeMutation::new(selector, MutationAction::Set, "class").with_value(class)
}

fn marked(doc: &Document, attribute: &str) -> Vec<NodeId> {
    doc.query_selector_all(&format!("[{}]", attribute)).unwrap()
}

#[test]
fn test_clicks_select_then_edit() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let x = by_id(&doc, "x");

    let text = doc.children(x)[0];
    let first = session.click(&mut doc, PointerEvent::at(text)).unwrap();
    assert_eq!(first, EventDisposition::CAPTURE);
    assert_eq!(session.selection().selected_element, Some(x));
    assert_eq!(session.selection().selected_selector.as_deref(), Some("#x"));
    assert!(!session.selection().is_inline_editing);

    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    assert!(session.selection().is_inline_editing);
    assert_eq!(doc.attribute(x, "contenteditable"), Some("true"));
    assert!(session.observation().is_suspended());
}

#[test]
fn test_editor_container_clicks_pass_through() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let save = by_id(&doc, "save");

    let disposition = session.click(&mut doc, PointerEvent::at(save)).unwrap();
    assert_eq!(disposition, EventDisposition::PASS);
    assert_eq!(session.selection().selected_element, None);
}

#[test]
fn test_off_mode_intercepts_nothing() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Off);
    let x = by_id(&doc, "x");
    assert_eq!(
        session.click(&mut doc, PointerEvent::at(x)).unwrap(),
        EventDisposition::PASS
    );
    assert_eq!(
        session.pointer_move(&mut doc, PointerEvent::at(x)).unwrap(),
        EventDisposition::PASS
    );
    assert!(marked(&doc, &EditorConfig::default().hover_attribute).is_empty());
}

#[test]
fn test_click_outside_commits_inline_edit() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let x = by_id(&doc, "x");
    let y = by_id(&doc, "y");
    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    session.click(&mut doc, PointerEvent::at(x)).unwrap();

    let typed = doc.children(x)[0];
    doc.set_text(typed, "Hi").unwrap();
    // clicks inside the edited element belong to the caret
    assert_eq!(
        session.click(&mut doc, PointerEvent::at(typed)).unwrap(),
        EventDisposition::PASS
    );

    session.click(&mut doc, PointerEvent::at(y)).unwrap();

    let mutations = session.registry().mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0], DeclarativeMutation::set_html("#x", "Hi"));
    assert_eq!(doc.inner_html(x), "Hi");
    assert_eq!(session.selection().selected_element, Some(y));
    assert!(!session.observation().is_suspended());
}

#[test]
fn test_alt_enter_inserts_line_break() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let x = by_id(&doc, "x");
    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    session.click(&mut doc, PointerEvent::at(x)).unwrap();

    let alt_enter = KeyEvent::with_modifiers(Key::Enter, crate::events::Modifiers::ALT);
    assert!(session.key_down(&mut doc, &alt_enter).unwrap().is_captured());
    doc.insert_text("there").unwrap();
    session.key_down(&mut doc, &KeyEvent::new(Key::Enter)).unwrap();

    assert_eq!(
        session.registry().last(),
        Some(&DeclarativeMutation::set_html("#x", "Hello<br>there"))
    );
}

#[test]
fn test_registry_edits_commit_open_inline_edit_first() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let x = by_id(&doc, "x");
    let y = by_id(&doc, "y");
    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    doc.insert_text(" there").unwrap();

    let outcome = session
        .add_mutations(&mut doc, vec![set_class("#y", "muted")])
        .unwrap();
    assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
    assert!(!session.selection().is_inline_editing);
    assert!(doc.has_class(y, "muted"));
    assert_eq!(doc.inner_html(x), "Hello there");

    let mutations = session.registry().mutations();
    assert_eq!(mutations.len(), 2);
    assert_eq!(mutations[0].attribute, "html");
    assert_eq!(mutations[1].attribute, "class");

    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    doc.insert_text("!").unwrap();
    session.replace_mutations(&mut doc, Vec::new()).unwrap();
    assert!(!session.selection().is_inline_editing);
    assert_eq!(doc.inner_html(x), "Hello");

    session.undo(&mut doc).unwrap();
    assert_eq!(session.registry().len(), 3);
    assert_eq!(doc.inner_html(x), "Hello there!");
}

#[test]
fn test_mode_switch_clears_markers() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let config = EditorConfig::default();
    let x = by_id(&doc, "x");
    let y = by_id(&doc, "y");
    session.pointer_move(&mut doc, PointerEvent::at(y)).unwrap();
    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    assert_eq!(marked(&doc, &config.hover_attribute), vec![y]);
    assert_eq!(marked(&doc, &config.selected_attribute), vec![x]);

    session.set_mode(&mut doc, EditMode::Rearrange).unwrap();
    assert!(marked(&doc, &config.hover_attribute).is_empty());
    assert!(marked(&doc, &config.selected_attribute).is_empty());
    assert_eq!(session.selection().selected_element, None);
    assert_eq!(doc.pending_records(), 0);
}

#[test]
fn test_host_rerender_is_resynced_after_debounce() {
    let variation = Variation {
        dom_mutations: vec![set_class("#x", "promo")],
        ..Variation::default()
    };
    let (mut doc, mut session) = start(PAGE, variation, EditMode::Select);
    let a = by_id(&doc, "a");
    assert!(doc.has_class(by_id(&doc, "x"), "promo"));

    doc.set_inner_html(a, r#"<p id="x">Fresh</p>"#).unwrap();
    let now = Instant::now();
    assert!(session.host_changed(&mut doc, now) > 0);

    session.tick(&mut doc, now + Duration::from_millis(50)).unwrap();
    assert!(!doc.has_class(by_id(&doc, "x"), "promo"));

    session.tick(&mut doc, now + Duration::from_millis(100)).unwrap();
    assert!(doc.has_class(by_id(&doc, "x"), "promo"));
    assert_eq!(doc.pending_records(), 0);
}

#[test]
fn test_editor_originated_records_are_ignored() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let config = EditorConfig::default();
    let y = by_id(&doc, "y");
    let save = by_id(&doc, "save");

    doc.set_attribute(y, &config.hover_attribute, "").unwrap();
    doc.set_attribute(save, "disabled", "").unwrap();
    assert_eq!(session.host_changed(&mut doc, Instant::now()), 0);

    // records produced while an inline edit is open are dropped
    let x = by_id(&doc, "x");
    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    doc.insert_text("!").unwrap();
    assert_eq!(session.host_changed(&mut doc, Instant::now()), 0);
}

#[test]
fn test_css_draft_previews_now_and_commits_later() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let now = Instant::now();

    session.set_css_draft(&mut doc, "p { color: red }", now).unwrap();
    assert!(session.injector().style_element().is_some());
    assert_eq!(session.registry().css(), "");

    session.set_css_draft(&mut doc, "p { color: blue }", now + Duration::from_millis(300)).unwrap();
    session.tick(&mut doc, now + Duration::from_millis(600)).unwrap();
    assert_eq!(session.registry().css(), "");

    session.tick(&mut doc, now + Duration::from_millis(800)).unwrap();
    assert_eq!(session.registry().css(), "p { color: blue }");
}

#[test]
fn test_payload_includes_uncommitted_css() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    session.set_css_draft(&mut doc, "h1 { margin: 0 }", Instant::now()).unwrap();

    let payload = session.payload();
    assert_eq!(payload.css, "h1 { margin: 0 }");
}

#[test]
fn test_undo_and_redo_reconcile_the_page() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let x = by_id(&doc, "x");

    session.add_mutations(&mut doc, vec![set_class("#x", "one")]).unwrap();
    session.add_mutations(&mut doc, vec![set_class("#x", "two")]).unwrap();
    assert_eq!(doc.class_list(x), vec!["two".to_string()]);

    assert!(session.undo(&mut doc).unwrap());
    assert_eq!(doc.class_list(x), vec!["one".to_string()]);
    assert!(session.undo(&mut doc).unwrap());
    assert!(doc.class_list(x).is_empty());
    assert!(!session.undo(&mut doc).unwrap());

    assert!(session.redo(&mut doc).unwrap());
    assert_eq!(doc.class_list(x), vec!["one".to_string()]);
    assert_eq!(session.history().redo_description(), Some("Add changes"));
}

#[test]
fn test_remove_mutation_is_undoable() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let x = by_id(&doc, "x");
    session.add_mutations(&mut doc, vec![set_class("#x", "one")]).unwrap();

    let removed = session.remove_mutation(&mut doc, 0).unwrap();
    assert_eq!(removed, set_class("#x", "one"));
    assert!(!doc.has_class(x, "one"));
    assert!(session.remove_mutation(&mut doc, 3).is_err());

    session.undo(&mut doc).unwrap();
    assert!(doc.has_class(x, "one"));
}

#[test]
fn test_transform_selected_records_set_html() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let x = by_id(&doc, "x");
    assert_eq!(session.transform_selected(&mut doc, |html| html.to_string()).unwrap(), None);

    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    let mutation = session
        .transform_selected(&mut doc, |html| html.to_uppercase())
        .unwrap()
        .unwrap();

    assert_eq!(mutation, DeclarativeMutation::set_html("#x", "HELLO"));
    assert_eq!(doc.inner_html(x), "HELLO");
    assert_eq!(session.history().undo_description(), Some("Transform copy"));
}

struct RejectingRunner;

impl ScriptRunner for RejectingRunner {
    fn run(&mut self, _source: &str) -> Result<(), ScriptError> {
        Err(ScriptError::new("Unexpected token"))
    }
}

#[test]
fn test_script_errors_reach_the_sink() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    let mut doc = Document::parse(PAGE);
    let mut session = EditSession::new(EditorConfig::default(), Variation::default())
        .unwrap()
        .with_script_runner(RejectingRunner)
        .with_script_error_sink(move |e| sink.borrow_mut().push(e));
    session.start(&mut doc).unwrap();

    session.set_js(&mut doc, "let = 1").unwrap();

    assert_eq!(errors.borrow().as_slice(), &[ScriptError::new("Unexpected token")]);
    assert_eq!(session.registry().js(), "let = 1");
}

#[test]
fn test_close_takes_everything_off_the_page() {
    let (mut doc, mut session) = start(PAGE, Variation::default(), EditMode::Select);
    let original = doc.inner_html(doc.body().unwrap());
    let x = by_id(&doc, "x");

    session.click(&mut doc, PointerEvent::at(x)).unwrap();
    session.add_mutations(&mut doc, vec![set_class("#y", "muted")]).unwrap();
    session.set_css(&mut doc, "p { color: red }").unwrap();

    let (variation, report) = session.close(&mut doc).unwrap();
    assert_eq!(report.skipped, 0);
    assert_eq!(variation.dom_mutations, vec![set_class("#y", "muted")]);
    assert_eq!(variation.css, "p { color: red }");
    assert_eq!(doc.inner_html(doc.body().unwrap()), original);
    assert!(doc.query_selector("style").unwrap().is_none());
}

const LIST: &str = r#"<ul id="list"><li>A</li><li>B</li><li>C</li></ul>"#;

fn stack_items(doc: &mut Document) -> Vec<NodeId> {
    let items = doc.query_selector_all("li").unwrap();
    for (i, item) in items.iter().enumerate() {
        doc.set_rect(*item, Rect::new(0.0, 20.0 * i as f64, 100.0, 20.0));
    }
    items
}

fn drag(doc: &mut Document, session: &mut EditSession, item: NodeId, over: NodeId, y: f64) {
    session.pointer_down(doc, PointerEvent::new(item, 50.0, 5.0)).unwrap();
    session.pointer_move(doc, PointerEvent::new(over, 50.0, y)).unwrap();
    session.pointer_up(doc, PointerEvent::new(over, 50.0, y)).unwrap();
}

#[test]
fn test_drag_shows_ghost_and_marks_dragged_element() {
    let (mut doc, mut session) = start(LIST, Variation::default(), EditMode::Rearrange);
    let config = EditorConfig::default();
    let items = stack_items(&mut doc);

    let down = session
        .pointer_down(&mut doc, PointerEvent::new(items[0], 50.0, 5.0))
        .unwrap();
    assert!(down.is_captured());
    assert!(doc.has_class(items[0], &config.rearrange_class));
    assert_eq!(marked(&doc, &config.ghost_attribute).len(), 1);

    session
        .pointer_move(&mut doc, PointerEvent::new(items[2], 50.0, 58.0))
        .unwrap();
    assert_eq!(session.rearrange_state().last_edge_target, Some(items[2]));

    session
        .pointer_up(&mut doc, PointerEvent::new(items[2], 50.0, 58.0))
        .unwrap();
    assert!(marked(&doc, &config.ghost_attribute).is_empty());
    assert!(!doc.has_class(items[0], &config.rearrange_class));
    assert_eq!(session.rearrange_state().dragged_element, None);
}

#[test]
fn test_dragging_the_same_element_again_replaces_its_move() {
    let (mut doc, mut session) = start(LIST, Variation::default(), EditMode::Rearrange);
    let items = stack_items(&mut doc);
    let list = by_id(&doc, "list");

    drag(&mut doc, &mut session, items[0], items[2], 58.0);
    assert_eq!(doc.inner_html(list), "<li>B</li><li>C</li><li>A</li>");
    assert_eq!(session.registry().len(), 1);

    // A is now last; drop it on the top edge of C
    drag(&mut doc, &mut session, items[0], items[2], 42.0);
    assert_eq!(doc.inner_html(list), "<li>B</li><li>A</li><li>C</li>");

    let mutations = session.registry().mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].selector, "li:nth-of-type(1)");
    assert_eq!(mutations[0].parent_selector.as_deref(), Some("#list"));
    assert_eq!(
        mutations[0].insert_before_selector.as_deref(),
        Some("li:nth-of-type(3)")
    );
    assert_eq!(session.history().undo_levels(), 2);
    assert!(!session.history().is_batching());
    assert_eq!(session.history().undo_description(), Some("Move element"));

    // the pop and re-push of the second drop undo together
    assert!(session.undo(&mut doc).unwrap());
    assert_eq!(doc.inner_html(list), "<li>B</li><li>C</li><li>A</li>");
    assert_eq!(session.registry().len(), 1);
    assert_eq!(session.registry().mutations()[0].insert_before_selector, None);
}

#[test]
fn test_dropping_back_in_place_removes_the_move() {
    let (mut doc, mut session) = start(LIST, Variation::default(), EditMode::Rearrange);
    let items = stack_items(&mut doc);
    let list = by_id(&doc, "list");

    drag(&mut doc, &mut session, items[0], items[2], 58.0);
    drag(&mut doc, &mut session, items[0], items[1], 22.0);

    assert!(session.registry().is_empty());
    assert_eq!(doc.inner_html(list), "<li>A</li><li>B</li><li>C</li>");
}

#[test]
fn test_drop_outside_any_item_is_a_noop() {
    let (mut doc, mut session) = start(LIST, Variation::default(), EditMode::Rearrange);
    let items = stack_items(&mut doc);
    let body = doc.body().unwrap();

    drag(&mut doc, &mut session, items[1], body, 100.0);
    assert!(session.registry().is_empty());
    assert!(!session.history().can_undo());
}
