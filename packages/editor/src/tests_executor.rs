use crate::executor::{apply_mutations, ApplyOutcome, MutationExecutor, RevertReport};
use crate::mutations::{DeclarativeMutation, MutationAction, PositionTarget};
use crate::observation::Observation;
use pagecraft_dom::Document;
use std::rc::Rc;

const PAGE: &str = r#"<div id="a" class="box"><p id="x" style="color: red">Hello</p><p id="y">World</p></div><section id="b"><span id="s1">one</span><span id="s2">two</span></section>"#;

fn body_html(doc: &Document) -> String {
    doc.inner_html(doc.body().unwrap())
}

fn m(selector: &str, action: MutationAction, attribute: &str, value: Option<&str>) -> DeclarativeMutation {
    let mutation = DeclarativeMutation::new(selector, action, attribute);
    match value {
        Some(value) => mutation.with_value(value),
        None => mutation,
    }
}

fn mixed_list() -> Vec<DeclarativeMutation> {
    vec![
        m("#x", MutationAction::Set, "class", Some("lead")),
        m("#x", MutationAction::Append, "class", Some("big lead")),
        m("#x", MutationAction::Append, "style", Some("color: blue; margin: 0")),
        m("#y", MutationAction::Set, "html", Some("<b>Bold</b> world")),
        m("#a", MutationAction::Append, "data-track", Some("-v2")),
        m("#a", MutationAction::Set, "data-track", Some("on")),
        m("#a", MutationAction::Remove, "class", Some("box")),
        DeclarativeMutation::position("#x", PositionTarget::new("#b", Some("#s2".to_string()))),
    ]
}

#[test]
fn test_actions_compose_in_order() {
    let mut doc = Document::parse(PAGE);
    let _handle = apply_mutations(&mut doc, &mixed_list());

    assert_eq!(
        body_html(&doc),
        concat!(
            r#"<div id="a" data-track="on"><p id="y"><b>Bold</b> world</p></div>"#,
            r#"<section id="b"><span id="s1">one</span>"#,
            r#"<p id="x" style="color: blue; margin: 0;" class="lead big">Hello</p>"#,
            r#"<span id="s2">two</span></section>"#
        )
    );
}

#[test]
fn test_apply_then_revert_restores_markup() {
    let mut doc = Document::parse(PAGE);
    let before = body_html(&doc);

    let handle = apply_mutations(&mut doc, &mixed_list());
    assert_ne!(body_html(&doc), before);

    let report = handle.revert(&mut doc);
    assert_eq!(report.skipped, 0);
    assert_eq!(body_html(&doc), before);
}

#[test]
fn test_html_revert_restores_the_same_nodes() {
    let mut doc = Document::parse(PAGE);
    let y = doc.query_selector("#y").unwrap().unwrap();
    let original_text = doc.children(y)[0];

    let handle = apply_mutations(&mut doc, &[m("#y", MutationAction::Remove, "html", None)]);
    assert_eq!(doc.inner_html(y), "");

    let _ = handle.revert(&mut doc);
    assert_eq!(doc.children(y), &[original_text]);
}

#[test]
fn test_resync_equals_single_apply() {
    let mut once = Document::parse(PAGE);
    let _handle = apply_mutations(&mut once, &mixed_list());

    let mut doc = Document::parse(PAGE);
    let mut executor = MutationExecutor::new(Observation::new());
    let list: Rc<[DeclarativeMutation]> = Rc::from(mixed_list());
    executor.apply(&mut doc, Rc::clone(&list));
    executor.resync(&mut doc);
    executor.resync(&mut doc);

    assert_eq!(body_html(&doc), body_html(&once));
}

#[test]
fn test_same_list_is_not_reapplied() {
    let mut doc = Document::parse(PAGE);
    let mut executor = MutationExecutor::new(Observation::new());
    let list: Rc<[DeclarativeMutation]> = Rc::from(vec![m(
        "#x",
        MutationAction::Append,
        "html",
        Some("!"),
    )]);

    assert!(matches!(
        executor.apply(&mut doc, Rc::clone(&list)),
        ApplyOutcome::Applied { steps: 1, .. }
    ));
    assert_eq!(executor.apply(&mut doc, Rc::clone(&list)), ApplyOutcome::Unchanged);

    let x = doc.query_selector("#x").unwrap().unwrap();
    assert_eq!(doc.inner_html(x), "Hello!");
}

#[test]
fn test_new_list_replaces_previous_pass() {
    let mut doc = Document::parse(PAGE);
    let mut executor = MutationExecutor::new(Observation::new());
    executor.apply(
        &mut doc,
        Rc::from(vec![m("#x", MutationAction::Set, "html", Some("Hi"))]),
    );
    executor.apply(
        &mut doc,
        Rc::from(vec![m("#y", MutationAction::Set, "title", Some("t"))]),
    );

    let x = doc.query_selector("#x").unwrap().unwrap();
    assert_eq!(doc.inner_html(x), "Hello");
    assert!(doc.query_selector("#y[title=t]").unwrap().is_some());
}

#[test]
fn test_apply_is_deferred_while_suspended() {
    let mut doc = Document::parse(PAGE);
    let observation = Observation::new();
    let mut executor = MutationExecutor::new(observation.clone());
    let list: Rc<[DeclarativeMutation]> =
        Rc::from(vec![m("#x", MutationAction::Set, "html", Some("Hi"))]);

    let guard = observation.suspend();
    assert_eq!(executor.apply(&mut doc, Rc::clone(&list)), ApplyOutcome::Deferred);
    assert!(executor.is_deferred());
    let x = doc.query_selector("#x").unwrap().unwrap();
    assert_eq!(doc.inner_html(x), "Hello");

    drop(guard);
    assert!(matches!(
        executor.flush_deferred(&mut doc),
        ApplyOutcome::Applied { .. }
    ));
    assert_eq!(doc.inner_html(x), "Hi");
    assert!(!observation.is_suspended());
}

#[test]
fn test_executor_drains_its_own_records() {
    let mut doc = Document::parse(PAGE);
    doc.take_records();
    let a = doc.query_selector("#a").unwrap().unwrap();
    doc.set_attribute(a, "data-host", "1").unwrap();

    let mut executor = MutationExecutor::new(Observation::new());
    executor.apply(&mut doc, Rc::from(mixed_list()));

    let records = doc.take_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target, a);
}

#[test]
fn test_revert_skips_targets_removed_by_host() {
    let mut doc = Document::parse(PAGE);
    let handle = apply_mutations(
        &mut doc,
        &[
            m("#x", MutationAction::Set, "title", Some("t")),
            m("#y", MutationAction::Set, "title", Some("t")),
        ],
    );

    let x = doc.query_selector("#x").unwrap().unwrap();
    doc.detach(x).unwrap();

    let report = handle.revert(&mut doc);
    assert_eq!(
        report,
        RevertReport {
            reverted: 1,
            skipped: 1
        }
    );
    assert_eq!(doc.attribute(x, "title"), Some("t"));
}

#[test]
fn test_revert_leaves_moved_element_the_host_removed() {
    let mut doc = Document::parse(PAGE);
    let mut executor = MutationExecutor::new(Observation::new());
    let moves: Rc<[DeclarativeMutation]> = Rc::from(vec![DeclarativeMutation::position(
        "#x",
        PositionTarget::new("#b", None),
    )]);
    executor.apply(&mut doc, moves);

    let x = doc.query_selector("#x").unwrap().unwrap();
    let b = doc.query_selector("#b").unwrap().unwrap();
    assert_eq!(doc.parent(x), Some(b));
    doc.detach(x).unwrap();

    let report = executor.revert(&mut doc);
    assert_eq!(
        report,
        RevertReport {
            reverted: 0,
            skipped: 1
        }
    );
    assert!(!doc.is_connected(x));
    assert_eq!(doc.query_selector("#x").unwrap(), None);
}

#[test]
fn test_revert_leaves_moved_element_the_host_relocated() {
    let mut doc = Document::parse(PAGE);
    let handle = apply_mutations(
        &mut doc,
        &[DeclarativeMutation::position("#x", PositionTarget::new("#b", None))],
    );

    let x = doc.query_selector("#x").unwrap().unwrap();
    let body = doc.body().unwrap();
    doc.append_child(body, x).unwrap();

    let report = handle.revert(&mut doc);
    assert_eq!(report.skipped, 1);
    assert_eq!(doc.parent(x), Some(body));
}

#[test]
fn test_unmatched_and_invalid_selectors_are_noops() {
    let mut doc = Document::parse(PAGE);
    let before = body_html(&doc);
    let handle = apply_mutations(
        &mut doc,
        &[
            m("#missing", MutationAction::Set, "html", Some("x")),
            m("p:hover", MutationAction::Set, "html", Some("x")),
            m("div >", MutationAction::Set, "html", Some("x")),
        ],
    );
    assert!(handle.is_empty());
    assert_eq!(body_html(&doc), before);
}

#[test]
fn test_selector_matching_many_applies_to_all() {
    let mut doc = Document::parse(PAGE);
    let _handle = apply_mutations(&mut doc, &[m("span", MutationAction::Append, "class", Some("hl"))]);
    assert_eq!(doc.query_selector_all("span.hl").unwrap().len(), 2);
}

#[test]
fn test_position_edge_cases_are_noops() {
    let mut doc = Document::parse(PAGE);
    let before = body_html(&doc);

    let mut no_parent = m("#x", MutationAction::Set, "position", None);
    no_parent.insert_before_selector = Some("#s1".to_string());

    let handle = apply_mutations(
        &mut doc,
        &[
            no_parent,
            DeclarativeMutation::position("#a", PositionTarget::new("#x", None)),
            DeclarativeMutation::position("#x", PositionTarget::new("#nowhere", None)),
            DeclarativeMutation {
                action: MutationAction::Remove,
                ..DeclarativeMutation::position("#x", PositionTarget::new("#b", None))
            },
            DeclarativeMutation::position("#y", PositionTarget::new("#a", None)),
        ],
    );

    assert!(handle.is_empty());
    assert_eq!(body_html(&doc), before);
}

#[test]
fn test_position_appends_when_anchor_is_elsewhere() {
    let mut doc = Document::parse(PAGE);
    let _handle = apply_mutations(
        &mut doc,
        &[DeclarativeMutation::position(
            "#x",
            PositionTarget::new("#b", Some("#y".to_string())),
        )],
    );
    let b = doc.query_selector("#b").unwrap().unwrap();
    let last = doc.element_children(b).last().unwrap();
    assert_eq!(doc.element_id(last), Some("x"));
}

#[test]
fn test_style_remove_named_properties() {
    let mut doc = Document::parse(r#"<p id="x" style="color: red; margin: 0; padding: 1px"></p>"#);
    let x = doc.query_selector("#x").unwrap().unwrap();

    let handle = apply_mutations(
        &mut doc,
        &[m("#x", MutationAction::Remove, "style", Some("color, padding"))],
    );
    assert_eq!(doc.attribute(x, "style"), Some("margin: 0;"));

    let _ = handle.revert(&mut doc);
    assert_eq!(doc.attribute(x, "style"), Some("color: red; margin: 0; padding: 1px"));

    let _handle = apply_mutations(&mut doc, &[m("#x", MutationAction::Remove, "style", None)]);
    assert_eq!(doc.attribute(x, "style"), None);
}

#[test]
fn test_executor_revert_forgets_applied_list() {
    let mut doc = Document::parse(PAGE);
    let before = body_html(&doc);
    let mut executor = MutationExecutor::new(Observation::new());
    executor.apply(&mut doc, Rc::from(mixed_list()));

    let report = executor.revert(&mut doc);
    assert!(report.reverted > 0);
    assert_eq!(body_html(&doc), before);
    assert!(executor.applied().is_none());
    assert_eq!(executor.resync(&mut doc), ApplyOutcome::Unchanged);
}
