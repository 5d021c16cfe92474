//! # Rearrange Controller
//!
//! Drag-to-reposition. While an element is being dragged, every pointer move
//! finds the hovered element, infers which axis its siblings flow along, and
//! marks the nearest edge with a single drop indicator. Releasing produces a
//! [`DropPlan`]: the parent to move into and the sibling to insert before.
//!
//! ## Flow inference
//!
//! | parent display          | rule                                              |
//! |-------------------------|---------------------------------------------------|
//! | `flex`, `inline-flex`   | `flex-direction: column*` vertical, else horizontal |
//! | `grid`, `inline-grid`   | `grid-auto-flow: column*` vertical, else horizontal |
//! | anything else           | horizontal if the hovered element is inline-level   |
//!
//! A right-to-left `direction` on the parent mirrors left and right, and a
//! `*-reverse` flex direction flips which edge comes first in document order.

use crate::config::EditorConfig;
use crate::observation::silently;
use pagecraft_dom::{Document, NodeId, Rect};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Left => "left",
            Edge::Right => "right",
            Edge::Top => "top",
            Edge::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout of one container's children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerFlow {
    pub flow: Flow,
    pub rtl: bool,
    /// Main axis runs against document order (`row-reverse`, `column-reverse`)
    pub reversed: bool,
}

impl ContainerFlow {
    /// Whether dropping on `edge` lands before the hovered element
    pub fn is_before(&self, edge: Edge) -> bool {
        let visually_first = match edge {
            Edge::Top => true,
            Edge::Bottom => false,
            Edge::Left => !self.rtl,
            Edge::Right => self.rtl,
        };
        visually_first != self.reversed
    }
}

pub fn detect_flow(doc: &Document, parent: NodeId, hovered: NodeId) -> ContainerFlow {
    let style = |node: NodeId, property: &str| {
        doc.computed_style(node, property)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    };

    let display = style(parent, "display");
    let flex_direction = style(parent, "flex-direction");
    let is_flex = matches!(display.as_str(), "flex" | "inline-flex");

    let flow = match display.as_str() {
        "flex" | "inline-flex" => {
            if flex_direction.starts_with("column") {
                Flow::Vertical
            } else {
                Flow::Horizontal
            }
        }
        "grid" | "inline-grid" => {
            if style(parent, "grid-auto-flow").starts_with("column") {
                Flow::Vertical
            } else {
                Flow::Horizontal
            }
        }
        _ => match style(hovered, "display").as_str() {
            "inline" | "inline-block" | "inline-flex" => Flow::Horizontal,
            _ => Flow::Vertical,
        },
    };

    ContainerFlow {
        flow,
        rtl: style(parent, "direction") == "rtl",
        reversed: is_flex && flex_direction.ends_with("-reverse"),
    }
}

/// Edge of `rect` closest to the pointer along the flow axis
pub fn nearest_edge(rect: Rect, x: f64, y: f64, flow: Flow) -> Edge {
    let (center_x, center_y) = rect.center();
    match flow {
        Flow::Horizontal if x < center_x => Edge::Left,
        Flow::Horizontal => Edge::Right,
        Flow::Vertical if y < center_y => Edge::Top,
        Flow::Vertical => Edge::Bottom,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropIndicator {
    pub target: NodeId,
    pub edge: Edge,
}

/// Where a released drag moves the element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropPlan {
    pub dragged: NodeId,
    pub dragged_selector: String,
    pub parent: NodeId,
    /// `None` appends at the end of `parent`
    pub before: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RearrangeSnapshot {
    pub dragged_element: Option<NodeId>,
    pub container_flow: Option<Flow>,
    pub last_edge_target: Option<NodeId>,
    pub last_edge_position: Option<Edge>,
}

#[derive(Debug)]
struct Drag {
    element: NodeId,
    selector: String,
}

#[derive(Debug)]
pub struct RearrangeController {
    drop_edge_attribute: String,
    rearrange_class: String,
    drag: Option<Drag>,
    flows: HashMap<NodeId, ContainerFlow>,
    container_flow: Option<ContainerFlow>,
    indicator: Option<DropIndicator>,
}

impl RearrangeController {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            drop_edge_attribute: config.drop_edge_attribute.clone(),
            rearrange_class: config.rearrange_class.clone(),
            drag: None,
            flows: HashMap::new(),
            container_flow: None,
            indicator: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn dragged(&self) -> Option<NodeId> {
        self.drag.as_ref().map(|drag| drag.element)
    }

    pub fn indicator(&self) -> Option<DropIndicator> {
        self.indicator
    }

    /// Start dragging `element`.
    ///
    /// `selector` must be resolved before this call: the marker class added
    /// here would otherwise end up in it.
    pub fn begin_drag(&mut self, doc: &mut Document, element: NodeId, selector: String) {
        if self.drag.is_some() {
            self.end_drag(doc);
        }
        debug!(element = %element, selector = %selector, "drag started");
        let class = self.rearrange_class.clone();
        silently(doc, |doc| {
            let _ = doc.add_class(element, &class);
        });
        self.drag = Some(Drag { element, selector });
    }

    /// Track the pointer over `hovered`. Returns the current indicator.
    pub fn pointer_move(
        &mut self,
        doc: &mut Document,
        hovered: NodeId,
        x: f64,
        y: f64,
    ) -> Option<DropIndicator> {
        let dragged = self.dragged()?;

        let droppable = doc.is_element(hovered)
            && !doc.contains(dragged, hovered)
            && Some(hovered) != doc.body()
            && Some(hovered) != doc.document_element()
            && doc.parent_element(hovered).is_some();
        if !droppable {
            self.set_indicator(doc, None);
            return None;
        }

        let parent = doc.parent_element(hovered)?;
        if self.indicator.map(|indicator| indicator.target) != Some(hovered) {
            let flow = *self
                .flows
                .entry(parent)
                .or_insert_with(|| detect_flow(doc, parent, hovered));
            self.container_flow = Some(flow);
        }

        let flow = self.container_flow?;
        let edge = nearest_edge(doc.bounding_rect(hovered), x, y, flow.flow);
        let indicator = DropIndicator {
            target: hovered,
            edge,
        };
        self.set_indicator(doc, Some(indicator));
        Some(indicator)
    }

    fn set_indicator(&mut self, doc: &mut Document, next: Option<DropIndicator>) {
        if self.indicator == next {
            return;
        }
        let previous = std::mem::replace(&mut self.indicator, next);
        let attribute = self.drop_edge_attribute.clone();
        silently(doc, |doc| {
            if let Some(previous) = previous {
                let _ = doc.remove_attribute(previous.target, &attribute);
            }
            if let Some(next) = next {
                let _ = doc.set_attribute(next.target, &attribute, next.edge.as_str());
            }
        });
    }

    /// Where the element would land if released now
    pub fn drop_plan(&self, doc: &Document) -> Option<DropPlan> {
        let drag = self.drag.as_ref()?;
        let indicator = self.indicator?;
        let flow = self.container_flow?;
        let parent = doc.parent_element(indicator.target)?;

        if doc.contains(drag.element, parent) {
            return None;
        }

        let before = if flow.is_before(indicator.edge) {
            Some(indicator.target)
        } else {
            let mut next = doc.next_element_sibling(indicator.target);
            while next == Some(drag.element) {
                next = next.and_then(|node| doc.next_element_sibling(node));
            }
            next
        };

        Some(DropPlan {
            dragged: drag.element,
            dragged_selector: drag.selector.clone(),
            parent,
            before,
        })
    }

    /// Release: compute the plan and tear the drag down
    pub fn drop(&mut self, doc: &mut Document) -> Option<DropPlan> {
        let plan = self.drop_plan(doc);
        if plan.is_none() {
            debug!("drop without a valid container; ignoring");
        }
        self.end_drag(doc);
        plan
    }

    /// Remove the indicator and marker class and forget the drag
    pub fn end_drag(&mut self, doc: &mut Document) {
        self.set_indicator(doc, None);
        if let Some(drag) = self.drag.take() {
            let class = self.rearrange_class.clone();
            silently(doc, |doc| {
                let _ = doc.remove_class(drag.element, &class);
            });
        }
        self.container_flow = None;
        self.flows.clear();
    }

    pub fn snapshot(&self) -> RearrangeSnapshot {
        RearrangeSnapshot {
            dragged_element: self.dragged(),
            container_flow: self.container_flow.map(|flow| flow.flow),
            last_edge_target: self.indicator.map(|indicator| indicator.target),
            last_edge_position: self.indicator.map(|indicator| indicator.edge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_id(doc: &Document, id: &str) -> NodeId {
        doc.query_selector(&format!("#{}", id)).unwrap().unwrap()
    }

    /// Stack `ids` vertically, 20px tall each, starting at `top`
    fn stack(doc: &mut Document, ids: &[&str], top: f64) {
        for (i, id) in ids.iter().enumerate() {
            let node = by_id(doc, id);
            doc.set_rect(node, Rect::new(0.0, top + 20.0 * i as f64, 100.0, 20.0));
        }
    }

    #[test]
    fn test_flow_rules() {
        let doc = Document::parse(concat!(
            r#"<div id="row" style="display: flex"><b id="r1">a</b></div>"#,
            r#"<div id="col" style="display: flex; flex-direction: column-reverse"><b id="c1">a</b></div>"#,
            r#"<div id="grid" style="display: grid"><b id="g1">a</b></div>"#,
            r#"<div id="gridcol" style="display: grid; grid-auto-flow: column dense"><b id="gc1">a</b></div>"#,
            r#"<div id="block"><p id="p1">a</p><span id="s1">b</span></div>"#,
            r#"<div id="rtl" style="direction: rtl"><span id="t1">a</span></div>"#,
        ));
        let flow = |parent: &str, child: &str| detect_flow(&doc, by_id(&doc, parent), by_id(&doc, child));

        assert_eq!(flow("row", "r1").flow, Flow::Horizontal);
        assert_eq!(flow("col", "c1").flow, Flow::Vertical);
        assert_eq!(flow("grid", "g1").flow, Flow::Horizontal);
        assert_eq!(flow("gridcol", "gc1").flow, Flow::Vertical);
        assert_eq!(flow("block", "p1").flow, Flow::Vertical);
        assert_eq!(flow("block", "s1").flow, Flow::Horizontal);
        assert!(flow("rtl", "t1").rtl);
        assert!(!flow("row", "r1").rtl);
        assert!(flow("col", "c1").reversed);
        assert!(!flow("row", "r1").reversed);
    }

    #[test]
    fn test_nearest_edge_and_mirroring() {
        let rect = Rect::new(0.0, 0.0, 100.0, 20.0);
        assert_eq!(nearest_edge(rect, 10.0, 15.0, Flow::Horizontal), Edge::Left);
        assert_eq!(nearest_edge(rect, 90.0, 5.0, Flow::Horizontal), Edge::Right);
        assert_eq!(nearest_edge(rect, 90.0, 5.0, Flow::Vertical), Edge::Top);
        assert_eq!(nearest_edge(rect, 10.0, 15.0, Flow::Vertical), Edge::Bottom);

        let ltr = ContainerFlow {
            flow: Flow::Horizontal,
            rtl: false,
            reversed: false,
        };
        let rtl = ContainerFlow { rtl: true, ..ltr };
        assert!(ltr.is_before(Edge::Left));
        assert!(!rtl.is_before(Edge::Left));
        assert!(rtl.is_before(Edge::Right));

        let row_reverse = ContainerFlow { reversed: true, ..ltr };
        assert!(row_reverse.is_before(Edge::Right));
        let rtl_row_reverse = ContainerFlow { reversed: true, ..rtl };
        assert!(rtl_row_reverse.is_before(Edge::Left));

        let column_reverse = ContainerFlow {
            flow: Flow::Vertical,
            rtl: false,
            reversed: true,
        };
        assert!(!column_reverse.is_before(Edge::Top));
        assert!(column_reverse.is_before(Edge::Bottom));
    }

    #[test]
    fn test_single_indicator_follows_pointer() {
        let config = EditorConfig::default();
        let mut doc = Document::parse(
            r#"<ul id="list"><li id="a">A</li><li id="b">B</li><li id="c">C</li></ul>"#,
        );
        stack(&mut doc, &["a", "b", "c"], 0.0);
        let mut controller = RearrangeController::new(&config);
        let a = by_id(&doc, "a");
        let b = by_id(&doc, "b");
        let c = by_id(&doc, "c");

        controller.begin_drag(&mut doc, a, "#a".to_string());
        assert!(doc.has_class(a, &config.rearrange_class));

        let first = controller.pointer_move(&mut doc, b, 50.0, 22.0).unwrap();
        assert_eq!(first.edge, Edge::Top);
        let second = controller.pointer_move(&mut doc, c, 50.0, 58.0).unwrap();
        assert_eq!(second.edge, Edge::Bottom);

        let marked = doc
            .query_selector_all(&format!("[{}]", config.drop_edge_attribute))
            .unwrap();
        assert_eq!(marked, vec![c]);
        assert_eq!(doc.attribute(c, &config.drop_edge_attribute), Some("bottom"));
        assert_eq!(controller.snapshot().container_flow, Some(Flow::Vertical));
        assert_eq!(doc.pending_records(), 0);
    }

    #[test]
    fn test_drop_after_skips_dragged_sibling() {
        let config = EditorConfig::default();
        let mut doc = Document::parse(
            r#"<ul id="list"><li id="a">A</li><li id="b">B</li><li id="c">C</li></ul>"#,
        );
        stack(&mut doc, &["a", "b", "c"], 0.0);
        let mut controller = RearrangeController::new(&config);
        let (a, b, c) = (by_id(&doc, "a"), by_id(&doc, "b"), by_id(&doc, "c"));
        let list = by_id(&doc, "list");

        controller.begin_drag(&mut doc, b, "#b".to_string());
        controller.pointer_move(&mut doc, a, 50.0, 15.0);
        let plan = controller.drop(&mut doc).unwrap();

        assert_eq!(
            plan,
            DropPlan {
                dragged: b,
                dragged_selector: "#b".to_string(),
                parent: list,
                before: Some(c),
            }
        );
        assert!(!controller.is_dragging());
        assert!(!doc.has_class(b, &config.rearrange_class));
        assert_eq!(doc.attribute(a, &config.drop_edge_attribute), None);
    }

    #[test]
    fn test_drop_at_end_has_no_anchor() {
        let config = EditorConfig::default();
        let mut doc = Document::parse(r#"<ul id="list"><li id="a">A</li><li id="b">B</li></ul>"#);
        stack(&mut doc, &["a", "b"], 0.0);
        let mut controller = RearrangeController::new(&config);
        let (a, b) = (by_id(&doc, "a"), by_id(&doc, "b"));

        controller.begin_drag(&mut doc, a, "#a".to_string());
        controller.pointer_move(&mut doc, b, 50.0, 39.0);
        assert_eq!(controller.drop(&mut doc).unwrap().before, None);
    }

    #[test]
    fn test_hovering_inside_dragged_element_is_ignored() {
        let config = EditorConfig::default();
        let mut doc = Document::parse(r#"<div id="a"><p id="inner">x</p></div><p id="b">y</p>"#);
        let mut controller = RearrangeController::new(&config);
        let a = by_id(&doc, "a");
        let inner = by_id(&doc, "inner");

        controller.begin_drag(&mut doc, a, "#a".to_string());
        assert_eq!(controller.pointer_move(&mut doc, inner, 0.0, 0.0), None);
        assert_eq!(controller.pointer_move(&mut doc, a, 0.0, 0.0), None);
        assert_eq!(controller.drop(&mut doc), None);
    }

    #[test]
    fn test_horizontal_rtl_drop() {
        let config = EditorConfig::default();
        let mut doc = Document::parse(
            r#"<nav id="bar" style="display: flex; direction: rtl"><a id="x">1</a><a id="y">2</a></nav><p id="z">z</p>"#,
        );
        let y = by_id(&doc, "y");
        doc.set_rect(y, Rect::new(0.0, 0.0, 40.0, 20.0));
        let mut controller = RearrangeController::new(&config);
        let z = by_id(&doc, "z");

        controller.begin_drag(&mut doc, z, "#z".to_string());
        let indicator = controller.pointer_move(&mut doc, y, 5.0, 10.0).unwrap();
        assert_eq!(indicator.edge, Edge::Left);
        // left is the trailing side in right-to-left flow
        assert_eq!(controller.drop(&mut doc).unwrap().before, None);
    }

    #[test]
    fn test_column_reverse_drop() {
        let config = EditorConfig::default();
        let mut doc = Document::parse(concat!(
            r#"<div id="feed" style="display: flex; flex-direction: column-reverse">"#,
            r#"<p id="a">A</p><p id="b">B</p><p id="c">C</p></div><p id="z">z</p>"#,
        ));
        // painted bottom to top: C, B, A
        stack(&mut doc, &["c", "b", "a"], 0.0);
        let mut controller = RearrangeController::new(&config);
        let (b, c, z) = (by_id(&doc, "b"), by_id(&doc, "c"), by_id(&doc, "z"));

        controller.begin_drag(&mut doc, z, "#z".to_string());
        let indicator = controller.pointer_move(&mut doc, b, 50.0, 22.0).unwrap();
        assert_eq!(indicator.edge, Edge::Top);
        // above B on screen is after B in the document
        assert_eq!(controller.drop(&mut doc).unwrap().before, Some(c));

        controller.begin_drag(&mut doc, z, "#z".to_string());
        controller.pointer_move(&mut doc, b, 50.0, 38.0);
        assert_eq!(controller.drop(&mut doc).unwrap().before, Some(b));
    }
}
