//! Drag ghost: a translucent copy of the dragged element that follows the
//! pointer. Purely cosmetic; nothing reads it back.

use crate::config::EditorConfig;
use crate::errors::EditorResult;
use crate::observation::silently;
use pagecraft_dom::{merge_declarations, parse_declarations, serialize_declarations, Document, NodeId};

/// Keeps the ghost above any host content
const GHOST_Z_INDEX: &str = "2147483647";

#[derive(Debug)]
pub struct Ghost {
    ghost_attribute: String,
    opacity: f64,
    stripped_attributes: Vec<String>,
    rearrange_class: String,
    node: Option<NodeId>,
}

impl Ghost {
    pub fn new(config: &EditorConfig) -> Self {
        let mut stripped_attributes: Vec<String> = config
            .reserved_attributes()
            .iter()
            .map(|name| name.to_string())
            .collect();
        stripped_attributes.push("id".to_string());

        Self {
            ghost_attribute: config.ghost_attribute.clone(),
            opacity: config.ghost_opacity,
            stripped_attributes,
            rearrange_class: config.rearrange_class.clone(),
            node: None,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_visible(&self) -> bool {
        self.node.is_some()
    }

    /// Whether `node` is part of the ghost
    pub fn contains(&self, doc: &Document, node: NodeId) -> bool {
        self.node.is_some_and(|ghost| doc.contains(ghost, node))
    }

    /// Clone `source` under `mount` at the pointer, replacing any previous ghost
    pub fn show(
        &mut self,
        doc: &mut Document,
        source: NodeId,
        mount: NodeId,
        x: f64,
        y: f64,
    ) -> EditorResult<NodeId> {
        self.remove(doc)?;

        let ghost = silently(doc, |doc| -> EditorResult<NodeId> {
            let ghost = doc.deep_clone(source)?;
            let nodes: Vec<NodeId> = std::iter::once(ghost)
                .chain(doc.descendants(ghost))
                .filter(|node| doc.is_element(*node))
                .collect();
            for node in nodes {
                for name in &self.stripped_attributes {
                    doc.remove_attribute(node, name)?;
                }
                doc.remove_class(node, &self.rearrange_class)?;
            }

            let mut declarations = parse_declarations(doc.attribute(ghost, "style").unwrap_or(""));
            merge_declarations(&mut declarations, self.placement(x, y));
            doc.set_attribute(ghost, "style", &serialize_declarations(&declarations))?;
            doc.set_attribute(ghost, &self.ghost_attribute, "")?;
            doc.append_child(mount, ghost)?;
            Ok(ghost)
        })?;

        self.node = Some(ghost);
        Ok(ghost)
    }

    pub fn move_to(&mut self, doc: &mut Document, x: f64, y: f64) -> EditorResult<()> {
        let Some(ghost) = self.node.filter(|node| doc.is_connected(*node)) else {
            return Ok(());
        };
        let placement = vec![
            ("left".to_string(), format!("{}px", x)),
            ("top".to_string(), format!("{}px", y)),
        ];
        silently(doc, |doc| {
            let mut declarations = parse_declarations(doc.attribute(ghost, "style").unwrap_or(""));
            merge_declarations(&mut declarations, placement);
            doc.set_attribute(ghost, "style", &serialize_declarations(&declarations))
        })?;
        Ok(())
    }

    pub fn remove(&mut self, doc: &mut Document) -> EditorResult<()> {
        if let Some(ghost) = self.node.take() {
            silently(doc, |doc| doc.detach(ghost))?;
        }
        Ok(())
    }

    fn placement(&self, x: f64, y: f64) -> Vec<(String, String)> {
        [
            ("position", "fixed".to_string()),
            ("left", format!("{}px", x)),
            ("top", format!("{}px", y)),
            ("pointer-events", "none".to_string()),
            ("opacity", self.opacity.to_string()),
            ("z-index", GHOST_Z_INDEX.to_string()),
        ]
        .into_iter()
        .map(|(property, value)| (property.to_string(), value))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ghost_is_a_stripped_fixed_clone() {
        let config = EditorConfig::default();
        let mut doc = Document::parse(
            r#"<div id="card" class="card pagecraft-rearrange-target" data-pagecraft-selected="" style="color: red"><b id="title">Hi</b></div>"#,
        );
        let card = doc.query_selector("#card").unwrap().unwrap();
        let body = doc.body().unwrap();
        let mut ghost = Ghost::new(&config);

        let node = ghost.show(&mut doc, card, body, 10.0, 20.0).unwrap();

        assert_eq!(doc.parent(node), Some(body));
        assert_eq!(doc.element_id(node), None);
        assert_eq!(doc.attribute(node, &config.selected_attribute), None);
        assert_eq!(doc.class_list(node), vec!["card".to_string()]);
        assert_eq!(doc.query_selector_all("#title").unwrap().len(), 1);
        assert_eq!(doc.computed_style(node, "position").as_deref(), Some("fixed"));
        assert_eq!(doc.computed_style(node, "pointer-events").as_deref(), Some("none"));
        assert_eq!(doc.computed_style(node, "opacity").as_deref(), Some("0.5"));
        assert_eq!(doc.computed_style(node, "color").as_deref(), Some("red"));
        assert_eq!(doc.pending_records(), 0);
    }

    #[test]
    fn test_ghost_follows_pointer_and_is_removed() {
        let config = EditorConfig::default();
        let mut doc = Document::parse(r#"<p id="a">A</p>"#);
        let a = doc.query_selector("#a").unwrap().unwrap();
        let body = doc.body().unwrap();
        let mut ghost = Ghost::new(&config);

        let node = ghost.show(&mut doc, a, body, 0.0, 0.0).unwrap();
        ghost.move_to(&mut doc, 42.0, 7.5).unwrap();
        assert_eq!(doc.computed_style(node, "left").as_deref(), Some("42px"));
        assert_eq!(doc.computed_style(node, "top").as_deref(), Some("7.5px"));
        assert!(ghost.contains(&doc, doc.children(node)[0]));

        ghost.remove(&mut doc).unwrap();
        assert!(!doc.is_connected(node));
        assert!(!ghost.is_visible());
    }
}
