//! # Selector Resolver
//!
//! Turns a live element into a short CSS selector that matches it alone.
//!
//! Candidates per level, in order of preference:
//!
//! 1. `#id`
//! 2. `tag.class.class` (unless class names are ignored)
//! 3. `tag`
//! 4. `tag:nth-of-type(k)`
//!
//! Levels are chained with `>` while walking up the ancestors, and the first
//! candidate that matches exactly the element wins. If nothing does, the full
//! `:nth-of-type` path from the root is returned.
//!
//! Editor-owned classes and attributes never appear in a selector, so a
//! resolved selector stays valid once the editor's decorations are gone.

use crate::config::EditorConfig;
use pagecraft_dom::selector::element_position;
use pagecraft_dom::{escape_identifier, Document, NodeId};
use tracing::debug;

/// Upper bound on chained candidates tried per ancestor level
const MAX_CANDIDATES: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub ignore_class_names: bool,
}

#[derive(Debug, Clone)]
pub struct SelectorResolver {
    config: EditorConfig,
}

impl SelectorResolver {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// `None` only when `element` is not an element.
    pub fn resolve(&self, doc: &Document, element: NodeId, options: ResolveOptions) -> Option<String> {
        doc.element(element)?;

        if doc.has_class(element, &self.config.rearrange_class) {
            return Some(format!(".{}", escape_identifier(&self.config.rearrange_class)));
        }

        if let Some(id) = doc.element_id(element) {
            let selector = format!("#{}", escape_identifier(id));
            if is_unique(doc, &selector, element) {
                return Some(selector);
            }
        }

        let mut suffixes: Vec<String> = Vec::new();
        let mut node = element;

        loop {
            let parts = self.candidates(doc, node, options);
            let chained: Vec<String> = if suffixes.is_empty() {
                parts
            } else {
                parts
                    .iter()
                    .flat_map(|part| suffixes.iter().map(move |suffix| format!("{} > {}", part, suffix)))
                    .take(MAX_CANDIDATES)
                    .collect()
            };

            if let Some(found) = chained.iter().find(|candidate| is_unique(doc, candidate, element)) {
                return Some(found.clone());
            }

            match doc.parent_element(node) {
                Some(parent) => node = parent,
                None => break,
            }
            suffixes = chained;
        }

        let fallback = self.nth_of_type_path(doc, element);
        debug!(element = %element, selector = %fallback, "no short unique selector; using full path");
        Some(fallback)
    }

    fn candidates(&self, doc: &Document, node: NodeId, options: ResolveOptions) -> Vec<String> {
        let tag = escape_identifier(doc.tag_name(node).unwrap_or("*"));
        let mut parts = Vec::with_capacity(4);

        if let Some(id) = doc.element_id(node) {
            parts.push(format!("#{}", escape_identifier(id)));
        }

        if !options.ignore_class_names {
            let classes: String = doc
                .class_list(node)
                .iter()
                .filter(|class| !self.config.is_engine_class(class))
                .map(|class| format!(".{}", escape_identifier(class)))
                .collect();
            if !classes.is_empty() {
                parts.push(format!("{}{}", tag, classes));
            }
        }

        parts.push(tag.clone());

        if let Some(index) = element_position(doc, node, true) {
            parts.push(format!("{}:nth-of-type({})", tag, index));
        }

        parts
    }

    fn nth_of_type_path(&self, doc: &Document, element: NodeId) -> String {
        let mut levels: Vec<String> = std::iter::once(element)
            .chain(doc.ancestors(element))
            .filter(|node| doc.is_element(*node))
            .map(|node| {
                let tag = escape_identifier(doc.tag_name(node).unwrap_or("*"));
                match element_position(doc, node, true) {
                    Some(index) => format!("{}:nth-of-type({})", tag, index),
                    None => tag,
                }
            })
            .collect();
        levels.reverse();
        levels.join(" > ")
    }
}

fn is_unique(doc: &Document, selector: &str, element: NodeId) -> bool {
    match doc.query_selector_all(selector) {
        Ok(matches) => matches == [element],
        Err(e) => {
            debug!(selector = %selector, error = %e, "generated selector did not parse");
            false
        }
    }
}
