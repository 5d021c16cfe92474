//! Inline style declarations and host-supplied layout facts.

use serde::{Deserialize, Serialize};

/// Element box in viewport coordinates, as reported by the host's layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Parse a `style` attribute into `(property, value)` pairs.
///
/// Property names are lowercased; empty or malformed declarations are dropped.
pub fn parse_declarations(source: &str) -> Vec<(String, String)> {
    source
        .split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            if property.is_empty() || value.is_empty() {
                None
            } else {
                Some((property, value.to_string()))
            }
        })
        .collect()
}

pub fn serialize_declarations(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(property, value)| format!("{}: {};", property, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Merge `incoming` into `base`; a property already present is overwritten in place.
pub fn merge_declarations(base: &mut Vec<(String, String)>, incoming: Vec<(String, String)>) {
    for (property, value) in incoming {
        match base.iter_mut().find(|(existing, _)| *existing == property) {
            Some(slot) => slot.1 = value,
            None => base.push((property, value)),
        }
    }
}

pub(crate) fn default_display(tag: &str) -> &'static str {
    match tag {
        "a" | "abbr" | "b" | "br" | "cite" | "code" | "em" | "i" | "kbd" | "label" | "mark"
        | "q" | "s" | "small" | "span" | "strong" | "sub" | "sup" | "time" | "u" => "inline",
        "button" | "img" | "input" | "select" | "textarea" | "video" => "inline-block",
        "head" | "link" | "meta" | "script" | "style" | "template" | "title" => "none",
        "li" => "list-item",
        "table" => "table",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        _ => "block",
    }
}

pub(crate) fn default_property(tag: &str, property: &str) -> Option<&'static str> {
    match property {
        "display" => Some(default_display(tag)),
        "direction" => Some("ltr"),
        "flex-direction" => Some("row"),
        "grid-auto-flow" => Some("row"),
        "position" => Some("static"),
        _ => None,
    }
}
