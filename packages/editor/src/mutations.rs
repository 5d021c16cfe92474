//! # Declarative Mutations
//!
//! Serializable instructions describing one change to every element a
//! selector matches. The JSON shape is a wire contract shared with the
//! replay runtime:
//!
//! ```json
//! { "selector": "#x", "action": "set", "attribute": "html", "value": "Hi" }
//! ```
//!
//! ## Pseudo-attributes
//!
//! - `html`: the element's inner markup
//! - `class`: whitespace-separated class tokens
//! - `style`: inline style declarations
//! - `position`: reparenting under `parentSelector`, before
//!   `insertBeforeSelector` when given
//!
//! Any other attribute name is a plain element attribute.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const ATTR_HTML: &str = "html";
pub const ATTR_CLASS: &str = "class";
pub const ATTR_STYLE: &str = "style";
pub const ATTR_POSITION: &str = "position";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationAction {
    Append,
    Set,
    Remove,
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationAction::Append => write!(f, "append"),
            MutationAction::Set => write!(f, "set"),
            MutationAction::Remove => write!(f, "remove"),
        }
    }
}

/// How the `attribute` field of a mutation is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind<'a> {
    Html,
    Class,
    Style,
    Position,
    Attribute(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativeMutation {
    pub selector: String,
    pub action: MutationAction,
    pub attribute: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_before_selector: Option<String>,
}

/// Where a `position` mutation moves its target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionTarget {
    pub parent_selector: String,
    pub insert_before_selector: Option<String>,
}

impl PositionTarget {
    pub fn new(parent_selector: impl Into<String>, insert_before_selector: Option<String>) -> Self {
        Self {
            parent_selector: parent_selector.into(),
            insert_before_selector,
        }
    }
}

impl DeclarativeMutation {
    pub fn new(
        selector: impl Into<String>,
        action: MutationAction,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            action,
            attribute: attribute.into(),
            value: None,
            parent_selector: None,
            insert_before_selector: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// `set html`, the mutation an inline edit commits
    pub fn set_html(selector: impl Into<String>, html: impl Into<String>) -> Self {
        Self::new(selector, MutationAction::Set, ATTR_HTML).with_value(html)
    }

    pub fn position(selector: impl Into<String>, target: PositionTarget) -> Self {
        Self {
            parent_selector: Some(target.parent_selector),
            insert_before_selector: target.insert_before_selector,
            ..Self::new(selector, MutationAction::Set, ATTR_POSITION)
        }
    }

    pub fn kind(&self) -> MutationKind<'_> {
        match self.attribute.as_str() {
            ATTR_HTML => MutationKind::Html,
            ATTR_CLASS => MutationKind::Class,
            ATTR_STYLE => MutationKind::Style,
            ATTR_POSITION => MutationKind::Position,
            other => MutationKind::Attribute(other),
        }
    }

    pub fn is_position(&self) -> bool {
        self.kind() == MutationKind::Position
    }

    pub fn position_target(&self) -> Option<PositionTarget> {
        if !self.is_position() {
            return None;
        }
        self.parent_selector
            .as_ref()
            .map(|parent| PositionTarget::new(parent.clone(), self.insert_before_selector.clone()))
    }

    pub fn value_or_empty(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

impl fmt::Display for DeclarativeMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on {}", self.action, self.attribute, self.selector)
    }
}

/// One experiment arm's mutations and global CSS/JS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub variation_id: String,

    #[serde(default)]
    pub css: String,

    #[serde(default)]
    pub js: String,

    #[serde(default)]
    pub dom_mutations: Vec<DeclarativeMutation>,
}

/// What the persistence API stores for a variation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationPayload {
    pub dom_mutations: Vec<DeclarativeMutation>,
    pub css: String,
    pub js: String,
    pub description: String,
}

impl Variation {
    pub fn to_payload(&self) -> VariationPayload {
        VariationPayload {
            dom_mutations: self.dom_mutations.clone(),
            css: self.css.clone(),
            js: self.js.clone(),
            description: self.description.clone(),
        }
    }
}
