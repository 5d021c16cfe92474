//! # Pagecraft DOM
//!
//! The host page as the editor sees it: an arena document tree with
//! change records, lenient HTML fragment parsing, CSS selector matching,
//! and the layout facts (computed style, boxes, caret) a browser would
//! normally supply.

pub mod document;
pub mod error;
mod html;
pub mod node;
pub mod selector;
pub mod style;

pub use document::{Ancestors, Caret, Descendants, Document, MutationRecord, RecordKind};
pub use error::{DomError, DomResult, SelectorError};
pub use node::{is_raw_text_element, is_void_element, Attribute, ElementData, NodeData, NodeId};
pub use selector::{escape_identifier, SelectorList};
pub use style::{merge_declarations, parse_declarations, serialize_declarations, Rect};
