//! Error types for the editor

use pagecraft_dom::{DomError, NodeId, SelectorError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Element is not eligible for inline editing: {0}")]
    NotEditable(NodeId),

    #[error("Mutation index out of range: {0}")]
    IndexOutOfRange(usize),
}

pub type EditorResult<T> = Result<T, EditorError>;
