use crate::NodeId;
use thiserror::Error;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node is not an element: {0}")]
    NotAnElement(NodeId),

    #[error("Node cannot have children: {0}")]
    NotAContainer(NodeId),

    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Inserting {child} under {parent} would create a cycle")]
    CycleDetected { parent: NodeId, child: NodeId },

    #[error("No caret is placed in the document")]
    NoCaret,

    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Unexpected token at {pos}: expected {expected}, found {found}")]
    UnexpectedToken {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of selector at {pos}")]
    UnexpectedEnd { pos: usize },

    #[error("Unsupported pseudo-class at {pos}: {name}")]
    Unsupported { pos: usize, name: String },

    #[error("Invalid nth expression at {pos}: {text}")]
    InvalidNth { pos: usize, text: String },

    #[error("Invalid character at {pos}")]
    Lexer { pos: usize },

    #[error("Empty selector")]
    Empty,
}

impl SelectorError {
    pub fn unexpected_token(pos: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            pos,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_end(pos: usize) -> Self {
        Self::UnexpectedEnd { pos }
    }

    pub fn unsupported(pos: usize, name: impl Into<String>) -> Self {
        Self::Unsupported {
            pos,
            name: name.into(),
        }
    }

    pub fn invalid_nth(pos: usize, text: impl Into<String>) -> Self {
        Self::InvalidNth {
            pos,
            text: text.into(),
        }
    }
}
