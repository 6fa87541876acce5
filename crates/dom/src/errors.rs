//! Error types for the page substrate

use thiserror::Error;
use tubedeck_core_types::NodeId;

/// Substrate error enumeration
#[derive(Debug, Error, Clone)]
pub enum DomError {
    /// Node id does not name a live node
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// Operation requires an element but the node is a text node
    #[error("not an element: {0}")]
    NotAnElement(NodeId),

    /// Operation requires a text node but the node is an element
    #[error("not a text node: {0}")]
    NotAText(NodeId),

    /// Selector string could not be parsed
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Structural operation would corrupt the tree
    #[error("invalid tree operation: {0}")]
    InvalidOperation(String),
}

impl DomError {
    pub fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }
}
