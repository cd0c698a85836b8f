//! Resource-type vocabulary.
//!
//! Classification is derived, never stored: a request maps to one of these
//! types, and the type decides which strategy and which fallback apply.

use serde::{Deserialize, Serialize};

/// Coarse classification of an intercepted request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A top-level document load.
    Page,
    Stylesheet,
    Script,
    Image,
    /// Anything the classifier cannot place; routed online-first.
    Other,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Page => write!(f, "page"),
            ResourceType::Stylesheet => write!(f, "stylesheet"),
            ResourceType::Script => write!(f, "script"),
            ResourceType::Image => write!(f, "image"),
            ResourceType::Other => write!(f, "other"),
        }
    }
}
