//! Error types for dassort-renderer.

use thiserror::Error;

/// Failures while substituting `${name}` tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The template names a variable nobody defined.
    #[error("template variable '{name}' is not defined")]
    MissingVariable { name: String },

    /// The variable exists but holds null, a list or an object.
    #[error("template variable '{name}' holds {kind}, which cannot be rendered as text")]
    NotRenderable { name: String, kind: &'static str },
}
