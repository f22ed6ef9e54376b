//! Error types for constraint assembly.

use thiserror::Error;

/// Result type alias using the crate Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or projecting the constraint system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed mesh: degenerate/inverted elements, non-manifold faces,
    /// bad node indices.
    #[error("topology error: {0}")]
    Topology(String),

    /// A write that does not match the declared sparsity pattern.
    #[error("sparsity error: {0}")]
    Sparsity(String),

    /// Row/column offsets or buffer sizes inconsistent with the layout.
    #[error("layout error: {0}")]
    Layout(String),

    /// Contact or attachment record referring to something that does not exist.
    #[error("contact error: {0}")]
    Contact(String),

    /// Invalid material properties.
    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
