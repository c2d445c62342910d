//! Error types for the translator.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for translation operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The flat document has nothing to translate
    #[error("No materials found to convert")]
    NoMaterials,

    /// Malformed glTF content
    #[error("Invalid glTF document: {0}")]
    InvalidGltf(String),

    /// Malformed graph document content
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// No node definition matches a category/type pair or name
    #[error("Node definition not found: {0}")]
    NodeDefNotFound(String),

    /// Input name is not declared on the node definition
    #[error("Input '{input}' is not defined on '{nodedef}'")]
    UnknownInput { nodedef: String, input: String },

    /// Output name is not declared on the node definition
    #[error("Output '{output}' is not defined on '{nodedef}'")]
    UnknownOutput { nodedef: String, output: String },

    /// Element not found by name or path
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Value or connection type does not match the declared type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Value string cannot be parsed as the declared type
    #[error("Invalid {type_name} value: '{value}'")]
    InvalidValue { type_name: String, value: String },

    /// glTF sampler code without a graph-side equivalent
    #[error("Unknown {field} code: {code}")]
    UnknownSamplerCode { field: &'static str, code: u32 },

    /// Graph-side address/filter mode without a glTF equivalent
    #[error("Unknown {field} mode: {mode}")]
    UnknownSamplerMode { field: &'static str, mode: String },

    /// Alpha mode integer outside OPAQUE/MASK/BLEND
    #[error("Unknown alpha mode: {0}")]
    UnknownAlphaMode(i32),

    /// Index reference outside its collection
    #[error("{collection} index {index} out of bounds (count: {count})")]
    IndexOutOfBounds { collection: &'static str, index: usize, count: usize },

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid document error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch { expected: expected.into(), actual: actual.into() }
    }

    /// Check a glTF index reference against its collection length.
    pub fn check_index(collection: &'static str, index: usize, count: usize) -> Result<usize> {
        if index < count {
            Ok(index)
        } else {
            Err(Self::IndexOutOfBounds { collection, index, count })
        }
    }
}

/// Result type alias for translation operations.
pub type Result<T> = std::result::Result<T, Error>;
