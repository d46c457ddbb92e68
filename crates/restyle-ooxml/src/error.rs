//! Error types for OOXML operations

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading, classifying or rebuilding a
/// package.
///
/// Input-validity problems (`NotAPackage`, `MissingPart`,
/// `InvalidStructure`) are always surfaced to the caller. Classification
/// ambiguity never raises; messy paragraphs degrade to documented
/// fallback elements instead.
#[derive(Error, Debug)]
pub enum OoxmlError {
    /// The file is not a zip-based office package
    #[error("not an office package (zip magic missing): {0}")]
    NotAPackage(PathBuf),

    /// Error reading or writing the ZIP archive
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Error reading or writing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing XML content
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A required package part is missing
    #[error("required package part not found: {0}")]
    MissingPart(String),

    /// The package violates the expected layout
    #[error("invalid package structure: {0}")]
    InvalidStructure(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for OOXML operations
pub type Result<T> = std::result::Result<T, OoxmlError>;
