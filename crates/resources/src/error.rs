//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The OBJ parser rejected the input.
    #[error("Failed to load OBJ '{path}': {message}")]
    ObjLoad {
        /// Source of the data (a file path, or `<memory>` for readers).
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The OBJ file parsed but produced no triangles.
    #[error("Mesh '{0}' contains no triangles")]
    EmptyMesh(PathBuf),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
