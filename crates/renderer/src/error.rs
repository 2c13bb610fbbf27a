//! Renderer error types.

use ash::vk;
use flightdeck_resources::ResourceError;
use flightdeck_rhi::RhiError;
use thiserror::Error;

/// Errors surfaced by [`crate::Renderer`].
#[derive(Error, Debug)]
pub enum RendererError {
    /// A GPU operation failed.
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// An asset could not be loaded.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Window or configuration failure.
    #[error(transparent)]
    Core(#[from] flightdeck_core::Error),

    /// Geometry updates must keep the vertex count the buffers were created with.
    #[error("Vertex count mismatch: expected {expected}, got {actual}")]
    VertexCountMismatch { expected: usize, actual: usize },

    /// Geometry updates must keep the index count the buffers were created with.
    #[error("Index count mismatch: expected {expected}, got {actual}")]
    IndexCountMismatch { expected: usize, actual: usize },

    /// There is nothing to upload.
    #[error("Mesh has no vertices or no indices")]
    EmptyMesh,
}

impl From<vk::Result> for RendererError {
    fn from(result: vk::Result) -> Self {
        Self::Rhi(RhiError::VulkanError(result))
    }
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = Result<T, RendererError>;
