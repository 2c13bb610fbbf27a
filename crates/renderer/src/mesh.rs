//! Device-local vertex and index buffers.

use flightdeck_resources::MeshData;
use flightdeck_rhi::buffer::{Buffer, BufferUsage};
use flightdeck_rhi::transfer::TransferContext;
use flightdeck_rhi::vertex::Vertex;
use tracing::{debug, info};

use crate::error::{RendererError, RendererResult};

/// The geometry drawn every frame.
///
/// Counts are fixed at creation; updates may rewrite contents but never
/// resize.
pub struct MeshBuffers {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_count: usize,
    index_count: usize,
}

impl MeshBuffers {
    /// Uploads `mesh` through staging buffers.
    pub fn upload(transfer: &TransferContext, mesh: &MeshData) -> RendererResult<Self> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(RendererError::EmptyMesh);
        }

        let vertex_buffer =
            transfer.upload_buffer(BufferUsage::Vertex, bytemuck::cast_slice(&mesh.vertices))?;
        let index_buffer =
            transfer.upload_buffer(BufferUsage::Index, bytemuck::cast_slice(&mesh.indices))?;

        info!(
            "Mesh uploaded: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: mesh.vertices.len(),
            index_count: mesh.indices.len(),
        })
    }

    /// Overwrites the vertex contents in place.
    ///
    /// The caller guarantees no in-flight frame still reads the buffer.
    pub fn write_vertices(
        &self,
        transfer: &TransferContext,
        vertices: &[Vertex],
    ) -> RendererResult<()> {
        validate_update(self.vertex_count, self.index_count, vertices.len(), self.index_count)?;
        transfer.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices))?;
        debug!("Rewrote {} vertices", vertices.len());
        Ok(())
    }

    #[inline]
    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    #[inline]
    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.index_count
    }
}

/// Checks that an update keeps both counts the buffers were created with.
///
/// Vertex count is checked first.
pub fn validate_update(
    expected_vertices: usize,
    expected_indices: usize,
    vertices: usize,
    indices: usize,
) -> RendererResult<()> {
    if vertices != expected_vertices {
        return Err(RendererError::VertexCountMismatch {
            expected: expected_vertices,
            actual: vertices,
        });
    }
    if indices != expected_indices {
        return Err(RendererError::IndexCountMismatch {
            expected: expected_indices,
            actual: indices,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_counts_pass() {
        assert!(validate_update(4, 6, 4, 6).is_ok());
    }

    #[test]
    fn test_vertex_mismatch() {
        let err = validate_update(4, 6, 5, 6).unwrap_err();
        assert!(matches!(
            err,
            RendererError::VertexCountMismatch {
                expected: 4,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_index_mismatch() {
        let err = validate_update(4, 6, 4, 3).unwrap_err();
        assert!(matches!(
            err,
            RendererError::IndexCountMismatch {
                expected: 6,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_vertex_checked_first() {
        let err = validate_update(4, 6, 0, 0).unwrap_err();
        assert!(matches!(err, RendererError::VertexCountMismatch { .. }));
    }
}
