//! Asset loading for the renderer.
//!
//! This crate turns files on disk into host-side data ready for upload:
//! - OBJ meshes, flattened into [`flightdeck_rhi::vertex::Vertex`] arrays
//! - Images, decoded to tightly packed RGBA8 pixels

mod error;

pub mod mesh;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use mesh::MeshData;
pub use texture::TextureData;
