//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides RAII wrappers over Vulkan using the `ash` crate.
//! It handles:
//! - Instance, physical device selection and logical device creation
//! - Device memory, buffers, images and samplers
//! - Blocking staged transfers and image layout transitions
//! - Swapchain, render pass and framebuffers
//! - Descriptor sets, shaders and the graphics pipeline
//! - Synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod memory;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod transfer;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
