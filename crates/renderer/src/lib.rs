//! Frame pipelining on top of the RHI.
//!
//! This crate orchestrates the rendering process:
//! - Frame slots, image ownership and the rebuild decisions ([`scheduler`])
//! - Swapchain-dependent resources and their rebuild ([`targets`])
//! - Device-local mesh buffers and same-size updates ([`mesh`])
//! - The per-frame acquire, record, submit, present cycle ([`Renderer`])

mod error;
mod renderer;

pub mod mesh;
pub mod scheduler;
pub mod targets;
pub mod ubo;

pub use error::{RendererError, RendererResult};
pub use renderer::{Renderer, TEXTURE_FORMAT};
pub use scheduler::{FrameOutcome, MAX_FRAMES_IN_FLIGHT};
pub use ubo::UniformBufferObject;
