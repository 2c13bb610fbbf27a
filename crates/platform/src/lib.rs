//! Windowing and presentation surface for flightdeck.
//!
//! - [`Window`]: winit window with a polled [`ResizeState`]
//! - [`Surface`]: owned Vulkan surface plus the instance extensions it needs

mod surface;
mod window;

pub use surface::{Surface, required_extensions};
pub use window::{ResizeState, Window};

pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
