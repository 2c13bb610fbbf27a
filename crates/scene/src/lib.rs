//! Host-side geometry for the renderer.
//!
//! Shapes are built in normalized device space (origin at the center of the
//! window, bounds -1 to +1) at z = 0 and appended to a shared vertex/index
//! pair so several primitives can go out in one indexed draw.

pub mod shapes;

pub use shapes::{Geometry, default_quads};
