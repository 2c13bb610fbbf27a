//! Window creation and resize tracking.
//!
//! Resize events only update a [`ResizeState`]; the application polls it once
//! per frame and forwards the latest size to the renderer, which acts on it at
//! the next acquire/present boundary.

use std::ffi::c_char;
use std::sync::Arc;

use raw_window_handle::HasDisplayHandle;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use flightdeck_core::{Error, Result, WindowConfig};

use crate::surface::{Surface, required_extensions};

/// Last framebuffer size seen by the event loop plus a "changed" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeState {
    width: u32,
    height: u32,
    pending: bool,
}

impl ResizeState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pending: false,
        }
    }

    /// Stores a reported size. Repeats of the current size are ignored.
    pub fn record(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.pending = true;
        }
    }

    /// Returns the new size once per change.
    pub fn take(&mut self) -> Option<(u32, u32)> {
        std::mem::take(&mut self.pending).then_some((self.width, self.height))
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// A minimized window reports 0x0 (or a zero on one axis).
    #[inline]
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Resizable application window.
pub struct Window {
    window: Arc<WinitWindow>,
    resize: ResizeState,
}

impl Window {
    /// Opens a window sized and titled from `config`.
    pub fn new(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        let size = window.inner_size();
        tracing::info!(
            "Window '{}' created: {}x{}",
            config.title,
            size.width,
            size.height
        );

        Ok(Self {
            window: Arc::new(window),
            resize: ResizeState::new(size.width, size.height),
        })
    }

    #[inline]
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Drawable size queried from the live window.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Feeds a `Resized` event into the polled state.
    pub fn record_resize(&mut self, width: u32, height: u32) {
        tracing::debug!("Window resized: {}x{}", width, height);
        self.resize.record(width, height);
    }

    /// New framebuffer size, if one arrived since the last call.
    pub fn take_resize(&mut self) -> Option<(u32, u32)> {
        self.resize.take()
    }

    pub fn is_minimized(&self) -> bool {
        self.resize.is_minimized()
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Instance extensions needed to create a surface for this window.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("no display handle: {e}")))?;
        required_extensions(display.as_raw())
    }

    /// Creates the Vulkan surface this window presents through.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        Surface::new(self, entry, instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_reported_once() {
        let mut state = ResizeState::new(800, 600);
        assert_eq!(state.take(), None);

        state.record(1024, 768);
        assert_eq!(state.take(), Some((1024, 768)));
        assert_eq!(state.take(), None);
    }

    #[test]
    fn test_same_size_is_not_a_resize() {
        let mut state = ResizeState::new(800, 600);
        state.record(800, 600);
        assert_eq!(state.take(), None);
    }

    #[test]
    fn test_latest_size_wins() {
        let mut state = ResizeState::new(800, 600);
        state.record(640, 480);
        state.record(1280, 720);
        assert_eq!(state.take(), Some((1280, 720)));
    }

    #[test]
    fn test_minimized_size_is_reported() {
        let mut state = ResizeState::new(800, 600);
        assert!(!state.is_minimized());

        state.record(0, 0);
        assert!(state.is_minimized());
        assert_eq!(state.take(), Some((0, 0)));
    }
}
