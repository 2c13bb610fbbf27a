//! Vulkan presentation surface.

use std::ffi::{CStr, c_char};

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};

use flightdeck_core::{Error, Result};

use crate::window::Window;

/// Owned `VkSurfaceKHR`, destroyed on drop.
///
/// The instance the surface was created from must outlive it; the renderer
/// guarantees this by declaring the surface before the instance.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Creates a surface presenting to `window`.
    ///
    /// # Errors
    ///
    /// Fails if the window no longer has valid raw handles or the platform
    /// surface extension rejects them.
    pub fn new(window: &Window, entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        let winit = window.inner();
        let display = winit
            .display_handle()
            .map_err(|e| Error::Window(format!("no display handle: {e}")))?;
        let target = winit
            .window_handle()
            .map_err(|e| Error::Window(format!("no window handle: {e}")))?;

        // SAFETY: both handles come from a live winit window, and the caller
        // keeps `instance` alive for as long as the returned surface.
        let handle = unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), target.as_raw(), None)
        }
        .map_err(|e| Error::Vulkan(format!("surface creation failed: {e}")))?;

        tracing::info!("Vulkan surface created");

        Ok(Self {
            handle,
            loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader used to query capabilities, formats and present modes.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: created by `Surface::new` from the same instance as the loader.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// Instance extensions the platform needs to create a surface on `display`.
///
/// The returned pointers reference static strings owned by `ash-window`.
pub fn required_extensions(display: RawDisplayHandle) -> Result<Vec<*const c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display)
        .map_err(|e| Error::Vulkan(format!("cannot enumerate surface extensions: {e}")))?;

    tracing::debug!(
        "Surface extensions: {:?}",
        extensions
            .iter()
            // SAFETY: ash-window hands out NUL-terminated static names.
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect::<Vec<_>>()
    );

    Ok(extensions.to_vec())
}
