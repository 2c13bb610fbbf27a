//! Swapchain creation, acquisition and presentation.
//!
//! A [`Swapchain`] is never resized in place. When the surface changes the
//! owner drops it and builds a new one; [`SwapchainConfig::choose`] re-derives
//! every parameter from the live surface each time. The choice is a pure
//! function of the queried [`SurfaceSupport`] so it can be tested without a
//! GPU.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::create_image_view;
use crate::physical_device::{QueueFamilyIndices, SurfaceRef};

/// What a surface offers on one physical device.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn query(physical_device: vk::PhysicalDevice, surface: SurfaceRef<'_>) -> RhiResult<Self> {
        let loader = surface.loader;
        let (capabilities, formats, present_modes) = unsafe {
            (
                loader.get_physical_device_surface_capabilities(physical_device, surface.handle)?,
                loader.get_physical_device_surface_formats(physical_device, surface.handle)?,
                loader.get_physical_device_surface_present_modes(physical_device, surface.handle)?,
            )
        };

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Parameters a swapchain is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub min_image_count: u32,
    pub sharing_mode: vk::SharingMode,
    /// Families sharing the images; empty for `EXCLUSIVE`.
    pub queue_families: Vec<u32>,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfig {
    /// Picks format, present mode, extent, image count and sharing.
    ///
    /// `width` x `height` is the live framebuffer size, consulted only when
    /// the surface reports the undefined-extent sentinel.
    pub fn choose(
        support: &SurfaceSupport,
        families: &QueueFamilyIndices,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "surface offers no formats or present modes".to_string(),
            ));
        }

        let (sharing_mode, queue_families) = sharing_mode(families);
        Ok(Self {
            surface_format: choose_surface_format(&support.formats)?,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, width, height),
            min_image_count: determine_image_count(&support.capabilities),
            sharing_mode,
            queue_families,
            pre_transform: support.capabilities.current_transform,
        })
    }
}

/// Owned `VkSwapchainKHR` plus one color view per image.
///
/// The images belong to the swapchain and go away with it.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    config: SwapchainConfig,
}

impl Swapchain {
    /// Queries `surface` and creates a swapchain for a `width` x `height`
    /// framebuffer.
    pub fn new(
        device: Arc<Device>,
        surface: SurfaceRef<'_>,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let support = SurfaceSupport::query(device.physical_device(), surface)?;
        let config = SwapchainConfig::choose(&support, device.queue_families(), width, height)?;

        info!(
            "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, min {} images",
            config.extent.width,
            config.extent.height,
            config.surface_format.format,
            config.surface_format.color_space,
            config.present_mode,
            config.min_image_count
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(config.min_image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(config.sharing_mode)
            .queue_family_indices(&config.queue_families)
            .pre_transform(config.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true);

        let loader = ash::khr::swapchain::Device::new(device.instance(), device.handle());
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

        let mut this = Self {
            device,
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            config,
        };

        // Drop releases whatever exists from here on
        this.images = unsafe { this.loader.get_swapchain_images(swapchain)? };
        for (i, &image) in this.images.iter().enumerate() {
            let view = create_image_view(
                &this.device,
                image,
                this.config.surface_format.format,
                vk::ImageAspectFlags::COLOR,
            )
            .map_err(|e| RhiError::SwapchainError(format!("image view {i}: {e}")))?;
            this.image_views.push(view);
        }

        debug!("Swapchain holds {} images", this.images.len());
        Ok(this)
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// Returns `(image_index, suboptimal)`. `ERROR_OUT_OF_DATE_KHR` is passed
    /// through so the caller can rebuild.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Presents `image_index` once `wait_semaphore` signals.
    ///
    /// Returns true when the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.config.surface_format.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }

    /// Images actually created, which may exceed the requested minimum.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Width over height of the current extent.
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.config.extent;
        if extent.height == 0 {
            return 1.0;
        }
        extent.width as f32 / extent.height as f32
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        for &view in &self.image_views {
            unsafe { self.device.handle().destroy_image_view(view, None) };
        }
        unsafe { self.loader.destroy_swapchain(self.swapchain, None) };

        info!(
            "Swapchain destroyed ({}x{}, {} images)",
            self.config.extent.width,
            self.config.extent.height,
            self.images.len()
        );
    }
}

/// `B8G8R8A8_SRGB` + `SRGB_NONLINEAR` when offered, else the first format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RhiResult<vk::SurfaceFormatKHR> {
    let preferred = formats.iter().copied().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match (preferred, formats.first()) {
        (Some(format), _) => Ok(format),
        (None, Some(&first)) => {
            warn!("B8G8R8A8_SRGB unavailable, using {:?}", first.format);
            Ok(first)
        }
        (None, None) => Err(RhiError::SwapchainError(
            "surface reports no formats".to_string(),
        )),
    }
}

/// MAILBOX when offered, else FIFO (always supported).
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, unless it is the `u32::MAX` sentinel; then
/// the framebuffer size clamped to the surface's min/max image extent.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: width.clamp(min.width, max.width),
        height: height.clamp(min.height, max.height),
    }
}

/// `min + 1`, capped at `max` when the surface has a maximum (non-zero).
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = capabilities.min_image_count + 1;
    match capabilities.max_image_count {
        0 => wanted,
        max => wanted.min(max),
    }
}

/// EXCLUSIVE when one family does both jobs, CONCURRENT over both otherwise.
pub fn sharing_mode(families: &QueueFamilyIndices) -> (vk::SharingMode, Vec<u32>) {
    match (families.graphics_family, families.present_family) {
        (Some(graphics), Some(present)) if graphics != present => {
            (vk::SharingMode::CONCURRENT, vec![graphics, present])
        }
        _ => (vk::SharingMode::EXCLUSIVE, Vec::new()),
    }
}
