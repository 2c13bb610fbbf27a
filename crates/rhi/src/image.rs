//! Images, image views and format selection.
//!
//! [`Image`] owns a 2D VkImage, its dedicated memory and a single view over
//! all of it. It backs both sampled textures and the depth attachment.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory::DeviceMemory;

/// Depth formats tried in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Parameters for [`Image::new`].
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub memory_properties: vk::MemoryPropertyFlags,
    pub aspect: vk::ImageAspectFlags,
}

impl ImageDesc {
    /// Device-local, optimally tiled color texture that can be filled by a copy.
    pub fn texture(extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            memory_properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// Device-local depth attachment.
    pub fn depth(extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            memory_properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            aspect: vk::ImageAspectFlags::DEPTH,
        }
    }
}

/// A 2D image with memory and a view.
///
/// # Resource Destruction
///
/// Resources are destroyed in the following order:
/// 1. Image view
/// 2. Image
/// 3. Memory
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    memory: DeviceMemory,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Image {
    /// Creates the image, allocates and binds its memory, then creates a view.
    ///
    /// The image starts in `UNDEFINED` layout.
    pub fn new(device: Arc<Device>, desc: &ImageDesc) -> RhiResult<Self> {
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(RhiError::InvalidHandle(
                "Image dimensions must be greater than 0".to_string(),
            ));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(desc.tiling)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };
        let memory =
            match DeviceMemory::allocate(device.clone(), requirements, desc.memory_properties) {
                Ok(memory) => memory,
                Err(e) => {
                    unsafe { device.handle().destroy_image(image, None) };
                    return Err(e);
                }
            };

        if let Err(e) = unsafe { device.handle().bind_image_memory(image, memory.handle(), 0) } {
            unsafe { device.handle().destroy_image(image, None) };
            return Err(e.into());
        }

        let view = match create_image_view(&device, image, desc.format, desc.aspect) {
            Ok(view) => view,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        debug!(
            "Created image {}x{} {:?}",
            desc.extent.width, desc.extent.height, desc.format
        );

        Ok(Self {
            device,
            image,
            view,
            memory,
            format: desc.format,
            extent: desc.extent,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Size in bytes of the backing allocation.
    #[inline]
    pub fn memory_size(&self) -> vk::DeviceSize {
        self.memory.size()
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }
    }
}

/// Creates a 2D view covering mip 0 and layer 0 of `image`.
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> RhiResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    Ok(unsafe { device.handle().create_image_view(&view_info, None)? })
}

/// Returns the first candidate whose `query`ed properties include `features`
/// for the given tiling.
pub fn select_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    query: impl Fn(vk::Format) -> vk::FormatProperties,
) -> RhiResult<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            let props = query(format);
            match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
        .ok_or_else(|| RhiError::UnsupportedFormat {
            candidates: candidates.to_vec(),
            features,
        })
}

/// Picks the depth attachment format for `device`.
pub fn find_depth_format(device: &Device) -> RhiResult<vk::Format> {
    let format = select_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        |format| device.format_properties(format),
    )?;
    info!("Depth format: {:?}", format);
    Ok(format)
}

/// Whether `format` carries a stencil component.
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimal(features: vk::FormatFeatureFlags) -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: features,
            ..Default::default()
        }
    }

    #[test]
    fn test_select_first_supported_candidate() {
        let format = select_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| optimal(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT),
        )
        .unwrap();
        assert_eq!(format, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_select_skips_unsupported() {
        let format = select_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |f| {
                if f == vk::Format::D24_UNORM_S8_UINT {
                    optimal(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
                } else {
                    optimal(vk::FormatFeatureFlags::SAMPLED_IMAGE)
                }
            },
        )
        .unwrap();
        assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn test_select_checks_the_requested_tiling() {
        // Linear support alone is not enough for an optimal request
        let result = select_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| vk::FormatProperties {
                linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(RhiError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_select_none_supported() {
        let err = select_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| vk::FormatProperties::default(),
        )
        .unwrap_err();
        match err {
            RhiError::UnsupportedFormat { candidates, .. } => {
                assert_eq!(candidates, DEPTH_FORMAT_CANDIDATES.to_vec());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_has_stencil_component() {
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
        assert!(has_stencil_component(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(has_stencil_component(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn test_image_desc_presets() {
        let extent = vk::Extent2D {
            width: 4,
            height: 4,
        };
        let tex = ImageDesc::texture(extent, vk::Format::R8G8B8A8_SRGB);
        assert!(tex.usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert!(tex.usage.contains(vk::ImageUsageFlags::TRANSFER_DST));
        assert_eq!(tex.aspect, vk::ImageAspectFlags::COLOR);

        let depth = ImageDesc::depth(extent, vk::Format::D32_SFLOAT);
        assert_eq!(depth.usage, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(depth.aspect, vk::ImageAspectFlags::DEPTH);
    }
}
