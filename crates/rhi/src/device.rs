//! Vulkan logical device and queue management.
//!
//! The [`Device`] owns the logical device, its graphics and present queues,
//! and the physical-device properties the rest of the RHI needs (memory types
//! for the allocate-then-bind path, format support for the depth probe,
//! sampler limits). It is shared as `Arc<Device>` by every resource wrapper.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::memory::find_memory_type;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices, REQUIRED_DEVICE_EXTENSIONS};

/// Vulkan logical device wrapper.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Instance function table, kept for physical-device queries.
    instance: ash::Instance,
    /// Selected physical device and its cached properties.
    physical: PhysicalDeviceInfo,
    /// Graphics queue handle.
    graphics_queue: vk::Queue,
    /// Presentation queue handle (may equal the graphics queue).
    present_queue: vk::Queue,
}

impl Device {
    /// Creates the logical device.
    ///
    /// One queue is created per distinct family at priority 1.0. Presenting
    /// devices enable `VK_KHR_swapchain`; `samplerAnisotropy` is always on.
    /// Instance layers are repeated at device level for older loaders.
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let queue_families = &physical_device_info.queue_families;
        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(RhiError::NoSuitableGpu);
        };

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

        let extension_names: Vec<*const std::ffi::c_char> = if physical_device_info.presentable {
            REQUIRED_DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect()
        } else {
            Vec::new()
        };
        let layer_names: Vec<*const std::ffi::c_char> =
            instance.enabled_layers().iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            extension_names.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!(
            "Queues retrieved (graphics family {}, present family {})",
            graphics_family, present_family
        );

        Ok(Arc::new(Self {
            device,
            instance: instance.handle().clone(),
            physical: physical_device_info.clone(),
            graphics_queue,
            present_queue,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the instance function table this device was created from.
    #[inline]
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical.device
    }

    /// Returns the cached physical device information.
    #[inline]
    pub fn physical_info(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.physical.queue_families
    }

    /// Graphics family index; always present on a constructed device.
    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.physical.queue_families.graphics_family.unwrap_or(0)
    }

    /// Finds a memory type allowed by `type_filter` with all of `properties`.
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<u32> {
        find_memory_type(&self.physical.memory_properties, type_filter, properties)
    }

    /// Queries format support on the physical device.
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical.device, format)
        }
    }

    /// Blocks until all queues are idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits command buffers to the graphics queue.
    ///
    /// # Safety
    ///
    /// The command buffers must be fully recorded and the fence (if not null)
    /// must be unsignaled and not in use by another submission.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }

    /// Blocks until the graphics queue has drained.
    pub fn graphics_queue_wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.queue_wait_idle(self.graphics_queue)? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// ash::Device and ash::Instance are function tables; the remaining fields are
// plain handles and POD property structs.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
