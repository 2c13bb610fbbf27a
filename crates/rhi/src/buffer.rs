//! GPU buffer management.
//!
//! Vertex, index, uniform and staging buffers. Each [`Buffer`] owns a
//! dedicated [`DeviceMemory`] allocation bound at offset 0.
//!
//! # Overview
//!
//! - [`BufferUsage`] defines how a buffer will be used and where it lives
//! - [`Buffer`] wraps VkBuffer together with its memory
//!
//! Device-local buffers are filled through
//! [`TransferContext`](crate::transfer::TransferContext); host-visible ones
//! can be written directly with [`Buffer::write_data`].

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory::DeviceMemory;

/// Buffer usage type.
///
/// Defines the intended use of the buffer, which selects both the Vulkan
/// usage flags and the memory properties it is allocated with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer, device local, filled by a staged copy
    Vertex,
    /// Index buffer, device local, filled by a staged copy
    Index,
    /// Uniform buffer, host visible, rewritten every frame
    Uniform,
    /// Staging buffer, host visible copy source
    Staging,
    /// Host-visible copy destination used to read results back
    Readback,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
            BufferUsage::Readback => vk::BufferUsageFlags::TRANSFER_DST,
        }
    }

    /// Memory properties the backing allocation must have.
    pub fn memory_properties(self) -> vk::MemoryPropertyFlags {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            BufferUsage::Uniform | BufferUsage::Staging | BufferUsage::Readback => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }

    /// Whether the host can write this buffer directly.
    pub fn is_host_visible(self) -> bool {
        self.memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
            BufferUsage::Readback => "readback",
        }
    }
}

/// GPU buffer with its own memory allocation.
///
/// # Thread Safety
///
/// The buffer itself is not thread-safe. Synchronize access externally
/// when sharing between threads.
pub struct Buffer {
    // Field order: the buffer is destroyed in Drop before `memory` is freed
    device: Arc<Device>,
    buffer: vk::Buffer,
    memory: DeviceMemory,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a new buffer with the specified size.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero, no memory type fits, or any
    /// Vulkan call fails. Partially created objects are released.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let memory =
            match DeviceMemory::allocate(device.clone(), requirements, usage.memory_properties()) {
                Ok(memory) => memory,
                Err(e) => {
                    unsafe { device.handle().destroy_buffer(buffer, None) };
                    return Err(e);
                }
            };

        if let Err(e) = unsafe { device.handle().bind_buffer_memory(buffer, memory.handle(), 0) } {
            unsafe { device.handle().destroy_buffer(buffer, None) };
            return Err(e.into());
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            usage,
        })
    }

    /// Creates a host-visible buffer and initializes it with data.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Writes data to the buffer at the specified offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not host visible or the write
    /// would exceed the buffer size.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        self.check_range(offset, data.len())?;
        self.memory.write(offset, data)
    }

    /// Reads `len` bytes starting at `offset` from a host-visible buffer.
    pub fn read_data(&self, offset: vk::DeviceSize, len: usize) -> RhiResult<Vec<u8>> {
        self.check_range(offset, len)?;
        self.memory.read(offset, len)
    }

    fn check_range(&self, offset: vk::DeviceSize, len: usize) -> RhiResult<()> {
        let end = offset.saturating_add(len as vk::DeviceSize);
        if end > self.size {
            return Err(RhiError::TransferOutOfBounds {
                requested: end,
                capacity: self.size,
            });
        }
        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // Buffer first; `memory` is freed afterwards by its own Drop
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
        assert_eq!(
            BufferUsage::Readback.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_DST
        );
    }

    #[test]
    fn test_buffer_usage_memory_properties() {
        assert_eq!(
            BufferUsage::Vertex.memory_properties(),
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        );
        assert_eq!(
            BufferUsage::Index.memory_properties(),
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        );
        for usage in [
            BufferUsage::Uniform,
            BufferUsage::Staging,
            BufferUsage::Readback,
        ] {
            assert!(usage.is_host_visible());
            assert!(
                usage
                    .memory_properties()
                    .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
            );
        }
        assert!(!BufferUsage::Vertex.is_host_visible());
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Staging.name(), "staging");
        assert_eq!(BufferUsage::Readback.name(), "readback");
    }
}
