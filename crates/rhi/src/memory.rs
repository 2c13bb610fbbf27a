//! Device memory allocation.
//!
//! Every buffer and image is backed by its own `VkDeviceMemory`, created by
//! the allocate-then-bind protocol: query the resource's requirements, search
//! for a memory type that is both in the resource's type filter and has the
//! requested property flags, allocate, then bind at offset 0.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Returns the first memory type index that is set in `type_filter` and whose
/// property flags contain all of `properties`.
///
/// # Errors
///
/// [`RhiError::NoSuitableMemoryType`] when no index satisfies both.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> RhiResult<u32> {
    let count = memory_properties
        .memory_type_count
        .min(vk::MAX_MEMORY_TYPES as u32);

    (0..count)
        .find(|&i| {
            type_filter & (1 << i) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(RhiError::NoSuitableMemoryType {
            type_filter,
            properties,
        })
}

/// Owned `VkDeviceMemory` allocation, freed on drop.
pub struct DeviceMemory {
    device: Arc<Device>,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    properties: vk::MemoryPropertyFlags,
}

impl DeviceMemory {
    /// Allocates memory matching `requirements` with the given properties.
    pub fn allocate(
        device: Arc<Device>,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<Self> {
        let memory_type_index =
            device.find_memory_type(requirements.memory_type_bits, properties)?;

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.handle().allocate_memory(&alloc_info, None)? };

        debug!(
            "Allocated {} bytes from memory type {} ({:?})",
            requirements.size, memory_type_index, properties
        );

        Ok(Self {
            device,
            memory,
            size: requirements.size,
            properties,
        })
    }

    /// Returns the raw handle.
    #[inline]
    pub fn handle(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Size of the allocation (may exceed the resource size).
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Whether the host can map this allocation.
    #[inline]
    pub fn is_host_visible(&self) -> bool {
        self.properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
    }

    /// Maps, copies `data` to `offset`, and unmaps.
    ///
    /// Requires host-coherent memory; no explicit flush is issued.
    pub fn write(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        self.check_mappable(offset, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }
        unsafe {
            let ptr = self.device.handle().map_memory(
                self.memory,
                offset,
                data.len() as u64,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
            self.device.handle().unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Maps, copies `len` bytes starting at `offset` out, and unmaps.
    pub fn read(&self, offset: vk::DeviceSize, len: usize) -> RhiResult<Vec<u8>> {
        self.check_mappable(offset, len as u64)?;
        let mut out = vec![0u8; len];
        if len == 0 {
            return Ok(out);
        }
        unsafe {
            let ptr = self.device.handle().map_memory(
                self.memory,
                offset,
                len as u64,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(ptr.cast::<u8>(), out.as_mut_ptr(), len);
            self.device.handle().unmap_memory(self.memory);
        }
        Ok(out)
    }

    fn check_mappable(&self, offset: vk::DeviceSize, len: u64) -> RhiResult<()> {
        if !self.is_host_visible() {
            return Err(RhiError::InvalidHandle(
                "memory is not host visible".to_string(),
            ));
        }
        let end = offset.saturating_add(len);
        if end > self.size {
            return Err(RhiError::TransferOutOfBounds {
                requested: end,
                capacity: self.size,
            });
        }
        Ok(())
    }
}

impl Drop for DeviceMemory {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            memory_heap_count: 1,
            ..Default::default()
        };
        for (slot, flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
            slot.heap_index = 0;
        }
        props
    }

    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
            | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    #[test]
    fn test_find_memory_type_first_match() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);
        assert_eq!(find_memory_type(&props, 0b111, HOST).unwrap(), 1);
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
    }

    #[test]
    fn test_find_memory_type_respects_filter() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);
        // Type 1 is excluded, so the cached host type is the only candidate
        assert_eq!(find_memory_type(&props, 0b100, HOST).unwrap(), 2);
    }

    #[test]
    fn test_find_memory_type_result_satisfies_both_constraints() {
        let types = [
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | HOST,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ];
        let props = memory_properties(&types);
        let wanted = [
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ];
        for filter in 0u32..16 {
            for flags in wanted {
                if let Ok(index) = find_memory_type(&props, filter, flags) {
                    assert!(filter & (1 << index) != 0);
                    assert!(types[index as usize].contains(flags));
                } else {
                    assert!(
                        (0..types.len())
                            .all(|i| filter & (1 << i) == 0 || !types[i].contains(flags))
                    );
                }
            }
        }
    }

    #[test]
    fn test_find_memory_type_no_match() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let err = find_memory_type(&props, 0b1, HOST).unwrap_err();
        assert!(matches!(
            err,
            RhiError::NoSuitableMemoryType { type_filter: 0b1, .. }
        ));
    }

    #[test]
    fn test_find_memory_type_ignores_bits_past_count() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert!(find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::empty()).is_err());
    }
}
