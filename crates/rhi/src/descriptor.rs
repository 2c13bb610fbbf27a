//! Per-image descriptor sets.
//!
//! Each swapchain image gets one descriptor set with two bindings:
//!
//! | binding | type                     | stage    |
//! |---------|--------------------------|----------|
//! | 0       | `UNIFORM_BUFFER`         | vertex   |
//! | 1       | `COMBINED_IMAGE_SAMPLER` | fragment |
//!
//! [`FrameDescriptors`] owns a pool sized to exactly one set per image plus
//! the sets themselves, written once at creation. Rebuilding the swapchain
//! drops it and creates a new one.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

pub const UNIFORM_BINDING: u32 = 0;
pub const SAMPLER_BINDING: u32 = 1;

/// Layout shared by every per-image set. Outlives swapchain rebuilds.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Layout with the uniform buffer and texture sampler bindings.
    pub fn uniform_and_sampler(device: Arc<Device>) -> RhiResult<Self> {
        let bindings = frame_bindings();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool plus one written set per swapchain image.
///
/// The pool is created without `FREE_DESCRIPTOR_SET`; the sets are released
/// together with it.
pub struct FrameDescriptors {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl FrameDescriptors {
    /// Allocates `uniforms.len()` sets, pointing set `i` at `uniforms[i]` and
    /// every set at the same `texture`.
    pub fn new(
        device: Arc<Device>,
        layout: &DescriptorSetLayout,
        uniforms: &[vk::DescriptorBufferInfo],
        texture: vk::DescriptorImageInfo,
    ) -> RhiResult<Self> {
        let count = u32::try_from(uniforms.len())
            .map_err(|_| RhiError::InvalidHandle("too many descriptor sets".to_string()))?;

        let sizes = pool_sizes(count);
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(count)
            .pool_sizes(&sizes);
        let pool = unsafe { device.handle().create_descriptor_pool(&pool_info, None)? };

        let layouts = vec![layout.handle(); uniforms.len()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = match unsafe { device.handle().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(e) => {
                unsafe { device.handle().destroy_descriptor_pool(pool, None) };
                return Err(e.into());
            }
        };

        for (&set, &uniform) in sets.iter().zip(uniforms) {
            write_set(&device, set, uniform, texture);
        }

        debug!("Allocated and wrote {} descriptor set(s)", sets.len());

        Ok(Self { device, pool, sets })
    }

    /// Set used by frames targeting swapchain image `image`.
    #[inline]
    pub fn set(&self, image: usize) -> Option<vk::DescriptorSet> {
        self.sets.get(image).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl Drop for FrameDescriptors {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Descriptor pool destroyed ({} sets)", self.sets.len());
    }
}

fn write_set(
    device: &Device,
    set: vk::DescriptorSet,
    uniform: vk::DescriptorBufferInfo,
    texture: vk::DescriptorImageInfo,
) {
    let buffer_infos = [uniform];
    let image_infos = [texture];

    let writes = [
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_infos),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(SAMPLER_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos),
    ];

    unsafe {
        device.handle().update_descriptor_sets(&writes, &[]);
    }
}

/// Bindings of the per-image descriptor set.
pub fn frame_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        vk::DescriptorSetLayoutBinding::default()
            .binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX),
        vk::DescriptorSetLayoutBinding::default()
            .binding(SAMPLER_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// One descriptor of each type per image, nothing spare.
pub fn pool_sizes(image_count: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: image_count,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: image_count,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bindings() {
        let [ubo, sampler] = frame_bindings();
        assert_eq!(ubo.binding, 0);
        assert_eq!(ubo.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(ubo.descriptor_count, 1);
        assert_eq!(ubo.stage_flags, vk::ShaderStageFlags::VERTEX);

        assert_eq!(sampler.binding, 1);
        assert_eq!(
            sampler.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(sampler.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_sizes_match_image_count() {
        for count in [2, 3, 4] {
            let sizes = pool_sizes(count);
            assert!(sizes.iter().all(|s| s.descriptor_count == count));
            assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
            assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        }
    }
}
