//! Staged host-to-device transfers.
//!
//! Every operation here records into a one-shot command buffer from a
//! transient pool, submits it to the graphics queue and blocks until that
//! queue is idle. Staging buffers are therefore safe to drop as soon as the
//! call returns.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, trace};

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc, has_stencil_component};

/// Access masks, pipeline stages and aspect for one layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub aspect: vk::ImageAspectFlags,
}

/// Looks up the barrier parameters for moving an image of `format` from
/// `old` to `new`.
///
/// # Errors
///
/// [`RhiError::UnsupportedTransition`] for any pair outside the table.
pub fn transition_barrier(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    format: vk::Format,
) -> RhiResult<TransitionMasks> {
    use vk::ImageLayout as L;

    let masks = match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
            aspect: vk::ImageAspectFlags::COLOR,
        },
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            aspect: vk::ImageAspectFlags::COLOR,
        },
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => {
            let mut aspect = vk::ImageAspectFlags::DEPTH;
            if has_stencil_component(format) {
                aspect |= vk::ImageAspectFlags::STENCIL;
            }
            TransitionMasks {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                aspect,
            }
        }
        _ => return Err(RhiError::UnsupportedTransition { old, new }),
    };

    Ok(masks)
}

/// Owns the transient command pool used for blocking uploads.
pub struct TransferContext {
    device: Arc<Device>,
    pool: CommandPool,
}

impl TransferContext {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let pool = CommandPool::new_transient(device.clone(), device.graphics_family())?;
        Ok(Self { device, pool })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Records `record` into a fresh command buffer, submits it and waits for
    /// the graphics queue to drain.
    ///
    /// The command buffer is freed on every path.
    pub fn one_shot<F>(&self, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer<'_>) -> RhiResult<()>,
    {
        let buffers = self.pool.allocate(1)?;
        let cmd = buffers
            .get(0)
            .ok_or_else(|| RhiError::InvalidHandle("empty one-shot allocation".to_string()))?;
        cmd.record(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, record)?;

        let submit_info = vk::SubmitInfo::default().command_buffers(buffers.handles());
        unsafe {
            self.device
                .submit_graphics(std::slice::from_ref(&submit_info), vk::Fence::null())?;
        }
        self.device.graphics_queue_wait_idle()?;
        trace!("One-shot submission complete");
        Ok(())
    }

    /// Creates a device-local buffer for `usage` holding `data`.
    ///
    /// The bytes travel through a host-visible staging buffer that is
    /// released before this returns.
    pub fn upload_buffer(&self, usage: BufferUsage, data: &[u8]) -> RhiResult<Buffer> {
        let dst = Buffer::new(self.device.clone(), usage, data.len() as vk::DeviceSize)?;
        self.write_buffer(&dst, 0, data)?;
        debug!("Uploaded {} bytes into {} buffer", data.len(), usage.name());
        Ok(dst)
    }

    /// Overwrites `data.len()` bytes of `dst` at `offset` through staging.
    ///
    /// The caller guarantees the GPU is not reading `dst` concurrently.
    pub fn write_buffer(&self, dst: &Buffer, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        let end = offset.saturating_add(data.len() as vk::DeviceSize);
        if end > dst.size() {
            return Err(RhiError::TransferOutOfBounds {
                requested: end,
                capacity: dst.size(),
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        let staging = Buffer::new_with_data(self.device.clone(), BufferUsage::Staging, data)?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: offset,
            size: data.len() as vk::DeviceSize,
        };
        self.one_shot(|cmd| {
            cmd.copy_buffer(staging.handle(), dst.handle(), region);
            Ok(())
        })
    }

    /// Copies the first `len` bytes of `src` into a host-visible mirror and
    /// returns them.
    pub fn read_back(&self, src: &Buffer, len: usize) -> RhiResult<Vec<u8>> {
        if len as vk::DeviceSize > src.size() {
            return Err(RhiError::TransferOutOfBounds {
                requested: len as vk::DeviceSize,
                capacity: src.size(),
            });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mirror = Buffer::new(
            self.device.clone(),
            BufferUsage::Readback,
            len as vk::DeviceSize,
        )?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: len as vk::DeviceSize,
        };
        self.one_shot(|cmd| {
            cmd.copy_buffer(src.handle(), mirror.handle(), region);
            Ok(())
        })?;
        mirror.read_data(0, len)
    }

    /// Moves `image` between layouts with a single barrier.
    pub fn transition_image_layout(
        &self,
        image: vk::Image,
        format: vk::Format,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> RhiResult<()> {
        let masks = transition_barrier(old, new, format)?;
        let barrier = image_barrier(image, old, new, &masks);
        self.one_shot(|cmd| {
            cmd.image_barrier(masks.src_stage, masks.dst_stage, barrier);
            Ok(())
        })
    }

    /// Copies tightly packed pixels from `buffer` into mip 0 of `image`,
    /// which must be in `TRANSFER_DST_OPTIMAL`.
    pub fn copy_buffer_to_image(
        &self,
        buffer: &Buffer,
        image: vk::Image,
        extent: vk::Extent2D,
    ) -> RhiResult<()> {
        let region = buffer_image_copy(extent);
        self.one_shot(|cmd| {
            cmd.copy_buffer_to_image(buffer.handle(), image, region);
            Ok(())
        })
    }

    /// Uploads RGBA8 pixels into a sampled image left in
    /// `SHADER_READ_ONLY_OPTIMAL`.
    pub fn upload_texture(
        &self,
        extent: vk::Extent2D,
        format: vk::Format,
        pixels: &[u8],
    ) -> RhiResult<Image> {
        let expected = extent.width as u64 * extent.height as u64 * 4;
        if pixels.len() as u64 != expected {
            return Err(RhiError::TransferOutOfBounds {
                requested: pixels.len() as u64,
                capacity: expected,
            });
        }

        let staging = Buffer::new_with_data(self.device.clone(), BufferUsage::Staging, pixels)?;
        let image = Image::new(self.device.clone(), &ImageDesc::texture(extent, format))?;

        self.transition_image_layout(
            image.handle(),
            format,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        self.copy_buffer_to_image(&staging, image.handle(), extent)?;
        self.transition_image_layout(
            image.handle(),
            format,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        debug!("Uploaded {}x{} texture", extent.width, extent.height);
        Ok(image)
    }
}

fn image_barrier(
    image: vk::Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    masks: &TransitionMasks,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(masks.aspect)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        )
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access)
}

fn buffer_image_copy(extent: vk::Extent2D) -> vk::BufferImageCopy {
    vk::BufferImageCopy::default()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .mip_level(0)
                .base_array_layer(0)
                .layer_count(1),
        )
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
}
