//! Command pools, owned command buffer sets and a borrowed recorder.
//!
//! [`CommandPool::allocate`] returns a [`CommandBuffers`] set that frees its
//! handles when dropped. Individual buffers are recorded through the
//! short-lived [`CommandBuffer`] view:
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use flightdeck_rhi::command::CommandPool;
//! use flightdeck_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), flightdeck_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), device.graphics_family())?;
//! let buffers = pool.allocate(3)?;
//! for cmd in buffers.iter() {
//!     cmd.record(vk::CommandBufferUsageFlags::empty(), |_cmd| Ok(()))?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::RhiResult;
use crate::pipeline::full_scissor;

/// Owned `VkCommandPool` bound to one queue family.
///
/// Every pool is created with `RESET_COMMAND_BUFFER` so buffers can be
/// re-recorded one at a time.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
    queue_family_index: u32,
}

impl CommandPool {
    /// Pool for long-lived, re-recorded buffers.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
    }

    /// Pool for one-shot transfer buffers that are freed right after use.
    pub fn new_transient(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                | vk::CommandPoolCreateFlags::TRANSIENT,
        )
    }

    fn with_flags(
        device: Arc<Device>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(flags);

        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };
        debug!(
            "Command pool created (family {}, {:?})",
            queue_family_index, flags
        );

        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Allocates `count` primary command buffers.
    pub fn allocate(&self, count: u32) -> RhiResult<CommandBuffers> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let handles = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };

        Ok(CommandBuffers {
            device: self.device.clone(),
            pool: self.pool,
            handles,
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        info!(
            "Command pool destroyed for queue family {}",
            self.queue_family_index
        );
    }
}

/// Command buffers returned to their pool on drop.
///
/// The set must be dropped before the pool it came from.
pub struct CommandBuffers {
    device: Arc<Device>,
    pool: vk::CommandPool,
    handles: Vec<vk::CommandBuffer>,
}

impl CommandBuffers {
    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Recorder for buffer `index`.
    pub fn get(&self, index: usize) -> Option<CommandBuffer<'_>> {
        self.handles.get(index).map(|&buffer| CommandBuffer {
            device: &self.device,
            buffer,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = CommandBuffer<'_>> {
        self.handles.iter().map(|&buffer| CommandBuffer {
            device: &self.device,
            buffer,
        })
    }

    #[inline]
    pub fn handles(&self) -> &[vk::CommandBuffer] {
        &self.handles
    }
}

impl Drop for CommandBuffers {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.pool, &self.handles);
        }
    }
}

/// Borrowed view used to record one command buffer.
#[derive(Clone, Copy)]
pub struct CommandBuffer<'a> {
    device: &'a Device,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer<'_> {
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Resets the buffer, then runs `commands` between begin and end.
    ///
    /// The buffer must not be pending execution.
    pub fn record<F>(&self, usage: vk::CommandBufferUsageFlags, commands: F) -> RhiResult<()>
    where
        F: FnOnce(&Self) -> RhiResult<()>,
    {
        let device = self.device.handle();
        let begin_info = vk::CommandBufferBeginInfo::default().flags(usage);

        unsafe {
            device.reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(self.buffer, &begin_info)?;
        }
        commands(self)?;
        unsafe { device.end_command_buffer(self.buffer)? };
        Ok(())
    }

    /// Starts `render_pass` on `framebuffer`, covering the whole `extent`.
    pub fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(full_scissor(extent))
            .clear_values(clear_values);

        unsafe {
            self.device.handle().cmd_begin_render_pass(
                self.buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    pub fn end_render_pass(&self) {
        unsafe { self.device.handle().cmd_end_render_pass(self.buffer) };
    }

    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Binds `buffer` at vertex binding 0, offset 0.
    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(self.buffer, 0, &[buffer], &[0]);
        }
    }

    pub fn bind_index_buffer(&self, buffer: vk::Buffer, index_type: vk::IndexType) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_index_buffer(self.buffer, buffer, 0, index_type);
        }
    }

    /// Binds `set` as set 0 of a graphics pipeline `layout`.
    pub fn bind_descriptor_set(&self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    /// One instance of `index_count` indices from the start of the index buffer.
    pub fn draw_indexed(&self, index_count: u32) {
        unsafe {
            self.device
                .handle()
                .cmd_draw_indexed(self.buffer, index_count, 1, 0, 0, 0);
        }
    }

    pub fn image_barrier(
        &self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: vk::ImageMemoryBarrier<'_>,
    ) {
        unsafe {
            self.device.handle().cmd_pipeline_barrier(
                self.buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    pub fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, region: vk::BufferCopy) {
        unsafe {
            self.device
                .handle()
                .cmd_copy_buffer(self.buffer, src, dst, &[region]);
        }
    }

    /// Copies into `image`, which must be in `TRANSFER_DST_OPTIMAL`.
    pub fn copy_buffer_to_image(&self, src: vk::Buffer, image: vk::Image, region: vk::BufferImageCopy) {
        unsafe {
            self.device.handle().cmd_copy_buffer_to_image(
                self.buffer,
                src,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_types_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandPool>();
        assert_send::<CommandBuffers>();
    }
}
