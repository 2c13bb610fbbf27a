//! Swapchain-dependent resources.
//!
//! [`SwapchainTargets`] bundles everything that has to be rebuilt when the
//! surface changes: the swapchain and its views, the depth attachment, the
//! render pass, pipeline, framebuffers, per-image uniform buffers, the
//! descriptor pool and sets, and per-image command buffers.
//!
//! Rebuilding is drop + construct. Fields are declared in teardown order,
//! so dropping the struct releases:
//!
//! 1. Depth image, view and memory
//! 2. Framebuffers
//! 3. Command buffers
//! 4. Pipeline
//! 5. Pipeline layout
//! 6. Render pass
//! 7. Swapchain image views and swapchain
//! 8. Uniform buffers
//! 9. Descriptor pool (and with it every descriptor set)

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use flightdeck_rhi::buffer::{Buffer, BufferUsage};
use flightdeck_rhi::command::{CommandBuffer, CommandBuffers, CommandPool};
use flightdeck_rhi::descriptor::{DescriptorSetLayout, FrameDescriptors};
use flightdeck_rhi::device::Device;
use flightdeck_rhi::image::{Image, ImageDesc, find_depth_format};
use flightdeck_rhi::physical_device::SurfaceRef;
use flightdeck_rhi::pipeline::{MeshPipelineDesc, Pipeline, PipelineLayout};
use flightdeck_rhi::render_pass::{Framebuffer, RenderPass};
use flightdeck_rhi::shader::Shader;
use flightdeck_rhi::swapchain::Swapchain;
use flightdeck_rhi::transfer::TransferContext;
use flightdeck_rhi::{RhiError, RhiResult};

use crate::mesh::MeshBuffers;
use crate::ubo::UniformBufferObject;

/// Background color of every frame.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Depth value the attachment is cleared to (the far plane).
pub const CLEAR_DEPTH: f32 = 1.0;

/// Long-lived objects the swapchain-dependent set is built from.
pub struct TargetInputs<'a> {
    pub surface: SurfaceRef<'a>,
    pub transfer: &'a TransferContext,
    pub command_pool: &'a CommandPool,
    pub descriptor_set_layout: &'a DescriptorSetLayout,
    pub vertex_shader: &'a Shader,
    pub fragment_shader: &'a Shader,
    pub texture_view: vk::ImageView,
    pub sampler: vk::Sampler,
}

/// Swapchain and everything sized or counted by it.
pub struct SwapchainTargets {
    depth: Image,
    framebuffers: Vec<Framebuffer>,
    command_buffers: CommandBuffers,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    render_pass: RenderPass,
    swapchain: Swapchain,
    uniform_buffers: Vec<Buffer>,
    descriptors: FrameDescriptors,
}

impl SwapchainTargets {
    /// Builds the full set for a framebuffer of `width` x `height`.
    ///
    /// The size only matters when the surface leaves the extent to the
    /// application; otherwise the surface's current extent wins.
    pub fn new(
        device: Arc<Device>,
        inputs: &TargetInputs<'_>,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let swapchain = Swapchain::new(device.clone(), inputs.surface, width, height)?;
        let extent = swapchain.extent();
        let image_count = swapchain.image_count();

        let depth_format = find_depth_format(&device)?;
        let depth = Image::new(device.clone(), &ImageDesc::depth(extent, depth_format))?;
        inputs.transfer.transition_image_layout(
            depth.handle(),
            depth_format,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )?;

        let render_pass = RenderPass::new(device.clone(), swapchain.format(), depth_format)?;

        let pipeline_layout = PipelineLayout::new(device.clone(), inputs.descriptor_set_layout)?;
        let pipeline = Pipeline::mesh(
            device.clone(),
            &pipeline_layout,
            &MeshPipelineDesc::new(
                inputs.vertex_shader,
                inputs.fragment_shader,
                &render_pass,
                extent,
            ),
        )?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                Framebuffer::new(device.clone(), &render_pass, view, depth.view(), extent)
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let uniform_buffers = (0..image_count)
            .map(|_| {
                Buffer::new(
                    device.clone(),
                    BufferUsage::Uniform,
                    UniformBufferObject::SIZE as vk::DeviceSize,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let uniform_infos: Vec<_> = uniform_buffers
            .iter()
            .map(|uniform| {
                vk::DescriptorBufferInfo::default()
                    .buffer(uniform.handle())
                    .range(uniform.size())
            })
            .collect();
        let texture_info = vk::DescriptorImageInfo::default()
            .sampler(inputs.sampler)
            .image_view(inputs.texture_view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let descriptors = FrameDescriptors::new(
            device.clone(),
            inputs.descriptor_set_layout,
            &uniform_infos,
            texture_info,
        )?;

        let command_buffers = inputs.command_pool.allocate(image_count)?;

        info!(
            "Swapchain targets built: {}x{}, {} images",
            extent.width, extent.height, image_count
        );

        Ok(Self {
            depth,
            framebuffers,
            command_buffers,
            pipeline,
            pipeline_layout,
            render_pass,
            swapchain,
            uniform_buffers,
            descriptors,
        })
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count() as usize
    }

    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.aspect_ratio()
    }

    /// Command buffer recorded for swapchain image `image`.
    pub fn command_buffer(&self, image: usize) -> RhiResult<CommandBuffer<'_>> {
        self.command_buffers
            .get(image)
            .ok_or_else(|| out_of_range(image))
    }

    /// Writes the uniform block read by frames targeting `image`.
    pub fn write_uniforms(&self, image: usize, ubo: &UniformBufferObject) -> RhiResult<()> {
        self.uniform_buffers
            .get(image)
            .ok_or_else(|| out_of_range(image))?
            .write_data(0, bytemuck::bytes_of(ubo))
    }

    /// Re-records the draw of `mesh` into `image`'s command buffer.
    pub fn record(&self, image: usize, mesh: &MeshBuffers) -> RhiResult<()> {
        let cmd = self.command_buffer(image)?;
        let framebuffer = self.framebuffers.get(image).ok_or_else(|| out_of_range(image))?;
        let descriptor_set = self
            .descriptors
            .set(image)
            .ok_or_else(|| out_of_range(image))?;

        let extent = self.extent();

        cmd.record(vk::CommandBufferUsageFlags::empty(), |cmd| {
            cmd.begin_render_pass(
                self.render_pass.handle(),
                framebuffer.handle(),
                extent,
                &clear_values(),
            );
            cmd.bind_graphics_pipeline(self.pipeline.handle());
            cmd.bind_vertex_buffer(mesh.vertex_buffer().handle());
            cmd.bind_index_buffer(mesh.index_buffer().handle(), vk::IndexType::UINT32);
            cmd.bind_descriptor_set(self.pipeline_layout.handle(), descriptor_set);
            cmd.draw_indexed(mesh.index_count() as u32);
            cmd.end_render_pass();
            Ok(())
        })
    }
}

impl Drop for SwapchainTargets {
    fn drop(&mut self) {
        debug!(
            "Releasing swapchain targets ({} images)",
            self.framebuffers.len()
        );
    }
}

/// Clear values in attachment order (color, depth).
pub fn clear_values() -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: CLEAR_DEPTH,
                stencil: 0,
            },
        },
    ]
}

fn out_of_range(image: usize) -> RhiError {
    RhiError::InvalidHandle(format!("swapchain image {image} out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightdeck_rhi::render_pass::{COLOR_ATTACHMENT_INDEX, DEPTH_ATTACHMENT_INDEX};

    #[test]
    fn test_clear_values_match_attachment_order() {
        let values = clear_values();
        let color = unsafe { values[COLOR_ATTACHMENT_INDEX as usize].color.float32 };
        let depth = unsafe { values[DEPTH_ATTACHMENT_INDEX as usize].depth_stencil };
        assert_eq!(color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(depth.depth, 1.0);
        assert_eq!(depth.stencil, 0);
    }
}
