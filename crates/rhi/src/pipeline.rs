//! Pipeline layout and the mesh graphics pipeline.
//!
//! The pipeline draws an indexed triangle list of [`Vertex`] inside subpass 0
//! of a [`RenderPass`]. Viewport and scissor are baked in from the swapchain
//! extent, so the pipeline is rebuilt together with the swapchain.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use flightdeck_rhi::descriptor::DescriptorSetLayout;
//! use flightdeck_rhi::device::Device;
//! use flightdeck_rhi::pipeline::{MeshPipelineDesc, Pipeline, PipelineLayout};
//! use flightdeck_rhi::render_pass::RenderPass;
//! use flightdeck_rhi::shader::Shader;
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     set_layout: &DescriptorSetLayout,
//! #     vs: &Shader,
//! #     fs: &Shader,
//! #     render_pass: &RenderPass,
//! # ) -> Result<(), flightdeck_rhi::RhiError> {
//! let layout = PipelineLayout::new(device.clone(), set_layout)?;
//! let desc = MeshPipelineDesc::new(vs, fs, render_pass, vk::Extent2D { width: 800, height: 600 });
//! let pipeline = Pipeline::mesh(device, &layout, &desc)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::descriptor::DescriptorSetLayout;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::RenderPass;
use crate::shader::{Shader, ShaderStage};
use crate::vertex::Vertex;

/// Pipeline layout with the per-image descriptor set at set 0 and no push
/// constants.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    pub fn new(device: Arc<Device>, set_layout: &DescriptorSetLayout) -> RhiResult<Self> {
        let set_layouts = [set_layout.handle()];
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };
        debug!("Pipeline layout created");

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Rasterizer and depth state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterState {
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
}

impl Default for RasterState {
    /// Back-face culling of clockwise triangles, depth test and write with LESS.
    fn default() -> Self {
        Self {
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare: vk::CompareOp::LESS,
        }
    }
}

/// Everything the mesh pipeline is built from.
pub struct MeshPipelineDesc<'a> {
    pub vertex_shader: &'a Shader,
    pub fragment_shader: &'a Shader,
    pub render_pass: &'a RenderPass,
    pub extent: vk::Extent2D,
    pub raster: RasterState,
}

impl<'a> MeshPipelineDesc<'a> {
    /// Description with the default [`RasterState`].
    pub fn new(
        vertex_shader: &'a Shader,
        fragment_shader: &'a Shader,
        render_pass: &'a RenderPass,
        extent: vk::Extent2D,
    ) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            render_pass,
            extent,
            raster: RasterState::default(),
        }
    }

    fn check_stages(&self) -> RhiResult<()> {
        let stages = [
            (self.vertex_shader, ShaderStage::Vertex),
            (self.fragment_shader, ShaderStage::Fragment),
        ];
        for (shader, expected) in stages {
            if shader.stage() != expected {
                return Err(RhiError::PipelineError(format!(
                    "{} shader bound to the {} stage",
                    shader.stage(),
                    expected
                )));
            }
        }
        Ok(())
    }
}

/// Owned graphics `VkPipeline`.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Builds the opaque triangle-list pipeline for [`Vertex`] meshes.
    pub fn mesh(
        device: Arc<Device>,
        layout: &PipelineLayout,
        desc: &MeshPipelineDesc<'_>,
    ) -> RhiResult<Self> {
        desc.check_stages()?;

        let stages = [
            desc.vertex_shader.stage_create_info(),
            desc.fragment_shader.stage_create_info(),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        let viewports = [full_viewport(desc.extent)];
        let scissors = [full_scissor(desc.extent)];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(desc.raster.cull_mode)
            .front_face(desc.raster.front_face);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.raster.depth_test)
            .depth_write_enable(desc.raster.depth_write)
            .depth_compare_op(desc.raster.depth_compare);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .layout(layout.handle())
            .render_pass(desc.render_pass.handle())
            .subpass(0);

        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(
                    vk::PipelineCache::null(),
                    std::slice::from_ref(&create_info),
                    None,
                )
                .map_err(|(_, result)| result)?
        }
        .into_iter()
        .next()
        .ok_or_else(|| RhiError::PipelineError("driver returned no pipeline".to_string()))?;

        info!(
            "Mesh pipeline created for {}x{}",
            desc.extent.width, desc.extent.height
        );

        Ok(Self { device, pipeline })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}

/// Viewport covering `extent` with depth range 0..1.
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D::default(),
        extent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_raster_state() {
        let raster = RasterState::default();
        assert_eq!(raster.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(raster.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert!(raster.depth_test);
        assert!(raster.depth_write);
        assert_eq!(raster.depth_compare, vk::CompareOp::LESS);
    }

    #[test]
    fn test_viewport_and_scissor_cover_extent() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let vp = full_viewport(extent);
        assert_eq!((vp.x, vp.y), (0.0, 0.0));
        assert_eq!((vp.width, vp.height), (800.0, 600.0));
        assert_eq!((vp.min_depth, vp.max_depth), (0.0, 1.0));

        let scissor = full_scissor(extent);
        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 0));
        assert_eq!(scissor.extent, extent);
    }
}
