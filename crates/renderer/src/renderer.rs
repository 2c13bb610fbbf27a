//! Main renderer orchestration.
//!
//! This module provides the main [`Renderer`] struct that owns every Vulkan
//! object and drives the per-frame acquire, record, submit, present cycle.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use flightdeck_core::{Config, FrameClock};
use flightdeck_platform::{Surface, Window};
use flightdeck_resources::{MeshData, TextureData};
use flightdeck_rhi::command::CommandPool;
use flightdeck_rhi::descriptor::DescriptorSetLayout;
use flightdeck_rhi::device::Device;
use flightdeck_rhi::image::Image;
use flightdeck_rhi::instance::Instance;
use flightdeck_rhi::physical_device::{SurfaceRef, select_physical_device};
use flightdeck_rhi::sampler::Sampler;
use flightdeck_rhi::shader::{Shader, ShaderStage};
use flightdeck_rhi::transfer::TransferContext;
use flightdeck_rhi::RhiError;
use flightdeck_rhi::vertex::{Index, Vertex};

use crate::error::{RendererError, RendererResult};
use crate::mesh::MeshBuffers;
use crate::scheduler::{FrameBackend, FrameLoop, FrameOutcome, FrameScheduler};
use crate::targets::{SwapchainTargets, TargetInputs};
use crate::ubo::UniformBufferObject;

/// Format textures are uploaded in.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Owns all GPU state and renders the mesh every frame.
///
/// # Resource Destruction Order
///
/// Fields are declared in destruction order. After waiting for the device to
/// go idle, dropping releases:
/// 1. Swapchain-dependent targets
/// 2. Sampler, texture and descriptor set layout
/// 3. Vertex and index buffers
/// 4. Frame slots (semaphores and fences)
/// 5. Command pools and shader modules
/// 6. Device
/// 7. Surface
/// 8. Debug messenger and instance
pub struct Renderer {
    targets: Option<SwapchainTargets>,
    sampler: Sampler,
    texture: Image,
    descriptor_set_layout: DescriptorSetLayout,
    mesh: MeshBuffers,
    scheduler: FrameScheduler,
    command_pool: CommandPool,
    transfer: TransferContext,
    vertex_shader: Shader,
    fragment_shader: Shader,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,

    frames: FrameLoop,
    clock: FrameClock,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Initializes Vulkan for `window` and uploads `mesh` and `texture`.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan resource creation fails, no suitable
    /// GPU exists, a shader file cannot be read, or `mesh` is empty.
    pub fn new(
        window: &Window,
        config: &Config,
        mesh: &MeshData,
        texture: &TextureData,
    ) -> RendererResult<Self> {
        let (width, height) = window.framebuffer_size();
        info!("Initializing Vulkan renderer ({}x{})", width, height);

        let extensions = window.required_extensions()?;
        let instance = Instance::new(
            config.vulkan.enable_validation,
            &config.vulkan.validation_layers,
            &extensions,
        )?;

        let surface = window.create_surface(instance.entry(), instance.handle())?;
        let physical_device_info =
            select_physical_device(instance.handle(), Some(surface_ref(&surface)))?;
        let device = Device::new(&instance, &physical_device_info)?;

        let transfer = TransferContext::new(device.clone())?;
        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &config.assets.vertex_shader,
            ShaderStage::Vertex,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &config.assets.fragment_shader,
            ShaderStage::Fragment,
        )?;

        let descriptor_set_layout = DescriptorSetLayout::uniform_and_sampler(device.clone())?;
        let texture = transfer.upload_texture(texture.extent(), TEXTURE_FORMAT, &texture.pixels)?;
        let sampler = Sampler::new(device.clone())?;
        let mesh = MeshBuffers::upload(&transfer, mesh)?;
        let scheduler = FrameScheduler::new(device.clone())?;

        let targets = SwapchainTargets::new(
            device.clone(),
            &TargetInputs {
                surface: surface_ref(&surface),
                transfer: &transfer,
                command_pool: &command_pool,
                descriptor_set_layout: &descriptor_set_layout,
                vertex_shader: &vertex_shader,
                fragment_shader: &fragment_shader,
                texture_view: texture.view(),
                sampler: sampler.handle(),
            },
            width,
            height,
        )?;
        let frames = FrameLoop::new(targets.image_count());

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight",
            targets.image_count(),
            crate::MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            targets: Some(targets),
            sampler,
            texture,
            descriptor_set_layout,
            mesh,
            scheduler,
            command_pool,
            transfer,
            vertex_shader,
            fragment_shader,
            device,
            surface,
            instance,
            frames,
            clock: FrameClock::new(),
            width,
            height,
        })
    }

    /// Records the latest framebuffer size reported by the window.
    ///
    /// The swapchain is rebuilt after the next present, or on the next frame
    /// once the size is non-zero again.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width != self.width || height != self.height {
            debug!(
                "Resize requested: {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            self.width = width;
            self.height = height;
            self.frames.request_rebuild();
        }
    }

    /// Renders and presents one frame.
    ///
    /// # Errors
    ///
    /// Returns an error for any Vulkan failure other than an out-of-date or
    /// suboptimal swapchain, which are handled by rebuilding.
    pub fn draw_frame(&mut self) -> RendererResult<FrameOutcome> {
        // The loop drives `self` as its backend.
        let mut frames = std::mem::replace(&mut self.frames, FrameLoop::new(0));
        let outcome = frames.draw(self);
        self.frames = frames;
        outcome
    }

    /// Replaces the vertex contents with `vertices`.
    ///
    /// Both counts must equal those the renderer was created with; otherwise
    /// nothing is touched. Index contents are kept as uploaded.
    pub fn update(&mut self, vertices: &[Vertex], indices: &[Index]) -> RendererResult<()> {
        crate::mesh::validate_update(
            self.mesh.vertex_count(),
            self.mesh.index_count(),
            vertices.len(),
            indices.len(),
        )?;

        // No in-flight frame may read the old contents during the copy.
        self.device.wait_idle()?;
        self.mesh.write_vertices(&self.transfer, vertices)?;
        Ok(())
    }

    /// Waits for outstanding GPU work and releases everything.
    pub fn shutdown(self) -> RendererResult<()> {
        self.device.wait_idle()?;
        info!("Renderer shutting down");
        Ok(())
    }

    /// Current swapchain extent, or zero if the last rebuild failed.
    pub fn extent(&self) -> vk::Extent2D {
        self.targets
            .as_ref()
            .map(SwapchainTargets::extent)
            .unwrap_or_default()
    }
}

impl FrameBackend for Renderer {
    type Error = RendererError;

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Tears down and rebuilds the swapchain-dependent set.
    fn rebuild(&mut self) -> RendererResult<usize> {
        self.device.wait_idle()?;

        // The old swapchain must be gone before a new one targets the surface.
        self.targets = None;

        let targets = SwapchainTargets::new(
            self.device.clone(),
            &TargetInputs {
                surface: surface_ref(&self.surface),
                transfer: &self.transfer,
                command_pool: &self.command_pool,
                descriptor_set_layout: &self.descriptor_set_layout,
                vertex_shader: &self.vertex_shader,
                fragment_shader: &self.fragment_shader,
                texture_view: self.texture.view(),
                sampler: self.sampler.handle(),
            },
            self.width,
            self.height,
        )?;

        let image_count = targets.image_count();
        let extent = targets.extent();
        self.targets = Some(targets);

        info!("Swapchain rebuilt: {}x{}", extent.width, extent.height);
        Ok(image_count)
    }

    fn wait_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.scheduler.slot(slot).in_flight().wait()?;
        Ok(())
    }

    fn acquire(&mut self, slot: usize) -> Result<(u32, bool), vk::Result> {
        // Missing targets mean an earlier rebuild failed; ask for another.
        let Some(targets) = self.targets.as_ref() else {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        };
        targets
            .swapchain()
            .acquire_next_image(self.scheduler.slot(slot).image_available().handle())
    }

    /// Updates the image's uniforms, re-records and submits its command buffer.
    fn submit(&mut self, slot: usize, image: usize) -> RendererResult<()> {
        let targets = self
            .targets
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("swapchain targets missing".to_string()))?;
        let frame_slot = self.scheduler.slot(slot);

        let ubo = UniformBufferObject::at(self.clock.elapsed_secs(), targets.aspect_ratio());
        targets.write_uniforms(image, &ubo)?;
        targets.record(image, &self.mesh)?;

        frame_slot.in_flight().reset()?;

        let wait_semaphores = [frame_slot.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [targets.command_buffer(image)?.handle()];
        let signal_semaphores = [frame_slot.render_finished().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer was just recorded and the slot fence was
        // reset above after its previous submission completed.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame_slot.in_flight().handle())?;
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image: u32) -> Result<bool, vk::Result> {
        let Some(targets) = self.targets.as_ref() else {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        };
        targets.swapchain().present(
            self.device.present_queue(),
            image,
            self.scheduler.slot(slot).render_finished().handle(),
        )
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Wait for all GPU work to complete before destroying resources
        if let Err(e) = self.device.wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }
        info!(
            "Renderer destroyed (validation {})",
            if self.instance.has_validation() { "on" } else { "off" }
        );
    }
}

fn surface_ref(surface: &Surface) -> SurfaceRef<'_> {
    SurfaceRef {
        handle: surface.handle(),
        loader: surface.loader(),
    }
}
