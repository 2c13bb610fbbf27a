//! flightdeck demo application.
//!
//! Opens a window and draws through the frame-pipelined renderer. The default
//! scene is a small red square at the origin; every 300 frames it is
//! regenerated green with a new side length and pushed through a same-size
//! update. A configured OBJ model (and texture) replaces the square.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use glam::Vec2;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use flightdeck_core::Config;
use flightdeck_platform::Window;
use flightdeck_renderer::{FrameOutcome, Renderer};
use flightdeck_resources::{MeshData, ResourceResult, TextureData};
use flightdeck_scene::shapes::{GREEN, RED};
use flightdeck_scene::{Geometry, default_quads};

/// Frames between square regenerations.
const REGENERATE_EVERY: u64 = 300;

/// Side lengths cycle through `step / LENGTH_STEPS` for step in 1..LENGTH_STEPS.
const LENGTH_STEPS: u32 = 10;

#[derive(Parser, Debug)]
#[command(name = "flightdeck", version, about = "Frame-pipelined Vulkan renderer demo")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Window width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// OBJ model to draw instead of the built-in geometry
    #[arg(long)]
    model: Option<PathBuf>,

    /// Texture bound to the model
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Built-in geometry used when no model is given
    #[arg(long, value_enum, default_value_t = Demo::Square)]
    demo: Demo,

    /// Disable the validation layers
    #[arg(long)]
    no_validation: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Demo {
    /// Animated square resized every few seconds
    Square,
    /// Two stacked quads
    Quads,
}

impl Args {
    /// Loads the config file (if any) and applies command-line overrides.
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        if self.model.is_some() {
            config.assets.model = self.model;
        }
        if self.texture.is_some() {
            config.assets.texture = self.texture;
        }
        if self.no_validation {
            config.vulkan.enable_validation = false;
        }

        config.validate()?;
        Ok(config)
    }
}

/// The growing/shrinking square.
struct SquareDemo {
    frame: u64,
    step: u32,
    geometry: Geometry,
}

impl SquareDemo {
    fn new() -> Self {
        let mut geometry = Geometry::new();
        geometry.add_square(Vec2::ZERO, side_length(1), RED);
        Self {
            frame: 1,
            step: 1,
            geometry,
        }
    }

    fn mesh(&self) -> MeshData {
        MeshData::new(self.geometry.vertices.clone(), self.geometry.indices.clone())
    }

    /// Advances one frame; returns the regenerated square on every
    /// [`REGENERATE_EVERY`]th frame.
    fn tick(&mut self) -> Option<&Geometry> {
        let regenerate = self.frame.is_multiple_of(REGENERATE_EVERY);
        self.frame += 1;
        if !regenerate {
            return None;
        }

        self.step = next_step(self.step);
        self.geometry.clear();
        self.geometry
            .add_square(Vec2::ZERO, side_length(self.step), GREEN);
        Some(&self.geometry)
    }
}

fn next_step(step: u32) -> u32 {
    let next = step + 1;
    if next >= LENGTH_STEPS { 1 } else { next }
}

fn side_length(step: u32) -> f32 {
    step as f32 / LENGTH_STEPS as f32
}

/// Geometry, texture and (for the square) the animation driving updates.
fn load_scene(config: &Config, demo: Demo) -> ResourceResult<(MeshData, TextureData, Option<SquareDemo>)> {
    let texture = match &config.assets.texture {
        Some(path) => TextureData::load(path)?,
        None => TextureData::white(),
    };

    if let Some(path) = &config.assets.model {
        return Ok((MeshData::load_obj(path)?, texture, None));
    }

    Ok(match demo {
        Demo::Square => {
            let square = SquareDemo::new();
            (square.mesh(), texture, Some(square))
        }
        Demo::Quads => {
            let (vertices, indices) = default_quads().into_parts();
            (MeshData::new(vertices, indices), texture, None)
        }
    })
}

struct App {
    config: Config,
    demo: Demo,
    // Dropped before the window it presents to
    renderer: Option<Renderer>,
    window: Option<Window>,
    square: Option<SquareDemo>,
}

impl App {
    fn new(config: Config, demo: Demo) -> Self {
        Self {
            config,
            demo,
            renderer: None,
            window: None,
            square: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(event_loop, &self.config.window)?;
        let (mesh, texture, square) = load_scene(&self.config, self.demo)?;
        let renderer = Renderer::new(&window, &self.config, &mesh, &texture)?;

        self.renderer = Some(renderer);
        self.window = Some(window);
        self.square = square;
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        if let Some((width, height)) = self.window.as_mut().and_then(Window::take_resize) {
            renderer.resize(width, height);
        }

        if let Some(geometry) = self.square.as_mut().and_then(SquareDemo::tick) {
            renderer.update(&geometry.vertices, &geometry.indices)?;
        }

        if renderer.draw_frame()? == FrameOutcome::Recreated {
            let extent = renderer.extent();
            info!("Swapchain recreated at {}x{}", extent.width, extent.height);
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(renderer) = self.renderer.take()
            && let Err(e) = renderer.shutdown()
        {
            warn!("Renderer shutdown failed: {e}");
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(()) => info!("Initialization complete, entering main loop"),
            Err(e) => {
                error!("Failed to initialize: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.record_resize(size.width, size.height);
                    if window.is_minimized() {
                        debug!("Window minimized, frames deferred until it is restored");
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    error!("Render error: {e:#}");
                    self.shutdown();
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let demo = args.demo;
    let config = args.into_config()?;

    flightdeck_core::init_logging_with(&config.log_filter);
    info!(
        "Starting flightdeck ({}x{}, validation {})",
        config.window.width,
        config.window.height,
        if config.vulkan.enable_validation { "on" } else { "off" }
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, demo);
    event_loop.run_app(&mut app)?;

    Ok(())
}
