//! Render-thread state: GPU context, window surface and sprite composition.
//!
//! [`RenderSession`] is owned exclusively by the render thread. Every method
//! here runs as the handler of exactly one control message, so no locking is
//! involved anywhere in this module.

use std::sync::Arc;

use glam::Mat4;
use winit::window::Window;

use super::channel::RenderCommand;
use super::sprite::SpriteRenderer;
use super::RenderError;
use crate::camera::CameraCapture;
use crate::geometry::{self, GeometryParameters};

/// Lifecycle of the window-target surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    Uninitialized,
    /// The surface handle exists and GPU resources are allocated.
    Available,
    /// Window dimensions are known and the camera preview is running.
    Configured,
    /// The surface was torn down; the GPU context itself is still alive.
    Destroyed,
}

/// Device-level GPU state, independent of any window.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Creates the instance, adapter and device. No surface is involved yet;
    /// the window arrives later as a control message.
    pub fn new() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::NoAdapter)?;

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Passthrough Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// Everything attached to one window surface. Dropped wholesale on
/// surface-destroyed, which releases the swapchain, pipeline and camera
/// texture while the device lives on.
struct SurfaceTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    sprite: SpriteRenderer,
}

pub struct RenderSession {
    // Field order doubles as drop order: the camera and the per-surface
    // resources go away before the GPU context they depend on.
    camera: CameraCapture,
    target: Option<SurfaceTarget>,
    state: SurfaceState,
    window_width: u32,
    window_height: u32,
    projection: Mat4,
    params: GeometryParameters,
    gpu: GpuContext,
}

impl RenderSession {
    pub fn new(gpu: GpuContext, camera: CameraCapture) -> Self {
        Self {
            camera,
            target: None,
            state: SurfaceState::Uninitialized,
            window_width: 0,
            window_height: 0,
            projection: Mat4::IDENTITY,
            params: GeometryParameters::default(),
            gpu,
        }
    }

    /// Handles one control message. Returns false when the dispatch loop
    /// should exit.
    pub fn dispatch(&mut self, command: RenderCommand) -> Result<bool, RenderError> {
        match command {
            RenderCommand::SurfaceAvailable {
                window,
                new_surface,
            } => self.on_surface_available(window, new_surface)?,
            RenderCommand::SurfaceChanged { width, height } => {
                self.on_surface_changed(width, height)?
            }
            RenderCommand::SurfaceDestroyed => self.on_surface_destroyed(),
            RenderCommand::Shutdown => return Ok(false),
            RenderCommand::FrameAvailable => self.on_frame_available()?,
            RenderCommand::SetZoom { percent } => self.set_zoom(percent),
            RenderCommand::SetSize { percent } => self.set_size(percent),
            RenderCommand::SetRotate { percent } => self.set_rotate(percent),
            RenderCommand::SetPosition { x, y } => self.set_position(x, y),
            RenderCommand::Redraw => self.draw()?,
        }
        Ok(true)
    }

    /// Prepares the surface and the sprite resources for a window.
    ///
    /// When `new_surface` is false the surface predates this run and no
    /// resize notification will follow, so the dimension-dependent setup
    /// runs immediately with the window's current size.
    fn on_surface_available(
        &mut self,
        window: Arc<Window>,
        new_surface: bool,
    ) -> Result<(), RenderError> {
        log::debug!("surface available (new={new_surface})");
        let size = window.inner_size();
        let surface = self.gpu.instance.create_surface(window)?;

        let caps = surface.get_capabilities(&self.gpu.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(caps.formats[0]);

        let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Mailbox) {
            wgpu::PresentMode::Mailbox
        } else {
            wgpu::PresentMode::Fifo
        };
        log::info!("Surface format: {:?}, present mode: {:?}", format, present_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };

        let sprite = SpriteRenderer::new(&self.gpu.device, format, self.camera.resolution());
        self.target = Some(SurfaceTarget {
            surface,
            config,
            sprite,
        });
        self.state = SurfaceState::Available;

        if !new_surface {
            self.on_surface_changed(size.width, size.height)?;
        }
        Ok(())
    }

    /// Records the window dimensions and finishes the dimension-dependent
    /// setup. The camera preview starts here, on the first configuration of
    /// a surface; later resizes only reconfigure.
    fn on_surface_changed(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        log::debug!("surface changed {width}x{height}");
        let Some(target) = &mut self.target else {
            log::warn!("surface changed but no surface is allocated");
            return Ok(());
        };

        self.window_width = width;
        self.window_height = height;
        target.config.width = width.max(1);
        target.config.height = height.max(1);
        target.surface.configure(&self.gpu.device, &target.config);

        // Orthographic projection with the origin in the lower-left corner.
        self.projection =
            Mat4::orthographic_rh(0.0, width as f32, 0.0, height as f32, -1.0, 1.0);

        // Default position is the center of the window.
        self.params.pos_x = width as f32 / 2.0;
        self.params.pos_y = height as f32 / 2.0;

        self.update_geometry();

        if self.state != SurfaceState::Configured {
            log::info!("starting camera preview");
            self.camera.start()?;
            self.state = SurfaceState::Configured;
        }
        Ok(())
    }

    /// Releases the per-surface GPU resources. The device and queue stay
    /// alive for a future surface.
    fn on_surface_destroyed(&mut self) {
        log::debug!("surface destroyed");
        self.target = None;
        self.state = SurfaceState::Destroyed;
    }

    /// Imports the newest camera buffer into the texture and redraws.
    fn on_frame_available(&mut self) -> Result<(), RenderError> {
        let Some(frame) = self.camera.latest_frame() else {
            return Ok(());
        };
        if let Some(target) = &mut self.target {
            target
                .sprite
                .import_frame(&self.gpu.device, &self.gpu.queue, &frame);
        }
        self.draw()
    }

    fn set_zoom(&mut self, percent: u32) {
        self.params.zoom_percent = percent.min(100);
        self.update_geometry();
    }

    fn set_size(&mut self, percent: u32) {
        self.params.size_percent = percent.min(100);
        self.update_geometry();
    }

    fn set_rotate(&mut self, percent: u32) {
        self.params.rotate_percent = percent.min(100);
        self.update_geometry();
    }

    fn set_position(&mut self, x: f32, y: f32) {
        self.params.pos_x = x;
        self.params.pos_y = geometry::flip_screen_y(y, self.window_height);
        self.update_geometry();
    }

    /// Recomputes the sprite transform from the current parameters and
    /// pushes it to the GPU. Does not force a redraw.
    fn update_geometry(&mut self) {
        let Some(target) = &mut self.target else {
            return;
        };
        let transform = geometry::compute_transform(
            &self.params,
            self.window_width,
            self.window_height,
            self.camera.aspect_ratio(),
        );
        target
            .sprite
            .set_transform(&self.gpu.queue, &self.projection, &transform);
    }

    /// Draws the sprite over a cleared frame and presents it.
    fn draw(&mut self) -> Result<(), RenderError> {
        if self.state != SurfaceState::Configured {
            return Ok(());
        }
        let Some(target) = &mut self.target else {
            return Ok(());
        };

        let output = match target.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost, reconfiguring");
                target.surface.configure(&self.gpu.device, &target.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(e) => {
                log::warn!("surface error: {e:?}");
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Sprite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            target.sprite.draw(&mut render_pass);
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Tears the session down in dependency order: camera first, then the
    /// per-surface GPU resources, then the GPU context when `self` drops.
    pub fn teardown(mut self) {
        self.camera.release();
        self.target = None;
    }
}
