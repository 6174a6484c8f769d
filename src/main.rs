//! Camera passthrough viewer entry point.
//!
//! The winit event loop is the UI/control thread: it owns the window and
//! forwards surface lifecycle, keyboard and mouse input to the render
//! thread as messages. All rendering and camera work happens over there.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use camera_passthrough::{camera, CameraParameters, RenderHandle, RenderThread};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Camera Passthrough";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const PREVIEW_WIDTH: u32 = 1280;
const PREVIEW_HEIGHT: u32 = 720;
/// Keyboard step for the percent-valued sprite parameters.
const PERCENT_STEP: u32 = 5;

struct ViewerApp {
    handle: RenderHandle,
    window: Option<Arc<Window>>,
    zoom: u32,
    size: u32,
    rotate: u32,
    dragging: bool,
    cursor: (f32, f32),
}

impl ViewerApp {
    fn new(handle: RenderHandle) -> Self {
        Self {
            handle,
            window: None,
            zoom: camera_passthrough::geometry::DEFAULT_ZOOM_PERCENT,
            size: camera_passthrough::geometry::DEFAULT_SIZE_PERCENT,
            rotate: camera_passthrough::geometry::DEFAULT_ROTATE_PERCENT,
            dragging: false,
            cursor: (0.0, 0.0),
        }
    }

    fn on_key(&mut self, code: KeyCode, event_loop: &ActiveEventLoop) {
        match code {
            KeyCode::Escape => {
                log::info!("Escape pressed, exiting...");
                self.handle.send_shutdown();
                event_loop.exit();
            }
            // Arrows: up/down sprite size, left/right zoom.
            KeyCode::ArrowUp => {
                self.size = (self.size + PERCENT_STEP).min(100);
                self.handle.send_size(self.size);
            }
            KeyCode::ArrowDown => {
                self.size = self.size.saturating_sub(PERCENT_STEP);
                self.handle.send_size(self.size);
            }
            KeyCode::ArrowRight => {
                self.zoom = (self.zoom + PERCENT_STEP).min(100);
                self.handle.send_zoom(self.zoom);
            }
            KeyCode::ArrowLeft => {
                self.zoom = self.zoom.saturating_sub(PERCENT_STEP);
                self.handle.send_zoom(self.zoom);
            }
            // R/E rotate forward/back.
            KeyCode::KeyR => {
                self.rotate = (self.rotate + PERCENT_STEP).min(100);
                self.handle.send_rotate(self.rotate);
            }
            KeyCode::KeyE => {
                self.rotate = self.rotate.saturating_sub(PERCENT_STEP);
                self.handle.send_rotate(self.rotate);
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        match &self.window {
            None => {
                log::info!("Creating window...");
                let attributes = WindowAttributes::default()
                    .with_title(WINDOW_TITLE)
                    .with_inner_size(LogicalSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT));
                let window = Arc::new(
                    event_loop
                        .create_window(attributes)
                        .expect("Failed to create window"),
                );

                // Brand-new surface; a resize notification follows shortly.
                self.handle.send_surface_available(window.clone(), true);
                self.window = Some(window);
            }
            Some(window) => {
                // Resumed with the window of a previous run; no resize event
                // is coming, so the render thread finishes setup itself.
                self.handle.send_surface_available(window.clone(), false);
            }
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.handle.send_surface_destroyed();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                self.handle.send_shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                self.handle.send_surface_changed(size.width, size.height);
            }

            WindowEvent::RedrawRequested => {
                self.handle.send_redraw();
            }

            // Dragging with the left button moves the sprite.
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                if self.dragging {
                    self.handle.send_position(self.cursor.0, self.cursor.1);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = state == ElementState::Pressed;
                if self.dragging {
                    self.handle.send_position(self.cursor.0, self.cursor.1);
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.on_key(code, event_loop),

            _ => {}
        }
    }
}

/// Picks the supported preview size closest in area to the default.
fn pick_preview_size(sizes: &[(u32, u32)]) -> (u32, u32) {
    sizes
        .iter()
        .copied()
        .min_by_key(|(w, h)| (w * h).abs_diff(PREVIEW_WIDTH * PREVIEW_HEIGHT))
        .unwrap_or((PREVIEW_WIDTH, PREVIEW_HEIGHT))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cameras = camera::enumerate();
    if cameras.is_empty() {
        bail!("no cameras found");
    }
    for descriptor in &cameras {
        log::info!(
            "camera {}: {} ({} preview sizes)",
            descriptor.index,
            descriptor.name,
            descriptor.preview_sizes.len()
        );
    }

    let device_index: u32 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()
        .context("camera index must be a number")?
        .unwrap_or(0);
    let descriptor = cameras
        .iter()
        .find(|d| d.index == device_index)
        .with_context(|| format!("camera {device_index} not found"))?;
    let (preview_width, preview_height) = pick_preview_size(&descriptor.preview_sizes);
    log::info!(
        "using camera {} at {}x{}",
        device_index,
        preview_width,
        preview_height
    );

    let render_thread = RenderThread::spawn(CameraParameters {
        device_index,
        preview_width,
        preview_height,
    })?;
    let handle = match render_thread.wait_until_ready() {
        Some(handle) => handle,
        None => match render_thread.join() {
            Err(e) => return Err(e).context("render thread failed to start"),
            Ok(()) => bail!("render thread exited before becoming ready"),
        },
    };

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = ViewerApp::new(handle.clone());
    event_loop.run_app(&mut app).context("event loop error")?;

    // The shutdown message is fire-and-forget; join to observe the camera
    // and GPU teardown before the process exits.
    handle.send_shutdown();
    render_thread.join()?;
    Ok(())
}
