//! Camera capture via nokhwa.
//!
//! The device is opened on the render thread so acquisition failures surface
//! there; frames are then grabbed on a dedicated capture thread. The capture
//! thread never touches GPU state: it stores the decoded frame in a shared
//! slot and enqueues a frame-available message for the render thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, ControlValueSetter, FrameFormat, KnownCameraControl,
    RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use parking_lot::Mutex;
use thiserror::Error;

use crate::render::RenderHandle;

const REQUESTED_FPS: u32 = 30;

/// Errors raised while acquiring or starting the camera. All of these are
/// fatal to the render thread.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open camera {index}: {source}")]
    Open {
        index: u32,
        source: nokhwa::NokhwaError,
    },
    #[error("failed to start preview stream: {0}")]
    Stream(nokhwa::NokhwaError),
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Camera selection made before the render thread starts. Immutable for the
/// session's lifetime.
#[derive(Clone, Copy, Debug)]
pub struct CameraParameters {
    pub device_index: u32,
    pub preview_width: u32,
    pub preview_height: u32,
}

/// A decoded RGBA camera frame.
#[derive(Clone)]
pub struct CameraFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
}

/// An enumerated capture device and the preview sizes it reports.
#[derive(Clone, Debug)]
pub struct CameraDescriptor {
    pub index: u32,
    pub name: String,
    pub preview_sizes: Vec<(u32, u32)>,
}

/// Lists capture devices along with their supported preview sizes.
///
/// Devices whose formats cannot be queried are omitted from the result
/// rather than reported as an error.
pub fn enumerate() -> Vec<CameraDescriptor> {
    let devices = match nokhwa::query(ApiBackend::Auto) {
        Ok(devices) => devices,
        Err(e) => {
            log::warn!("failed to enumerate cameras: {e}");
            return Vec::new();
        }
    };

    let mut descriptors = Vec::new();
    for (idx, info) in devices.iter().enumerate() {
        let index = idx as u32;
        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::None);
        let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
            Ok(camera) => camera,
            Err(e) => {
                log::debug!("skipping camera {index}: {e}");
                continue;
            }
        };
        let mut sizes: Vec<(u32, u32)> = match camera.compatible_camera_formats() {
            Ok(formats) => formats
                .iter()
                .map(|f| (f.resolution().width(), f.resolution().height()))
                .collect(),
            Err(e) => {
                log::debug!("skipping camera {index}: {e}");
                continue;
            }
        };
        sizes.sort_unstable();
        sizes.dedup();

        descriptors.push(CameraDescriptor {
            index,
            name: info.human_name().to_string(),
            preview_sizes: sizes,
        });
    }
    descriptors
}

/// The render thread's camera handle.
///
/// Owns the device from `open` until `release`; between `start` and
/// `release` the device itself lives on the capture thread.
pub struct CameraCapture {
    camera: Option<Camera>,
    handle: RenderHandle,
    latest: Arc<Mutex<Option<CameraFrame>>>,
    running: Arc<AtomicBool>,
    frame_count: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Opens the device, requesting the configured preview resolution and
    /// continuous autofocus. The stream is not started yet; see [`start`].
    ///
    /// [`start`]: CameraCapture::start
    pub fn open(params: &CameraParameters, handle: RenderHandle) -> Result<Self, CaptureError> {
        let format = CameraFormat::new(
            Resolution::new(params.preview_width, params.preview_height),
            FrameFormat::MJPEG,
            REQUESTED_FPS,
        );
        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(format));
        let mut camera = Camera::new(CameraIndex::Index(params.device_index), requested).map_err(
            |source| CaptureError::Open {
                index: params.device_index,
                source,
            },
        )?;

        // Continuous autofocus where the backend supports it.
        if let Err(e) =
            camera.set_camera_control(KnownCameraControl::Focus, ControlValueSetter::Boolean(true))
        {
            log::debug!("continuous focus unavailable: {e}");
        }

        let resolution = camera.resolution();
        log::info!(
            "camera opened: {} ({}x{})",
            camera.info().human_name(),
            resolution.width(),
            resolution.height()
        );

        Ok(Self {
            camera: Some(camera),
            handle,
            latest: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            frame_count: Arc::new(AtomicU64::new(0)),
            thread: None,
            width: resolution.width(),
            height: resolution.height(),
        })
    }

    /// Starts frame delivery on the capture thread.
    ///
    /// Must only be called once the camera texture exists and the window
    /// dimensions are known. A second call (window resize) is a no-op.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.thread.is_some() {
            return Ok(());
        }
        let Some(mut camera) = self.camera.take() else {
            return Ok(());
        };
        camera.open_stream().map_err(CaptureError::Stream)?;

        self.running.store(true, Ordering::Release);
        let latest = Arc::clone(&self.latest);
        let running = Arc::clone(&self.running);
        let frame_count = Arc::clone(&self.frame_count);
        let handle = self.handle.clone();

        let thread = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_loop(camera, latest, running, frame_count, handle);
            })?;
        self.thread = Some(thread);
        Ok(())
    }

    /// Capture thread body: grab, decode, publish, notify.
    fn capture_loop(
        mut camera: Camera,
        latest: Arc<Mutex<Option<CameraFrame>>>,
        running: Arc<AtomicBool>,
        frame_count: Arc<AtomicU64>,
        handle: RenderHandle,
    ) {
        log::debug!("capture thread running");

        while running.load(Ordering::Acquire) {
            match camera.frame() {
                Ok(buffer) => match buffer.decode_image::<RgbAFormat>() {
                    Ok(image) => {
                        let frame = CameraFrame {
                            width: buffer.resolution().width(),
                            height: buffer.resolution().height(),
                            data: image.into_raw(),
                            frame_number: frame_count.fetch_add(1, Ordering::Relaxed),
                        };
                        *latest.lock() = Some(frame);
                        // The render thread imports the buffer when it
                        // reaches this message; no GPU work happens here.
                        handle.send_frame_available();
                    }
                    Err(e) => log::warn!("failed to decode frame: {e}"),
                },
                Err(e) => {
                    log::warn!("failed to capture frame: {e}");
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }

        if let Err(e) = camera.stop_stream() {
            log::debug!("stop_stream: {e}");
        }
        log::debug!("capture thread stopped");
    }

    /// Latest decoded frame, if any has arrived yet.
    pub fn latest_frame(&self) -> Option<CameraFrame> {
        self.latest.lock().clone()
    }

    /// Resolution actually negotiated with the device, which may differ from
    /// the requested preview size.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Number of frames delivered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Stops preview and releases the device. Safe to call when already
    /// released.
    pub fn release(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            log::debug!("camera released");
        }
        self.camera = None;
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.release();
    }
}
