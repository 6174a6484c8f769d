//! Render thread lifecycle and message dispatch.
//!
//! The render thread exclusively owns the GPU context, the window surface
//! and the camera. Outside influence arrives only through the control
//! channel, so none of that state needs locking.

mod channel;
mod session;
mod sprite;

pub use channel::{RenderCommand, RenderHandle};
pub use session::SurfaceState;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::camera::{CameraCapture, CameraParameters, CaptureError};
use session::{GpuContext, RenderSession};

/// Errors that terminate the render thread.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("failed to spawn render thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("render thread panicked")]
    Panicked,
}

enum GateState {
    Waiting,
    Ready(RenderHandle),
    /// The thread died before the channel existed.
    Failed,
}

/// One-time gate that releases `wait_until_ready` once the control channel
/// exists on the render thread.
struct StartGate {
    state: Mutex<GateState>,
    ready: Condvar,
}

impl StartGate {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Waiting),
            ready: Condvar::new(),
        }
    }

    fn publish(&self, handle: RenderHandle) {
        *self.state.lock() = GateState::Ready(handle);
        self.ready.notify_all();
    }

    fn fail(&self) {
        let mut state = self.state.lock();
        if matches!(*state, GateState::Waiting) {
            *state = GateState::Failed;
            self.ready.notify_all();
        }
    }

    fn wait(&self) -> Option<RenderHandle> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                GateState::Ready(handle) => return Some(handle.clone()),
                GateState::Failed => return None,
                GateState::Waiting => {}
            }
            self.ready.wait(&mut state);
        }
    }
}

/// Handle to the render thread. The thread owns every GPU and camera
/// resource for its whole lifetime.
pub struct RenderThread {
    gate: Arc<StartGate>,
    join: Option<JoinHandle<Result<(), RenderError>>>,
}

impl RenderThread {
    /// Spawns the render thread for the given camera selection.
    ///
    /// Call [`wait_until_ready`](RenderThread::wait_until_ready) before
    /// sending any message.
    pub fn spawn(camera: CameraParameters) -> Result<Self, RenderError> {
        let gate = Arc::new(StartGate::new());
        let thread_gate = Arc::clone(&gate);

        let join = thread::Builder::new().name("render".to_string()).spawn(
            move || -> Result<(), RenderError> {
                let result = run(camera, &thread_gate);
                if let Err(ref e) = result {
                    log::error!("render thread terminated: {e}");
                    thread_gate.fail();
                }
                result
            },
        )?;

        Ok(Self {
            gate,
            join: Some(join),
        })
    }

    /// Blocks the calling thread until the render thread can accept
    /// messages. Returns `None` when the thread died during startup; the
    /// error is then available from [`join`](RenderThread::join).
    pub fn wait_until_ready(&self) -> Option<RenderHandle> {
        self.gate.wait()
    }

    /// Waits for the render thread to finish tearing down.
    ///
    /// [`RenderHandle::send_shutdown`] does not block; callers that must
    /// observe the camera and GPU release call this afterwards.
    pub fn join(mut self) -> Result<(), RenderError> {
        match self.join.take() {
            Some(handle) => handle.join().map_err(|_| RenderError::Panicked)?,
            None => Ok(()),
        }
    }
}

/// Render thread body.
fn run(camera_params: CameraParameters, gate: &StartGate) -> Result<(), RenderError> {
    // The GPU context and the channel consumer must both exist before the
    // gate opens: a caller returning from wait_until_ready may send
    // immediately.
    let gpu = GpuContext::new()?;
    let (handle, commands) = channel::control_channel();
    gate.publish(handle.clone());

    let capture = CameraCapture::open(&camera_params, handle)?;
    let mut session = RenderSession::new(gpu, capture);
    log::debug!("render thread ready");

    // One message at a time, in arrival order. A closed channel means every
    // sender is gone and is treated like a shutdown.
    while let Ok(command) = commands.recv() {
        if !session.dispatch(command)? {
            break;
        }
    }

    session.teardown();
    log::debug!("render thread exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wait_until_ready_blocks_until_publish() {
        let gate = Arc::new(StartGate::new());
        let (handle, rx) = channel::control_channel();

        let waiter_gate = Arc::clone(&gate);
        let waiter = thread::spawn(move || waiter_gate.wait());

        // The waiter must still be blocked: no handle has been published.
        thread::sleep(Duration::from_millis(50));
        gate.publish(handle);

        let handle = waiter.join().unwrap().expect("gate opened with a handle");
        handle.send_redraw();
        assert!(matches!(rx.try_recv(), Ok(RenderCommand::Redraw)));
    }

    #[test]
    fn test_failed_gate_releases_waiter() {
        let gate = Arc::new(StartGate::new());

        let waiter_gate = Arc::clone(&gate);
        let waiter = thread::spawn(move || waiter_gate.wait());

        gate.fail();
        assert!(waiter.join().unwrap().is_none());
    }

    #[test]
    fn test_fail_after_publish_keeps_handle() {
        let gate = StartGate::new();
        let (handle, _rx) = channel::control_channel();

        gate.publish(handle);
        // A late failure (after the loop started) must not revoke readiness.
        gate.fail();
        assert!(gate.wait().is_some());
    }
}
