//! Control channel between the UI thread and the render thread.
//!
//! Every mutation of render-thread state travels through [`RenderCommand`],
//! including the capture thread's frame-ready signal, so the render thread
//! never shares mutable state with another thread.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use winit::window::Window;

/// Messages accepted by the render thread.
#[derive(Debug)]
pub enum RenderCommand {
    /// The window surface exists. `new_surface` is false when the surface
    /// predates this run and no resize notification will follow.
    SurfaceAvailable {
        window: Arc<Window>,
        new_surface: bool,
    },
    SurfaceChanged {
        width: u32,
        height: u32,
    },
    SurfaceDestroyed,
    Shutdown,
    FrameAvailable,
    SetZoom {
        percent: u32,
    },
    SetSize {
        percent: u32,
    },
    SetRotate {
        percent: u32,
    },
    /// Position in screen pixels, origin top-left. The render thread flips Y
    /// into GPU space.
    SetPosition {
        x: f32,
        y: f32,
    },
    Redraw,
}

/// Cloneable sending side of the control channel. Usable from any thread.
///
/// Sends never block: the queue is unbounded, so a burst of frame
/// notifications queues up rather than being dropped or coalesced. Each
/// sender's messages are delivered in the order it sent them.
#[derive(Clone)]
pub struct RenderHandle {
    tx: Sender<RenderCommand>,
}

impl RenderHandle {
    pub fn send_surface_available(&self, window: Arc<Window>, new_surface: bool) {
        self.send(RenderCommand::SurfaceAvailable { window, new_surface });
    }

    pub fn send_surface_changed(&self, width: u32, height: u32) {
        self.send(RenderCommand::SurfaceChanged { width, height });
    }

    pub fn send_surface_destroyed(&self) {
        self.send(RenderCommand::SurfaceDestroyed);
    }

    /// Tells the render thread to halt. Fire-and-forget: teardown is
    /// observed through [`RenderThread::join`](super::RenderThread::join).
    pub fn send_shutdown(&self) {
        self.send(RenderCommand::Shutdown);
    }

    pub fn send_frame_available(&self) {
        self.send(RenderCommand::FrameAvailable);
    }

    /// `percent` should be 0-100.
    pub fn send_zoom(&self, percent: u32) {
        self.send(RenderCommand::SetZoom { percent });
    }

    /// `percent` should be 0-100.
    pub fn send_size(&self, percent: u32) {
        self.send(RenderCommand::SetSize { percent });
    }

    /// `percent` should be 0-100.
    pub fn send_rotate(&self, percent: u32) {
        self.send(RenderCommand::SetRotate { percent });
    }

    pub fn send_position(&self, x: f32, y: f32) {
        self.send(RenderCommand::SetPosition { x, y });
    }

    pub fn send_redraw(&self) {
        self.send(RenderCommand::Redraw);
    }

    fn send(&self, command: RenderCommand) {
        // The render thread may already have exited; a sender racing
        // teardown loses its message, which is harmless.
        if self.tx.send(command).is_err() {
            log::debug!("render thread gone, dropping message");
        }
    }
}

/// Creates the channel. Called on the render thread so the consumer endpoint
/// is owned by the dispatch loop for the thread's whole lifetime.
pub(crate) fn control_channel() -> (RenderHandle, Receiver<RenderCommand>) {
    let (tx, rx) = unbounded();
    (RenderHandle { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_per_sender_order_is_preserved() {
        let (handle, rx) = control_channel();

        let zoom_handle = handle.clone();
        let zoom_sender = thread::spawn(move || {
            for percent in 0..100 {
                zoom_handle.send_zoom(percent);
            }
        });
        let size_sender = thread::spawn(move || {
            for percent in 0..100 {
                handle.send_size(percent);
            }
        });
        zoom_sender.join().unwrap();
        size_sender.join().unwrap();

        let mut zooms = Vec::new();
        let mut sizes = Vec::new();
        while let Ok(command) = rx.try_recv() {
            match command {
                RenderCommand::SetZoom { percent } => zooms.push(percent),
                RenderCommand::SetSize { percent } => sizes.push(percent),
                other => panic!("unexpected message {:?}", other),
            }
        }

        let expected: Vec<u32> = (0..100).collect();
        assert_eq!(zooms, expected);
        assert_eq!(sizes, expected);
    }

    #[test]
    fn test_queued_messages_are_not_dropped() {
        let (handle, rx) = control_channel();

        // Frame notifications arriving faster than the consumer drains them
        // queue up without bound.
        for _ in 0..10_000 {
            handle.send_frame_available();
        }

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 10_000);
    }

    #[test]
    fn test_send_after_receiver_drop_is_a_no_op() {
        let (handle, rx) = control_channel();
        drop(rx);

        handle.send_redraw();
        handle.send_shutdown();
    }
}
