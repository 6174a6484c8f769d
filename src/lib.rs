//! Live camera passthrough with a transformable sprite overlay.
//!
//! Captures camera frames, imports them into a GPU texture and composites a
//! movable, scalable, rotatable sprite over a window surface. A dedicated
//! render thread owns the GPU context, the surface and the camera; every
//! mutation of that state arrives through an ordered message channel.

pub mod camera;
pub mod geometry;
pub mod render;

pub use camera::{CameraDescriptor, CameraParameters};
pub use render::{RenderHandle, RenderThread};
