//! Sprite geometry math.
//!
//! Pure functions mapping the UI-controlled parameters and the window/camera
//! dimensions to a sprite transform. Nothing here touches GPU or camera
//! state, so the whole module is unit-testable.

pub const DEFAULT_ZOOM_PERCENT: u32 = 0;
pub const DEFAULT_SIZE_PERCENT: u32 = 50;
pub const DEFAULT_ROTATE_PERCENT: u32 = 0;

/// Maximum sprite scale is a bit larger than the window's smaller dimension,
/// so the sprite can be sized past the screen edge.
const OVERSIZE_FACTOR: f32 = 1.25;

/// UI-controlled sprite parameters.
///
/// Percent values are expected in 0-100. The position is stored in GPU
/// coordinates, with the origin in the lower-left corner of the window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometryParameters {
    pub zoom_percent: u32,
    pub size_percent: u32,
    pub rotate_percent: u32,
    pub pos_x: f32,
    pub pos_y: f32,
}

impl Default for GeometryParameters {
    fn default() -> Self {
        Self {
            zoom_percent: DEFAULT_ZOOM_PERCENT,
            size_percent: DEFAULT_SIZE_PERCENT,
            rotate_percent: DEFAULT_ROTATE_PERCENT,
            pos_x: 0.0,
            pos_y: 0.0,
        }
    }
}

/// Computed sprite placement for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteTransform {
    pub width: f32,
    pub height: f32,
    pub rotation_degrees: f32,
    pub pos_x: f32,
    pub pos_y: f32,
    /// 1.0 samples the full camera image, 0.0 is the maximally zoomed
    /// center crop.
    pub crop_factor: f32,
}

/// Converts a screen-space Y coordinate (origin top-left) to sprite space
/// (origin bottom-left). X passes through unchanged.
pub fn flip_screen_y(y: f32, window_height: u32) -> f32 {
    window_height as f32 - y
}

/// Computes the sprite transform from the current parameters.
///
/// The sprite height tracks the window's smaller dimension scaled by
/// `size_percent`; the width follows the camera aspect ratio so the image is
/// never stretched.
pub fn compute_transform(
    params: &GeometryParameters,
    window_width: u32,
    window_height: u32,
    camera_aspect: f32,
) -> SpriteTransform {
    let small_dim = window_width.min(window_height) as f32;
    let scaled = small_dim * (params.size_percent as f32 / 100.0) * OVERSIZE_FACTOR;

    SpriteTransform {
        width: (scaled * camera_aspect).round(),
        height: scaled.round(),
        rotation_degrees: (360.0 * (params.rotate_percent as f32 / 100.0)).round(),
        pos_x: params.pos_x,
        pos_y: params.pos_y,
        crop_factor: 1.0 - params.zoom_percent as f32 / 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(zoom: u32, size: u32, rotate: u32) -> GeometryParameters {
        GeometryParameters {
            zoom_percent: zoom,
            size_percent: size,
            rotate_percent: rotate,
            pos_x: 0.0,
            pos_y: 0.0,
        }
    }

    #[test]
    fn test_transform_is_deterministic() {
        let p = params(30, 70, 10);
        let a = compute_transform(&p, 800, 600, 16.0 / 9.0);
        let b = compute_transform(&p, 800, 600, 16.0 / 9.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zoom_maps_to_crop_factor() {
        let none = compute_transform(&params(0, 50, 0), 800, 600, 1.0);
        assert_eq!(none.crop_factor, 1.0);

        let full = compute_transform(&params(100, 50, 0), 800, 600, 1.0);
        assert_eq!(full.crop_factor, 0.0);
    }

    #[test]
    fn test_size_scales_with_small_dimension() {
        // window 1000x2000, camera 4:3, size 100%:
        // scaled = 1000 * 1.0 * 1.25 = 1250
        let t = compute_transform(&params(0, 100, 0), 1000, 2000, 4.0 / 3.0);
        assert_eq!(t.width, 1667.0);
        assert_eq!(t.height, 1250.0);
    }

    #[test]
    fn test_rotation_percent_maps_to_degrees() {
        assert_eq!(
            compute_transform(&params(0, 50, 0), 800, 600, 1.0).rotation_degrees,
            0.0
        );
        assert_eq!(
            compute_transform(&params(0, 50, 50), 800, 600, 1.0).rotation_degrees,
            180.0
        );
        assert_eq!(
            compute_transform(&params(0, 50, 100), 800, 600, 1.0).rotation_degrees,
            360.0
        );
    }

    #[test]
    fn test_screen_y_is_flipped() {
        assert_eq!(flip_screen_y(300.0, 1000), 700.0);
    }

    #[test]
    fn test_default_parameters() {
        let p = GeometryParameters::default();
        assert_eq!(p.zoom_percent, 0);
        assert_eq!(p.size_percent, 50);
        assert_eq!(p.rotate_percent, 0);
    }
}
