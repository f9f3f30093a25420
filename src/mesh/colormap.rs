//! Distance-to-color mapping.
//!
//! Mesh coloring derives each vertex color from the distance voxel it
//! sits on. The exact mapping is injectable on the integrator; the
//! default here is a fixed, deterministic diverging ramp.

use super::Color;

/// Deterministic mapping from a signed distance to a vertex color.
///
/// Receives the voxel's distance and the configured truncation distance
/// used to normalize it.
pub type ColorMap = fn(distance: f32, truncation: f32) -> Color;

/// Default diverging ramp: red inside the surface, blue outside, white
/// at the zero crossing. Distances are normalized by the truncation
/// distance and clamped to `[-1, 1]`.
pub fn diverging_colormap(distance: f32, truncation: f32) -> Color {
    let t = (distance / truncation).clamp(-1.0, 1.0);
    Color {
        r: ((1.0 - t.max(0.0)) * 255.0) as u8,
        g: ((1.0 - t.abs()) * 255.0) as u8,
        b: ((1.0 + t.min(0.0)) * 255.0) as u8,
        a: 255,
    }
}
