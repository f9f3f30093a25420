//! Truncated signed distance field storage.
//!
//! The distance field is owned and mutated by an external fusion
//! component; the mesh integrator only reads it. A block's updated flag
//! doubles as its "needs remeshing" indicator: fusion sets it after
//! writing voxels, meshing clears it when asked to.

use serde::{Deserialize, Serialize};

use super::VoxelLayer;

/// One distance-field voxel.
///
/// The distance is signed (negative inside the surface) and truncated;
/// the weight accumulates observations. A voxel with weight below the
/// configured minimum carries no usable data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TsdfVoxel {
    /// Signed distance to the nearest observed surface.
    pub distance: f32,
    /// Accumulated integration weight; zero means unobserved.
    pub weight: f32,
}

/// Block-partitioned truncated signed distance field.
pub type TsdfLayer = VoxelLayer<TsdfVoxel>;

/// Distance value of a voxel, if its weight clears the threshold.
///
/// Voxels below `min_weight` are treated as "no data": any cell touching
/// one is skipped entirely rather than partially meshed.
#[inline]
pub fn sdf_if_valid(voxel: &TsdfVoxel, min_weight: f32) -> Option<f32> {
    if voxel.weight < min_weight {
        None
    } else {
        Some(voxel.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_gates_validity() {
        let voxel = TsdfVoxel {
            distance: 0.25,
            weight: 0.5,
        };
        assert_eq!(sdf_if_valid(&voxel, 0.1), Some(0.25));
        assert_eq!(sdf_if_valid(&voxel, 0.6), None);
        assert_eq!(sdf_if_valid(&TsdfVoxel::default(), 1e-4), None);
    }
}
