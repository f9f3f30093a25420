//! Core index types and grid arithmetic.
//!
//! Space is partitioned into fixed-size cubic blocks; each block holds a
//! cubic array of voxels. A [`BlockIndex`] identifies a block, a
//! [`VoxelIndex`] a voxel inside one. Together with the voxel size they
//! map bijectively to the world-space position of a voxel's minimal
//! corner.

use glam::{IVec3, Vec3};

/// Identifies a cubic block of space. Blocks are the unit of allocation,
/// update tracking, and parallel work.
pub type BlockIndex = IVec3;

/// Identifies a voxel within a block; each component lies in
/// `[0, voxels_per_side)` for indices that are local to the block.
pub type VoxelIndex = IVec3;

/// Linear storage index for a voxel, X-major: `x + y * n + z * n * n`.
#[inline]
pub fn linear_index(index: VoxelIndex, voxels_per_side: usize) -> usize {
    let n = voxels_per_side as i32;
    debug_assert!(
        index.x >= 0 && index.x < n && index.y >= 0 && index.y < n && index.z >= 0 && index.z < n,
        "voxel index {index} out of range for {voxels_per_side} voxels per side"
    );
    (index.x + index.y * n + index.z * n * n) as usize
}

/// Inverse of [`linear_index`].
#[inline]
pub fn voxel_index_from_linear(linear: usize, voxels_per_side: usize) -> VoxelIndex {
    let n = voxels_per_side;
    VoxelIndex::new(
        (linear % n) as i32,
        ((linear / n) % n) as i32,
        (linear / (n * n)) as i32,
    )
}

/// Block containing the given world-space point.
#[inline]
pub fn block_index_from_point(point: Vec3, block_size: f32) -> BlockIndex {
    (point / block_size).floor().as_ivec3()
}

/// Resolve a corner index that fell outside `[0, voxels_per_side)` into
/// the neighboring block that owns it.
///
/// Offsets the block index by -1/+1 along every axis where the corner is
/// out of range and wraps the corner back into local range. Corners are
/// at most one voxel outside, so a single wrap per axis suffices.
///
/// # Returns
/// `(neighbor_block_index, wrapped_corner_index)`
#[inline]
pub fn neighbor_block_index(
    block_index: BlockIndex,
    corner_index: VoxelIndex,
    voxels_per_side: i32,
) -> (BlockIndex, VoxelIndex) {
    let mut offset = IVec3::ZERO;
    let mut wrapped = corner_index;
    for axis in 0..3 {
        if wrapped[axis] < 0 {
            offset[axis] = -1;
            wrapped[axis] += voxels_per_side;
        } else if wrapped[axis] >= voxels_per_side {
            offset[axis] = 1;
            wrapped[axis] -= voxels_per_side;
        }
    }
    (block_index + offset, wrapped)
}
