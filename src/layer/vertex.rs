//! Vertex marker layer.
//!
//! A grid parallel to the distance field recording, per voxel, whether a
//! mesh vertex currently lies near that voxel. Markers are reset at the
//! start of every remesh of their block and written by the cube sampler
//! as it emits vertices, so they are never stale relative to the stored
//! mesh. Blocks sit behind a mutex because the interior and exterior
//! passes mutate them from worker threads; block assignment is
//! partitioned, so each lock is uncontended.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::VoxelBlock;
use crate::error::MesherError;
use crate::types::BlockIndex;

/// One vertex-marker voxel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexVoxel {
    /// Whether a mesh vertex currently lies on or near this voxel.
    pub on_surface: bool,
}

/// Block-partitioned vertex marker grid.
#[derive(Debug, Default)]
pub struct VertexLayer {
    voxel_size: f32,
    voxels_per_side: usize,
    blocks: HashMap<BlockIndex, Mutex<VoxelBlock<VertexVoxel>>>,
}

impl VertexLayer {
    /// Create an empty marker layer with the same geometry as the
    /// distance field it parallels.
    pub fn new(voxel_size: f32, voxels_per_side: usize) -> Result<Self, MesherError> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(MesherError::InvalidVoxelSize(voxel_size));
        }
        if voxels_per_side < 2 {
            return Err(MesherError::InvalidVoxelsPerSide(voxels_per_side));
        }
        Ok(VertexLayer {
            voxel_size,
            voxels_per_side,
            blocks: HashMap::new(),
        })
    }

    /// Edge length of one voxel.
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Voxels along each block edge.
    pub fn voxels_per_side(&self) -> usize {
        self.voxels_per_side
    }

    /// Whether a block is allocated.
    pub fn has_block(&self, index: BlockIndex) -> bool {
        self.blocks.contains_key(&index)
    }

    /// Number of allocated blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Fetch a block, allocating it if absent, and reset every marker to
    /// "no vertex present".
    ///
    /// Called for each candidate block before remeshing so the cube
    /// sampler starts from a clean slate.
    pub fn allocate_and_reset_block(&mut self, index: BlockIndex) -> &mut VoxelBlock<VertexVoxel> {
        let (voxels_per_side, voxel_size) = (self.voxels_per_side, self.voxel_size);
        let block = self
            .blocks
            .entry(index)
            .or_insert_with(|| Mutex::new(VoxelBlock::new(index, voxels_per_side, voxel_size)))
            .get_mut()
            .expect("vertex marker block lock poisoned");
        for linear in 0..block.num_voxels() {
            block.voxel_by_linear_mut(linear).on_surface = false;
        }
        block
    }

    /// Lock handle for a block, if allocated. Workers hold the lock for
    /// the duration of their per-block extraction.
    pub fn block(&self, index: BlockIndex) -> Option<&Mutex<VoxelBlock<VertexVoxel>>> {
        self.blocks.get(&index)
    }

    /// Number of voxels in a block currently marked as carrying a
    /// vertex. Zero for unallocated blocks.
    pub fn surface_voxel_count(&self, index: BlockIndex) -> usize {
        let Some(block) = self.blocks.get(&index) else {
            return 0;
        };
        let block = block.lock().expect("vertex marker block lock poisoned");
        (0..block.num_voxels())
            .filter(|&linear| block.voxel_by_linear(linear).on_surface)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VoxelIndex;

    #[test]
    fn allocate_resets_markers() {
        let mut layer = VertexLayer::new(0.1, 4).unwrap();
        let block = layer.allocate_and_reset_block(BlockIndex::ZERO);
        block.voxel_mut(VoxelIndex::new(1, 1, 1)).on_surface = true;
        assert_eq!(layer.surface_voxel_count(BlockIndex::ZERO), 1);

        layer.allocate_and_reset_block(BlockIndex::ZERO);
        assert_eq!(layer.surface_voxel_count(BlockIndex::ZERO), 0);
    }

    #[test]
    fn missing_block_has_no_markers() {
        let layer = VertexLayer::new(0.1, 4).unwrap();
        assert!(!layer.has_block(BlockIndex::ZERO));
        assert_eq!(layer.surface_voxel_count(BlockIndex::ZERO), 0);
    }
}
