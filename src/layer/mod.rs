//! Block-partitioned voxel storage.
//!
//! A [`VoxelLayer`] maps block indices to fixed-size cubic
//! [`VoxelBlock`]s. All layers of a reconstruction (distance field,
//! vertex markers, labels) share the same block/voxel geometry, and
//! cross-structure linkage is always by block index, never by pointer,
//! so block lifetime in one layer cannot dangle a reference held by
//! another.

mod label;
mod tsdf;
mod vertex;

pub use label::{LabelLayer, LabelVoxel};
pub use tsdf::{sdf_if_valid, TsdfLayer, TsdfVoxel};
pub use vertex::{VertexLayer, VertexVoxel};

use std::collections::HashMap;

use glam::Vec3;

use crate::error::MesherError;
use crate::types::{
    block_index_from_point, linear_index, voxel_index_from_linear, BlockIndex, VoxelIndex,
};

/// A cubic grid of voxels anchored at `block_index * block_size`.
#[derive(Debug, Clone)]
pub struct VoxelBlock<T> {
    block_index: BlockIndex,
    origin: Vec3,
    voxel_size: f32,
    voxels_per_side: usize,
    voxels: Vec<T>,
    updated: bool,
}

impl<T: Default + Clone> VoxelBlock<T> {
    /// Create a block with all voxels default-initialized.
    pub fn new(block_index: BlockIndex, voxels_per_side: usize, voxel_size: f32) -> Self {
        let block_size = voxels_per_side as f32 * voxel_size;
        VoxelBlock {
            block_index,
            origin: block_index.as_vec3() * block_size,
            voxel_size,
            voxels_per_side,
            voxels: vec![T::default(); voxels_per_side * voxels_per_side * voxels_per_side],
            updated: false,
        }
    }
}

impl<T> VoxelBlock<T> {
    /// Index of this block in its layer.
    pub fn block_index(&self) -> BlockIndex {
        self.block_index
    }

    /// World-space position of the block's minimal corner.
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Edge length of one voxel.
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Number of voxels along each block edge.
    pub fn voxels_per_side(&self) -> usize {
        self.voxels_per_side
    }

    /// Edge length of the whole block.
    pub fn block_size(&self) -> f32 {
        self.voxels_per_side as f32 * self.voxel_size
    }

    /// Total voxel count (`voxels_per_side³`).
    pub fn num_voxels(&self) -> usize {
        self.voxels.len()
    }

    /// Whether every component of `index` lies in `[0, voxels_per_side)`.
    pub fn is_valid_voxel_index(&self, index: VoxelIndex) -> bool {
        let n = self.voxels_per_side as i32;
        index.x >= 0 && index.x < n && index.y >= 0 && index.y < n && index.z >= 0 && index.z < n
    }

    /// Voxel at a local index. Panics on out-of-range indices.
    pub fn voxel(&self, index: VoxelIndex) -> &T {
        &self.voxels[linear_index(index, self.voxels_per_side)]
    }

    /// Mutable voxel at a local index. Panics on out-of-range indices.
    pub fn voxel_mut(&mut self, index: VoxelIndex) -> &mut T {
        &mut self.voxels[linear_index(index, self.voxels_per_side)]
    }

    /// Voxel at a linear storage index.
    pub fn voxel_by_linear(&self, linear: usize) -> &T {
        &self.voxels[linear]
    }

    /// Mutable voxel at a linear storage index.
    pub fn voxel_by_linear_mut(&mut self, linear: usize) -> &mut T {
        &mut self.voxels[linear]
    }

    /// Local index for a linear storage index.
    pub fn voxel_index_from_linear(&self, linear: usize) -> VoxelIndex {
        voxel_index_from_linear(linear, self.voxels_per_side)
    }

    /// World-space position of a voxel's minimal corner.
    ///
    /// Accepts indices outside `[0, voxels_per_side)` and extrapolates;
    /// boundary cells use this to place corner positions that physically
    /// belong to a neighboring block in this block's coordinate frame.
    pub fn voxel_coordinates(&self, index: VoxelIndex) -> Vec3 {
        self.origin + index.as_vec3() * self.voxel_size
    }

    /// Local voxel index containing a world-space point. The result is
    /// out of range when the point lies outside this block.
    pub fn voxel_index_from_coordinates(&self, point: Vec3) -> VoxelIndex {
        ((point - self.origin) / self.voxel_size).floor().as_ivec3()
    }

    /// Whether the block content changed since the flag was last cleared.
    pub fn updated(&self) -> bool {
        self.updated
    }

    /// Set or clear the updated flag.
    pub fn set_updated(&mut self, updated: bool) {
        self.updated = updated;
    }
}

/// Block-keyed voxel storage with lazy allocation.
#[derive(Debug, Clone, Default)]
pub struct VoxelLayer<T> {
    voxel_size: f32,
    voxels_per_side: usize,
    blocks: HashMap<BlockIndex, VoxelBlock<T>>,
}

impl<T: Default + Clone> VoxelLayer<T> {
    /// Create an empty layer.
    ///
    /// # Arguments
    /// * `voxel_size` - Edge length of one voxel in world units
    /// * `voxels_per_side` - Voxels along each block edge (at least 2)
    pub fn new(voxel_size: f32, voxels_per_side: usize) -> Result<Self, MesherError> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(MesherError::InvalidVoxelSize(voxel_size));
        }
        if voxels_per_side < 2 {
            return Err(MesherError::InvalidVoxelsPerSide(voxels_per_side));
        }
        Ok(VoxelLayer {
            voxel_size,
            voxels_per_side,
            blocks: HashMap::new(),
        })
    }

    /// Fetch a block, allocating a default-initialized one if absent.
    pub fn allocate_block(&mut self, index: BlockIndex) -> &mut VoxelBlock<T> {
        let (voxels_per_side, voxel_size) = (self.voxels_per_side, self.voxel_size);
        self.blocks
            .entry(index)
            .or_insert_with(|| VoxelBlock::new(index, voxels_per_side, voxel_size))
    }
}

impl<T> VoxelLayer<T> {
    /// Edge length of one voxel.
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Voxels along each block edge.
    pub fn voxels_per_side(&self) -> usize {
        self.voxels_per_side
    }

    /// Edge length of one block.
    pub fn block_size(&self) -> f32 {
        self.voxels_per_side as f32 * self.voxel_size
    }

    /// Number of allocated blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no blocks are allocated.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Whether a block is allocated.
    pub fn has_block(&self, index: BlockIndex) -> bool {
        self.blocks.contains_key(&index)
    }

    /// Shared access to a block, if allocated.
    pub fn block(&self, index: BlockIndex) -> Option<&VoxelBlock<T>> {
        self.blocks.get(&index)
    }

    /// Mutable access to a block, if allocated.
    pub fn block_mut(&mut self, index: BlockIndex) -> Option<&mut VoxelBlock<T>> {
        self.blocks.get_mut(&index)
    }

    /// Remove a block from the layer.
    pub fn remove_block(&mut self, index: BlockIndex) -> Option<VoxelBlock<T>> {
        self.blocks.remove(&index)
    }

    /// Indices of all allocated blocks, sorted for deterministic
    /// iteration.
    pub fn allocated_blocks(&self) -> Vec<BlockIndex> {
        let mut indices: Vec<_> = self.blocks.keys().copied().collect();
        indices.sort_unstable_by_key(|index| index.to_array());
        indices
    }

    /// Indices of all blocks whose updated flag is set, sorted.
    pub fn updated_blocks(&self) -> Vec<BlockIndex> {
        let mut indices: Vec<_> = self
            .blocks
            .iter()
            .filter(|(_, block)| block.updated())
            .map(|(index, _)| *index)
            .collect();
        indices.sort_unstable_by_key(|index| index.to_array());
        indices
    }

    /// Set a block's updated flag. Returns false if the block is absent.
    pub fn mark_updated(&mut self, index: BlockIndex) -> bool {
        match self.blocks.get_mut(&index) {
            Some(block) => {
                block.set_updated(true);
                true
            }
            None => false,
        }
    }

    /// Clear a block's updated flag. Returns false if the block is absent.
    pub fn clear_updated(&mut self, index: BlockIndex) -> bool {
        match self.blocks.get_mut(&index) {
            Some(block) => {
                block.set_updated(false);
                true
            }
            None => false,
        }
    }

    /// Block index containing a world-space point.
    pub fn block_index_from_point(&self, point: Vec3) -> BlockIndex {
        block_index_from_point(point, self.block_size())
    }

    /// Block containing a world-space point, if allocated.
    pub fn block_by_coordinates(&self, point: Vec3) -> Option<&VoxelBlock<T>> {
        self.block(self.block_index_from_point(point))
    }

    /// Voxel containing a world-space point, if its block is allocated.
    pub fn voxel_by_coordinates(&self, point: Vec3) -> Option<&T> {
        let block = self.block_by_coordinates(point)?;
        let index = block.voxel_index_from_coordinates(point);
        debug_assert!(block.is_valid_voxel_index(index));
        Some(block.voxel(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_geometry() {
        assert!(VoxelLayer::<TsdfVoxel>::new(0.0, 8).is_err());
        assert!(VoxelLayer::<TsdfVoxel>::new(-0.1, 8).is_err());
        assert!(VoxelLayer::<TsdfVoxel>::new(0.1, 1).is_err());
    }

    #[test]
    fn block_origin_and_coordinates() {
        let mut layer = VoxelLayer::<TsdfVoxel>::new(0.1, 8).unwrap();
        let block = layer.allocate_block(BlockIndex::new(-1, 0, 2));
        assert!((block.origin() - Vec3::new(-0.8, 0.0, 1.6)).length() < 1e-6);

        let coords = block.voxel_coordinates(VoxelIndex::new(1, 2, 3));
        assert!((coords - Vec3::new(-0.7, 0.2, 1.9)).length() < 1e-6);
        assert_eq!(block.voxel_index_from_coordinates(coords), VoxelIndex::new(1, 2, 3));
    }

    #[test]
    fn coordinate_lookup_across_blocks() {
        let mut layer = VoxelLayer::<TsdfVoxel>::new(0.1, 8).unwrap();
        layer.allocate_block(BlockIndex::ZERO).voxel_mut(VoxelIndex::new(3, 3, 3)).distance = 1.0;

        let voxel = layer.voxel_by_coordinates(Vec3::new(0.35, 0.35, 0.35)).unwrap();
        assert_eq!(voxel.distance, 1.0);
        assert!(layer.voxel_by_coordinates(Vec3::new(-0.05, 0.0, 0.0)).is_none());
    }

    #[test]
    fn updated_flags_track_blocks() {
        let mut layer = VoxelLayer::<TsdfVoxel>::new(0.1, 8).unwrap();
        layer.allocate_block(BlockIndex::ZERO);
        layer.allocate_block(BlockIndex::new(1, 0, 0));
        assert!(layer.updated_blocks().is_empty());

        assert!(layer.mark_updated(BlockIndex::new(1, 0, 0)));
        assert!(!layer.mark_updated(BlockIndex::new(5, 5, 5)));
        assert_eq!(layer.updated_blocks(), vec![BlockIndex::new(1, 0, 0)]);

        assert!(layer.clear_updated(BlockIndex::new(1, 0, 0)));
        assert!(layer.updated_blocks().is_empty());
    }

    #[test]
    fn allocated_blocks_are_sorted() {
        let mut layer = VoxelLayer::<TsdfVoxel>::new(0.1, 8).unwrap();
        for index in [
            BlockIndex::new(1, 0, 0),
            BlockIndex::new(-1, 2, 0),
            BlockIndex::ZERO,
        ] {
            layer.allocate_block(index);
        }
        let sorted = layer.allocated_blocks();
        assert_eq!(sorted.len(), 3);
        assert!(sorted.windows(2).all(|w| w[0].to_array() < w[1].to_array()));
    }
}
