//! Mesh storage and extraction kernel.
//!
//! The mesh store keeps one [`MeshBlock`] per distance-field block.
//! Blocks are destroyed and regenerated whole on every remesh; nothing
//! is patched incrementally, so a block's contents always reflect the
//! current distance field. Blocks sit behind a mutex so the parallel
//! extraction passes can mutate disjoint blocks through a shared layer
//! reference.

mod colormap;
mod marching_cubes;
mod tables;

pub use colormap::{diverging_colormap, ColorMap};
pub use marching_cubes::{cube_configuration, mesh_cube};
pub use tables::{CUBE_CORNER_OFFSETS, EDGE_ENDPOINTS, EDGE_TABLE, TRI_TABLE};

use std::collections::HashMap;
use std::sync::Mutex;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::BlockIndex;

/// RGBA vertex color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Color {
    /// Create a color from channel values.
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }
}

impl Default for Color {
    /// Opaque mid-gray, used for vertices whose voxel carries no valid
    /// distance data.
    fn default() -> Self {
        Color::new(127, 127, 127, 255)
    }
}

/// Extracted mesh for one block.
///
/// Vertices are insertion-ordered; `indices` groups them into triangles
/// and always has length divisible by 3. `colors` parallels `vertices`.
/// `labels` parallels `vertices` too, but only when a label layer was
/// configured during extraction; otherwise it stays empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBlock {
    /// Vertex positions in world space.
    pub vertices: Vec<Vec3>,
    /// Triangle indices into `vertices`, in groups of three.
    pub indices: Vec<u32>,
    /// Per-vertex colors.
    pub colors: Vec<Color>,
    /// Per-vertex semantic labels; empty when no label layer is used.
    pub labels: Vec<u32>,
    /// Whether this block was regenerated since the flag was last taken.
    pub updated: bool,
}

impl MeshBlock {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether the block holds no geometry.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Drop all contents and clear the updated flag.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.colors.clear();
        self.labels.clear();
        self.updated = false;
    }

    /// Read and clear the updated flag; lets a downstream consumer
    /// detect blocks regenerated since it last looked.
    pub fn take_updated(&mut self) -> bool {
        std::mem::replace(&mut self.updated, false)
    }
}

/// Block-keyed mesh store.
#[derive(Debug, Default)]
pub struct MeshLayer {
    block_size: f32,
    blocks: HashMap<BlockIndex, Mutex<MeshBlock>>,
}

impl MeshLayer {
    /// Create an empty store for blocks of the given edge length.
    pub fn new(block_size: f32) -> Self {
        MeshLayer {
            block_size,
            blocks: HashMap::new(),
        }
    }

    /// Edge length of one block.
    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    /// Number of allocated mesh blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no mesh blocks are allocated.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Whether a mesh block exists for this index.
    pub fn has_block(&self, index: BlockIndex) -> bool {
        self.blocks.contains_key(&index)
    }

    /// Fetch a block, allocating an empty one if absent, and clear its
    /// contents so extraction starts from scratch.
    pub fn allocate_and_clear_block(&mut self, index: BlockIndex) -> &mut MeshBlock {
        let block = self
            .blocks
            .entry(index)
            .or_default()
            .get_mut()
            .expect("mesh block lock poisoned");
        block.clear();
        block
    }

    /// Lock handle for a block, if allocated.
    pub fn block(&self, index: BlockIndex) -> Option<&Mutex<MeshBlock>> {
        self.blocks.get(&index)
    }

    /// Mutable access to a block without locking, if allocated.
    pub fn block_mut(&mut self, index: BlockIndex) -> Option<&mut MeshBlock> {
        self.blocks
            .get_mut(&index)
            .map(|block| block.get_mut().expect("mesh block lock poisoned"))
    }

    /// Remove a block from the store.
    pub fn remove_block(&mut self, index: BlockIndex) -> Option<MeshBlock> {
        self.blocks
            .remove(&index)
            .map(|block| block.into_inner().expect("mesh block lock poisoned"))
    }

    /// Indices of all allocated mesh blocks, sorted for deterministic
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
            .filter(|(_, block)| block.lock().expect("mesh block lock poisoned").updated)
            .map(|(index, _)| *index)
            .collect();
        indices.sort_unstable_by_key(|index| index.to_array());
        indices
    }

    /// Total vertex count across all blocks.
    pub fn vertex_count(&self) -> usize {
        self.blocks
            .values()
            .map(|block| block.lock().expect("mesh block lock poisoned").vertex_count())
            .sum()
    }

    /// Total triangle count across all blocks.
    pub fn triangle_count(&self) -> usize {
        self.blocks
            .values()
            .map(|block| block.lock().expect("mesh block lock poisoned").triangle_count())
            .sum()
    }
}
