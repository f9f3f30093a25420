//! Semantic label layer.
//!
//! Optional grid parallel to the distance field assigning each voxel a
//! categorical label. Consulted only when painting mesh labels, never
//! for geometry.

use serde::{Deserialize, Serialize};

use super::VoxelLayer;

/// One semantic-label voxel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelVoxel {
    /// Categorical label for this voxel; zero means unlabeled.
    pub label: u32,
}

/// Block-partitioned semantic label grid.
pub type LabelLayer = VoxelLayer<LabelVoxel>;
