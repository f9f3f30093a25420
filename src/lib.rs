//! Incremental isosurface extraction from block-partitioned truncated
//! signed distance fields.
//!
//! The reconstruction volume is a sparse grid of fixed-size cubic
//! blocks, each holding a cube of distance voxels. As an integration
//! pipeline updates blocks, it flags them; the [`MeshIntegrator`]
//! regenerates exactly the flagged blocks' meshes with marching cubes,
//! stitching geometry seamlessly across block boundaries and painting
//! per-vertex colors (and optional semantic labels) from the voxel data.
//!
//! All heavy state is owned by the caller: the distance field
//! ([`TsdfLayer`]), the vertex marker grid ([`VertexLayer`]), the mesh
//! store ([`MeshLayer`]), and an optional [`LabelLayer`]. The integrator
//! itself owns only its configuration and worker pool, so one integrator
//! can serve many volumes.
//!
//! # Example
//!
//! Mesh a small sphere held in a single block:
//!
//! ```
//! use tsdf_mesher::prelude::*;
//!
//! let mut tsdf = TsdfLayer::new(0.1, 8)?;
//! let block = tsdf.allocate_block(BlockIndex::ZERO);
//! for linear in 0..block.num_voxels() {
//!     let index = block.voxel_index_from_linear(linear);
//!     let position = block.voxel_coordinates(index);
//!     let voxel = block.voxel_by_linear_mut(linear);
//!     voxel.distance = (position - Vec3::splat(0.4)).length() - 0.3;
//!     voxel.weight = 1.0;
//! }
//! tsdf.mark_updated(BlockIndex::ZERO);
//!
//! let mut vertex_layer = VertexLayer::new(0.1, 8)?;
//! let mut mesh_layer = MeshLayer::new(tsdf.block_size());
//!
//! let integrator = MeshIntegrator::new(MeshIntegratorConfig::default())?;
//! integrator.generate_mesh(&mut tsdf, &mut vertex_layer, &mut mesh_layer, None, true, true);
//!
//! assert!(mesh_layer.vertex_count() > 0);
//! # Ok::<(), tsdf_mesher::MesherError>(())
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod integrator;
pub mod layer;
pub mod mesh;
pub mod types;

pub use error::MesherError;
pub use integrator::{MeshIntegrator, MeshIntegratorConfig};

/// Common imports for working with the mesher.
pub mod prelude {
    pub use crate::error::MesherError;
    pub use crate::integrator::{MeshIntegrator, MeshIntegratorConfig};
    pub use crate::layer::{
        LabelLayer, LabelVoxel, TsdfLayer, TsdfVoxel, VertexLayer, VertexVoxel, VoxelBlock,
        VoxelLayer,
    };
    pub use crate::mesh::{Color, ColorMap, MeshBlock, MeshLayer};
    pub use crate::types::{BlockIndex, VoxelIndex};

    pub use glam::{IVec3, Vec3};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn empty_field_produces_no_mesh() {
        let mut tsdf = TsdfLayer::new(0.1, 8).unwrap();
        let mut vertex_layer = VertexLayer::new(0.1, 8).unwrap();
        let mut mesh_layer = MeshLayer::new(tsdf.block_size());

        let integrator = MeshIntegrator::new(MeshIntegratorConfig::default()).unwrap();
        integrator.generate_mesh(
            &mut tsdf,
            &mut vertex_layer,
            &mut mesh_layer,
            None,
            false,
            false,
        );
        assert!(mesh_layer.is_empty());
    }
}
