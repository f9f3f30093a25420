//! Incremental mesh integration.
//!
//! Walks every distance-field block that needs remeshing and extracts
//! its isosurface in two barrier-synchronized parallel passes:
//!
//! - **Interior pass**: cells whose 8 corners all lie strictly inside
//!   one block. Safely parallel per block without touching neighbors.
//! - **Exterior pass**: cells on a block's three maximal faces, which
//!   reach into neighboring blocks for some corner samples. Each
//!   boundary cell is covered exactly once across the whole pass by a
//!   fixed face/edge tie-break (max-X face takes the shared edges,
//!   max-Y and max-Z faces shrink accordingly).
//!
//! Work is pulled from a shared claim-ticket cursor over the candidate
//! block list, so at most one worker ever touches a given block's
//! voxels during a phase.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec3;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::MesherError;
use crate::layer::{
    sdf_if_valid, LabelLayer, TsdfLayer, TsdfVoxel, VertexLayer, VertexVoxel, VoxelBlock,
};
use crate::mesh::{
    diverging_colormap, mesh_cube, Color, ColorMap, MeshBlock, MeshLayer, CUBE_CORNER_OFFSETS,
};
use crate::types::{neighbor_block_index, BlockIndex, VoxelIndex};

/// Configuration for the mesh integrator, owned by the caller and
/// threaded through construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeshIntegratorConfig {
    /// Fixed worker thread pool size for both extraction passes.
    pub integrator_threads: usize,
    /// Minimum integration weight for a voxel to count as observed.
    pub min_weight: f32,
    /// Truncation distance used to normalize distances for coloring.
    pub truncation_distance: f32,
}

impl Default for MeshIntegratorConfig {
    fn default() -> Self {
        MeshIntegratorConfig {
            integrator_threads: 4,
            min_weight: 1e-4,
            truncation_distance: 0.4,
        }
    }
}

/// Monotonically advancing claim ticket over a fixed-length work list.
///
/// Workers atomically claim the next unclaimed list index until none
/// remain; every index is handed out exactly once regardless of how
/// many threads pull from the cursor.
#[derive(Debug)]
pub struct WorkCursor {
    next: AtomicUsize,
    len: usize,
}

impl WorkCursor {
    /// Cursor over `len` work items.
    pub fn new(len: usize) -> Self {
        WorkCursor {
            next: AtomicUsize::new(0),
            len,
        }
    }

    /// Claim the next unclaimed index, or `None` once exhausted.
    pub fn claim(&self) -> Option<usize> {
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);
        (ticket < self.len).then_some(ticket)
    }
}

/// Extracts triangle meshes from a block-partitioned distance field.
///
/// The integrator owns only its configuration, color mapping, and
/// worker pool; the distance field, marker grid, mesh store, and label
/// grid are owned by the caller and passed into [`generate_mesh`]
/// (linkage between them is by block index, never by pointer).
///
/// [`generate_mesh`]: MeshIntegrator::generate_mesh
pub struct MeshIntegrator {
    config: MeshIntegratorConfig,
    pool: rayon::ThreadPool,
    color_map: ColorMap,
}

impl MeshIntegrator {
    /// Build an integrator and its fixed-size worker pool.
    pub fn new(config: MeshIntegratorConfig) -> Result<Self, MesherError> {
        if config.integrator_threads == 0 {
            return Err(MesherError::NoWorkerThreads);
        }
        if !(config.truncation_distance.is_finite() && config.truncation_distance > 0.0) {
            return Err(MesherError::InvalidTruncationDistance(
                config.truncation_distance,
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.integrator_threads)
            .thread_name(|i| format!("mesh-worker-{i}"))
            .build()?;
        Ok(MeshIntegrator {
            config,
            pool,
            color_map: diverging_colormap,
        })
    }

    /// Replace the distance-to-color mapping used when painting.
    pub fn with_color_map(mut self, color_map: ColorMap) -> Self {
        self.color_map = color_map;
        self
    }

    /// The integrator's configuration.
    pub fn config(&self) -> &MeshIntegratorConfig {
        &self.config
    }

    /// Regenerate meshes for every candidate block of the distance
    /// field.
    ///
    /// Candidates are the blocks flagged as needing remeshing when
    /// `only_updated` is set, or every allocated block otherwise. Each
    /// candidate's mesh and marker blocks are cleared and rebuilt from
    /// scratch; `clear_flag` then clears the distance field's remeshing
    /// flags for all candidates.
    ///
    /// The distance field must not be mutated concurrently with this
    /// call.
    ///
    /// # Panics
    /// Panics if the layers disagree on block/voxel geometry, or if the
    /// block registries are inconsistent (a candidate block vanishing
    /// from the distance field mid-call).
    pub fn generate_mesh(
        &self,
        tsdf: &mut TsdfLayer,
        vertex_layer: &mut VertexLayer,
        mesh_layer: &mut MeshLayer,
        label_layer: Option<&LabelLayer>,
        only_updated: bool,
        clear_flag: bool,
    ) {
        self.check_layer_geometry(tsdf, vertex_layer, mesh_layer, label_layer);

        let blocks = if only_updated {
            tsdf.updated_blocks()
        } else {
            tsdf.allocated_blocks()
        };
        debug!(
            "meshing {} candidate blocks (only_updated={only_updated}, clear_flag={clear_flag})",
            blocks.len()
        );

        for &index in &blocks {
            mesh_layer.allocate_and_clear_block(index);
            vertex_layer.allocate_and_reset_block(index);
        }

        {
            let tsdf_ref: &TsdfLayer = tsdf;
            let vertex_ref: &VertexLayer = vertex_layer;
            let mesh_ref: &MeshLayer = mesh_layer;

            let cursor = WorkCursor::new(blocks.len());
            self.pool.broadcast(|_| {
                while let Some(i) = cursor.claim() {
                    self.update_block_interior(blocks[i], tsdf_ref, vertex_ref, mesh_ref);
                }
            });

            let cursor = WorkCursor::new(blocks.len());
            self.pool.broadcast(|_| {
                while let Some(i) = cursor.claim() {
                    self.update_block_exterior(
                        blocks[i],
                        tsdf_ref,
                        vertex_ref,
                        mesh_ref,
                        label_layer,
                    );
                }
            });
        }

        if log::log_enabled!(log::Level::Trace) {
            for &index in &blocks {
                if let Some(block) = mesh_layer.block(index) {
                    let vertices = block.lock().expect("mesh block lock poisoned").vertex_count();
                    trace!("  - {vertices:4} vertices @ {index}");
                }
            }
        }

        if clear_flag {
            for &index in &blocks {
                tsdf.clear_updated(index);
            }
        }
    }

    /// All layers must share block/voxel geometry; anything else is a
    /// wiring bug, not a runtime condition.
    fn check_layer_geometry(
        &self,
        tsdf: &TsdfLayer,
        vertex_layer: &VertexLayer,
        mesh_layer: &MeshLayer,
        label_layer: Option<&LabelLayer>,
    ) {
        assert_eq!(
            tsdf.voxels_per_side(),
            vertex_layer.voxels_per_side(),
            "distance and marker layers disagree on voxels per side"
        );
        assert!(
            (tsdf.voxel_size() - vertex_layer.voxel_size()).abs() < 1e-6,
            "distance and marker layers disagree on voxel size"
        );
        assert!(
            (tsdf.block_size() - mesh_layer.block_size()).abs() < 1e-6,
            "distance layer and mesh store disagree on block size"
        );
        if let Some(labels) = label_layer {
            assert_eq!(
                tsdf.voxels_per_side(),
                labels.voxels_per_side(),
                "distance and label layers disagree on voxels per side"
            );
            assert!(
                (tsdf.voxel_size() - labels.voxel_size()).abs() < 1e-6,
                "distance and label layers disagree on voxel size"
            );
        }
    }

    /// Interior pass for one block: every cell whose 8 corners lie
    /// strictly inside the block.
    fn update_block_interior(
        &self,
        block_index: BlockIndex,
        tsdf: &TsdfLayer,
        vertex_layer: &VertexLayer,
        mesh_layer: &MeshLayer,
    ) {
        trace!("extracting interior of block {block_index}");
        let block = tsdf
            .block(block_index)
            .expect("candidate block missing from distance field");
        let mut mesh = mesh_layer
            .block(block_index)
            .expect("mesh block not allocated for candidate")
            .lock()
            .expect("mesh block lock poisoned");
        let mut markers = vertex_layer
            .block(block_index)
            .expect("marker block not allocated for candidate")
            .lock()
            .expect("vertex marker block lock poisoned");

        let n = block.voxels_per_side() as i32;
        let mut next_index = mesh.vertices.len() as u32;
        for x in 0..n - 1 {
            for y in 0..n - 1 {
                for z in 0..n - 1 {
                    self.extract_cell_interior(
                        block,
                        VoxelIndex::new(x, y, z),
                        &mut markers,
                        &mut next_index,
                        &mut mesh,
                    );
                }
            }
        }
    }

    /// Exterior pass for one block: cells on the three maximal faces,
    /// followed by color/label painting for the whole block.
    fn update_block_exterior(
        &self,
        block_index: BlockIndex,
        tsdf: &TsdfLayer,
        vertex_layer: &VertexLayer,
        mesh_layer: &MeshLayer,
        label_layer: Option<&LabelLayer>,
    ) {
        trace!("extracting exterior of block {block_index}");
        let block = tsdf
            .block(block_index)
            .expect("candidate block missing from distance field");
        let mut mesh = mesh_layer
            .block(block_index)
            .expect("mesh block not allocated for candidate")
            .lock()
            .expect("mesh block lock poisoned");
        let mut markers = vertex_layer
            .block(block_index)
            .expect("marker block not allocated for candidate")
            .lock()
            .expect("vertex marker block lock poisoned");

        let n = block.voxels_per_side() as i32;
        let mut next_index = mesh.vertices.len() as u32;

        // Max-X face; also takes the (x_max, y_max, z) and
        // (x_max, y, z_max) edges.
        for z in 0..n {
            for y in 0..n {
                self.extract_cell_exterior(
                    tsdf,
                    block,
                    VoxelIndex::new(n - 1, y, z),
                    &mut markers,
                    &mut next_index,
                    &mut mesh,
                );
            }
        }

        // Max-Y face; takes the (x, y_max, z_max) edge but skips x = max,
        // already covered above.
        for z in 0..n {
            for x in 0..n - 1 {
                self.extract_cell_exterior(
                    tsdf,
                    block,
                    VoxelIndex::new(x, n - 1, z),
                    &mut markers,
                    &mut next_index,
                    &mut mesh,
                );
            }
        }

        // Max-Z face; skips both edges already covered.
        for y in 0..n - 1 {
            for x in 0..n - 1 {
                self.extract_cell_exterior(
                    tsdf,
                    block,
                    VoxelIndex::new(x, y, n - 1),
                    &mut markers,
                    &mut next_index,
                    &mut mesh,
                );
            }
        }

        self.paint_block(tsdf, block, label_layer, &mut mesh);
        mesh.updated = true;
    }

    /// Gather corner samples for a fully interior cell and run the cube
    /// sampler. Returns without touching the mesh when any corner lacks
    /// valid data.
    fn extract_cell_interior(
        &self,
        block: &VoxelBlock<TsdfVoxel>,
        index: VoxelIndex,
        markers: &mut VoxelBlock<VertexVoxel>,
        next_index: &mut u32,
        mesh: &mut MeshBlock,
    ) {
        let mut sdf = [0.0f32; 8];
        let mut coords = [Vec3::ZERO; 8];
        let mut marker_indices = [None; 8];
        for (i, offset) in CUBE_CORNER_OFFSETS.iter().enumerate() {
            let corner = index + *offset;
            let Some(distance) = sdf_if_valid(block.voxel(corner), self.config.min_weight) else {
                return;
            };
            sdf[i] = distance;
            coords[i] = block.voxel_coordinates(corner);
            marker_indices[i] = Some(corner);
        }
        mesh_cube(&coords, &sdf, &marker_indices, markers, next_index, mesh);
    }

    /// Gather corner samples for a boundary cell, reaching into
    /// neighboring blocks where a corner falls outside this one, and run
    /// the cube sampler.
    ///
    /// Skips the whole cell when a needed neighbor does not exist (the
    /// expected case for not-yet-observed space) or when any corner
    /// lacks valid data. Neighbor voxels contribute distance only; their
    /// markers are never written. Corner positions stay in this block's
    /// coordinate frame.
    fn extract_cell_exterior(
        &self,
        tsdf: &TsdfLayer,
        block: &VoxelBlock<TsdfVoxel>,
        index: VoxelIndex,
        markers: &mut VoxelBlock<VertexVoxel>,
        next_index: &mut u32,
        mesh: &mut MeshBlock,
    ) {
        let n = block.voxels_per_side() as i32;
        let mut sdf = [0.0f32; 8];
        let mut coords = [Vec3::ZERO; 8];
        let mut marker_indices = [None; 8];
        for (i, offset) in CUBE_CORNER_OFFSETS.iter().enumerate() {
            let corner = index + *offset;
            let voxel = if block.is_valid_voxel_index(corner) {
                marker_indices[i] = Some(corner);
                block.voxel(corner)
            } else {
                let (neighbor_index, wrapped) =
                    neighbor_block_index(block.block_index(), corner, n);
                let Some(neighbor) = tsdf.block(neighbor_index) else {
                    return;
                };
                assert!(
                    neighbor.is_valid_voxel_index(wrapped),
                    "corner {corner} wrapped to invalid index {wrapped} in neighbor {neighbor_index}"
                );
                neighbor.voxel(wrapped)
            };
            let Some(distance) = sdf_if_valid(voxel, self.config.min_weight) else {
                return;
            };
            sdf[i] = distance;
            coords[i] = block.voxel_coordinates(corner);
        }
        mesh_cube(&coords, &sdf, &marker_indices, markers, next_index, mesh);
    }

    /// Paint per-vertex colors and labels by nearest-voxel lookup.
    ///
    /// Each vertex position is converted back to a voxel index in its
    /// own block; boundary vertices that land outside fall back to a
    /// coordinate lookup against whichever block actually contains the
    /// position. Vertices on under-weight voxels keep the default color.
    fn paint_block(
        &self,
        tsdf: &TsdfLayer,
        block: &VoxelBlock<TsdfVoxel>,
        label_layer: Option<&LabelLayer>,
        mesh: &mut MeshBlock,
    ) {
        mesh.colors.clear();
        mesh.colors.resize(mesh.vertices.len(), Color::default());
        mesh.labels.clear();
        if label_layer.is_some() {
            mesh.labels.resize(mesh.vertices.len(), 0);
        }

        let block_index = block.block_index();
        let MeshBlock {
            ref vertices,
            ref mut colors,
            ref mut labels,
            ..
        } = *mesh;
        for (i, vertex) in vertices.iter().enumerate() {
            let voxel_index = block.voxel_index_from_coordinates(*vertex);
            let (voxel, label) = if block.is_valid_voxel_index(voxel_index) {
                let label = label_layer
                    .and_then(|layer| layer.block(block_index))
                    .map(|labels| labels.voxel(voxel_index).label);
                (block.voxel(voxel_index), label)
            } else {
                let voxel = tsdf
                    .voxel_by_coordinates(*vertex)
                    .expect("mesh vertex lies in an unallocated block");
                let label = label_layer
                    .and_then(|layer| layer.voxel_by_coordinates(*vertex))
                    .map(|voxel| voxel.label);
                (voxel, label)
            };

            if let Some(distance) = sdf_if_valid(voxel, self.config.min_weight) {
                colors[i] = (self.color_map)(distance, self.config.truncation_distance);
            }
            if let (Some(label), false) = (label, labels.is_empty()) {
                labels[i] = label;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn claim_all(threads: usize, items: usize) -> Vec<usize> {
        let cursor = WorkCursor::new(items);
        let mut claimed = Vec::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        let mut mine = Vec::new();
                        while let Some(i) = cursor.claim() {
                            mine.push(i);
                        }
                        mine
                    })
                })
                .collect();
            for handle in handles {
                claimed.extend(handle.join().unwrap());
            }
        });
        claimed
    }

    #[test]
    fn cursor_hands_out_each_index_once_with_more_threads_than_work() {
        let claimed = claim_all(8, 5);
        let unique: HashSet<_> = claimed.iter().copied().collect();
        assert_eq!(claimed.len(), 5);
        assert_eq!(unique, (0..5).collect());
    }

    #[test]
    fn cursor_hands_out_each_index_once_with_fewer_threads_than_work() {
        let claimed = claim_all(2, 23);
        let unique: HashSet<_> = claimed.iter().copied().collect();
        assert_eq!(claimed.len(), 23);
        assert_eq!(unique, (0..23).collect());
    }

    #[test]
    fn cursor_over_empty_list_is_exhausted() {
        let cursor = WorkCursor::new(0);
        assert_eq!(cursor.claim(), None);
        assert_eq!(cursor.claim(), None);
    }

    #[test]
    fn rejects_zero_threads() {
        let config = MeshIntegratorConfig {
            integrator_threads: 0,
            ..Default::default()
        };
        assert!(matches!(
            MeshIntegrator::new(config),
            Err(MesherError::NoWorkerThreads)
        ));
    }

    #[test]
    fn rejects_nonpositive_truncation() {
        let config = MeshIntegratorConfig {
            truncation_distance: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            MeshIntegrator::new(config),
            Err(MesherError::InvalidTruncationDistance(_))
        ));
    }
}
