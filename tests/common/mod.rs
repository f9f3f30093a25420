//! Shared fixtures for mesh extraction integration tests.

#![allow(dead_code)]

use tsdf_mesher::prelude::*;

// ============================================================================
// Layer construction
// ============================================================================

pub const VOXEL_SIZE: f32 = 0.05;
pub const VOXELS_PER_SIDE: usize = 8;

/// Distance field plus matching marker and mesh layers. Also wires the
/// log facade to the test harness so `RUST_LOG` works in tests.
pub fn make_layers() -> (TsdfLayer, VertexLayer, MeshLayer) {
    let _ = env_logger::builder().is_test(true).try_init();
    let tsdf = TsdfLayer::new(VOXEL_SIZE, VOXELS_PER_SIDE).unwrap();
    let vertex_layer = VertexLayer::new(VOXEL_SIZE, VOXELS_PER_SIDE).unwrap();
    let mesh_layer = MeshLayer::new(tsdf.block_size());
    (tsdf, vertex_layer, mesh_layer)
}

pub fn default_integrator() -> MeshIntegrator {
    MeshIntegrator::new(MeshIntegratorConfig::default()).unwrap()
}

pub fn integrator_with_threads(threads: usize) -> MeshIntegrator {
    MeshIntegrator::new(MeshIntegratorConfig {
        integrator_threads: threads,
        ..Default::default()
    })
    .unwrap()
}

// ============================================================================
// Analytic distance fields
// ============================================================================

/// Exact sphere distance, negative inside.
pub fn sphere_sdf(center: Vec3, radius: f32) -> impl Fn(Vec3) -> f32 {
    move |point| (point - center).length() - radius
}

/// Horizontal plane, negative below `height`.
pub fn plane_sdf(height: f32) -> impl Fn(Vec3) -> f32 {
    move |point| point.y - height
}

/// Fill one block from an analytic field with full weight and flag it
/// for remeshing.
pub fn fill_block(tsdf: &mut TsdfLayer, index: BlockIndex, field: &dyn Fn(Vec3) -> f32) {
    let block = tsdf.allocate_block(index);
    for linear in 0..block.num_voxels() {
        let voxel_index = block.voxel_index_from_linear(linear);
        let position = block.voxel_coordinates(voxel_index);
        let voxel = block.voxel_by_linear_mut(linear);
        voxel.distance = field(position);
        voxel.weight = 1.0;
    }
    tsdf.mark_updated(index);
}

/// Fill the cube of blocks with indices in `[lo, hi]` on every axis.
pub fn fill_blocks(tsdf: &mut TsdfLayer, lo: i32, hi: i32, field: &dyn Fn(Vec3) -> f32) {
    for x in lo..=hi {
        for y in lo..=hi {
            for z in lo..=hi {
                fill_block(tsdf, BlockIndex::new(x, y, z), field);
            }
        }
    }
}

/// Label layer covering every allocated distance block with one constant
/// label.
pub fn constant_labels(tsdf: &TsdfLayer, label: u32) -> LabelLayer {
    let mut labels = LabelLayer::new(tsdf.voxel_size(), tsdf.voxels_per_side()).unwrap();
    for index in tsdf.allocated_blocks() {
        let block = labels.allocate_block(index);
        for linear in 0..block.num_voxels() {
            block.voxel_by_linear_mut(linear).label = label;
        }
    }
    labels
}

// ============================================================================
// Mesh inspection
// ============================================================================

/// Bitwise-comparable copy of every mesh block, in sorted block order.
pub fn mesh_snapshot(mesh_layer: &MeshLayer) -> Vec<(BlockIndex, MeshBlock)> {
    mesh_layer
        .allocated_blocks()
        .into_iter()
        .map(|index| {
            let block = mesh_layer.block(index).unwrap().lock().unwrap();
            (index, block.clone())
        })
        .collect()
}

/// Triangle centroids across all blocks, quantized so exact duplicates
/// collide.
pub fn quantized_triangle_centroids(mesh_layer: &MeshLayer) -> Vec<(i64, i64, i64)> {
    let mut centroids = Vec::new();
    for index in mesh_layer.allocated_blocks() {
        let block = mesh_layer.block(index).unwrap().lock().unwrap();
        for triangle in block.indices.chunks_exact(3) {
            let centroid = (block.vertices[triangle[0] as usize]
                + block.vertices[triangle[1] as usize]
                + block.vertices[triangle[2] as usize])
                / 3.0;
            centroids.push((
                (centroid.x as f64 * 1e5).round() as i64,
                (centroid.y as f64 * 1e5).round() as i64,
                (centroid.z as f64 * 1e5).round() as i64,
            ));
        }
    }
    centroids
}
