//! Marching cubes cube sampler.
//!
//! Pure geometric kernel: given the 8 corner positions and distance
//! samples of one voxel cell, classify the sign configuration and emit
//! 0-5 triangles with interpolated zero-crossing vertices. Output is
//! fully deterministic for deterministic input; there is no randomness
//! and no iteration over unordered containers.
//!
//! Callers are responsible for validating corner data first: a cell with
//! any under-weight corner must be skipped before this kernel runs.

use glam::Vec3;

use super::tables::{EDGE_ENDPOINTS, EDGE_TABLE, TRI_TABLE};
use super::MeshBlock;
use crate::layer::{VertexVoxel, VoxelBlock};
use crate::types::VoxelIndex;

/// Sign configuration of a cell: bit `i` is set when corner `i` lies
/// inside the surface (negative distance).
#[inline]
pub fn cube_configuration(sdf: &[f32; 8]) -> usize {
    let mut config = 0usize;
    for (corner, &distance) in sdf.iter().enumerate() {
        if distance < 0.0 {
            config |= 1 << corner;
        }
    }
    config
}

/// Zero-crossing position along one edge.
///
/// Standard marching cubes interpolation `t = d0 / (d0 - d1)`, clamped
/// so degenerate or duplicate-distance edges still yield a point on the
/// segment.
#[inline]
fn interpolate_edge(p0: Vec3, p1: Vec3, d0: f32, d1: f32) -> (Vec3, f32) {
    let t = (d0 / (d0 - d1)).clamp(0.0, 1.0);
    (p0 + (p1 - p0) * t, t)
}

/// Run marching cubes on one voxel cell and append the result to a mesh
/// block.
///
/// For every emitted vertex the marker voxel of the nearer edge corner
/// is flagged as carrying a vertex, provided a marker index is present
/// for that corner. Corners sampled from neighboring blocks pass `None`:
/// cross-block marker writes are intentionally unsupported, since a
/// remote block's markers cannot be kept in sync with local remeshing
/// order.
///
/// # Arguments
/// * `coords` - World-space corner positions, table corner order
/// * `sdf` - Corner distance samples, already validated by the caller
/// * `marker_indices` - Local marker voxel index per corner, `None` for
///   corners owned by a neighboring block
/// * `marker_block` - This block's vertex marker voxels
/// * `next_index` - Running vertex counter for the block's mesh
/// * `mesh` - Mesh block receiving vertices and triangle indices
pub fn mesh_cube(
    coords: &[Vec3; 8],
    sdf: &[f32; 8],
    marker_indices: &[Option<VoxelIndex>; 8],
    marker_block: &mut VoxelBlock<VertexVoxel>,
    next_index: &mut u32,
    mesh: &mut MeshBlock,
) {
    let config = cube_configuration(sdf);
    let crossed = EDGE_TABLE[config];
    if crossed == 0 {
        return;
    }

    let mut edge_points = [Vec3::ZERO; 12];
    let mut edge_nearest = [0usize; 12];
    for edge in 0..12 {
        if crossed & (1 << edge) == 0 {
            continue;
        }
        let [c0, c1] = EDGE_ENDPOINTS[edge];
        let (point, t) = interpolate_edge(coords[c0], coords[c1], sdf[c0], sdf[c1]);
        edge_points[edge] = point;
        edge_nearest[edge] = if t <= 0.5 { c0 } else { c1 };
    }

    let triangulation = &TRI_TABLE[config];
    let mut cursor = 0;
    while triangulation[cursor] != -1 {
        for step in 0..3 {
            let edge = triangulation[cursor + step] as usize;
            mesh.vertices.push(edge_points[edge]);
            mesh.indices.push(*next_index);
            *next_index += 1;

            if let Some(marker_index) = marker_indices[edge_nearest[edge]] {
                marker_block.voxel_mut(marker_index).on_surface = true;
            }
        }
        cursor += 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockIndex;
    use glam::IVec3;

    fn unit_cell() -> [Vec3; 8] {
        let mut coords = [Vec3::ZERO; 8];
        for (i, offset) in super::super::tables::CUBE_CORNER_OFFSETS.iter().enumerate() {
            coords[i] = offset.as_vec3();
        }
        coords
    }

    fn marker_indices() -> [Option<VoxelIndex>; 8] {
        let mut indices = [None; 8];
        for (i, offset) in super::super::tables::CUBE_CORNER_OFFSETS.iter().enumerate() {
            indices[i] = Some(*offset);
        }
        indices
    }

    #[test]
    fn uniform_sign_emits_nothing() {
        let mut mesh = MeshBlock::default();
        let mut markers = VoxelBlock::<VertexVoxel>::new(BlockIndex::ZERO, 2, 1.0);
        let mut next = 0;

        mesh_cube(
            &unit_cell(),
            &[-1.0; 8],
            &marker_indices(),
            &mut markers,
            &mut next,
            &mut mesh,
        );
        mesh_cube(
            &unit_cell(),
            &[1.0; 8],
            &marker_indices(),
            &mut markers,
            &mut next,
            &mut mesh,
        );

        assert!(mesh.vertices.is_empty());
        assert!(mesh.indices.is_empty());
        assert_eq!(next, 0);
    }

    #[test]
    fn single_inside_corner_emits_one_triangle() {
        let mut sdf = [1.0f32; 8];
        sdf[0] = -1.0;

        let mut mesh = MeshBlock::default();
        let mut markers = VoxelBlock::<VertexVoxel>::new(BlockIndex::ZERO, 2, 1.0);
        let mut next = 0;
        mesh_cube(
            &unit_cell(),
            &sdf,
            &marker_indices(),
            &mut markers,
            &mut next,
            &mut mesh,
        );

        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(next, 3);

        // Crossings sit at the midpoints of the three edges leaving corner 0.
        for vertex in &mesh.vertices {
            assert!(
                (vertex.length() - 0.5).abs() < 1e-6,
                "vertex {vertex} not at an edge midpoint"
            );
        }

        // The inside corner is the nearer one for every crossing.
        assert!(markers.voxel(IVec3::ZERO).on_surface);
    }

    #[test]
    fn sign_change_marks_at_least_one_corner() {
        let sdf = [-0.2, 0.3, 0.3, -0.2, -0.2, 0.3, 0.3, -0.2];
        let mut mesh = MeshBlock::default();
        let mut markers = VoxelBlock::<VertexVoxel>::new(BlockIndex::ZERO, 2, 1.0);
        let mut next = 0;
        mesh_cube(
            &unit_cell(),
            &sdf,
            &marker_indices(),
            &mut markers,
            &mut next,
            &mut mesh,
        );

        assert!(!mesh.vertices.is_empty());
        assert_eq!(mesh.indices.len() % 3, 0);
        let marked = (0..markers.num_voxels())
            .filter(|&i| markers.voxel_by_linear(i).on_surface)
            .count();
        assert!(marked >= 1);
    }

    #[test]
    fn absent_markers_are_never_written() {
        let mut sdf = [1.0f32; 8];
        sdf[6] = -1.0;

        let mut mesh = MeshBlock::default();
        let mut markers = VoxelBlock::<VertexVoxel>::new(BlockIndex::ZERO, 2, 1.0);
        let mut next = 0;
        mesh_cube(
            &unit_cell(),
            &sdf,
            &[None; 8],
            &mut markers,
            &mut next,
            &mut mesh,
        );

        assert!(!mesh.vertices.is_empty());
        let marked = (0..markers.num_voxels())
            .filter(|&i| markers.voxel_by_linear(i).on_surface)
            .count();
        assert_eq!(marked, 0);
    }

    #[test]
    fn output_is_deterministic() {
        let sdf = [-0.4, 0.1, 0.2, -0.3, 0.5, -0.1, 0.2, 0.3];
        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut mesh = MeshBlock::default();
            let mut markers = VoxelBlock::<VertexVoxel>::new(BlockIndex::ZERO, 2, 1.0);
            let mut next = 7;
            mesh_cube(
                &unit_cell(),
                &sdf,
                &marker_indices(),
                &mut markers,
                &mut next,
                &mut mesh,
            );
            runs.push((mesh.vertices.clone(), mesh.indices.clone(), next));
        }
        assert_eq!(runs[0], runs[1]);
    }
}
