//! Integration tests: block boundary stitching.
//!
//! Verifies that cells on block faces are meshed exactly once, that
//! surfaces crossing block boundaries come out seamless, and that
//! unobserved neighbors are skipped without error.

mod common;

use std::collections::HashSet;

use common::*;
use tsdf_mesher::prelude::*;

// ============================================================================
// Seams
// ============================================================================

#[test]
fn plane_through_a_block_face_is_meshed_by_the_lower_block() {
    let (mut tsdf, mut vertex_layer, mut mesh_layer) = make_layers();
    // Block edge is 0.4; a plane at y = 0.37 crosses only inside the
    // lower block's max-Y boundary cells, whose upper corners live in
    // the neighbor above.
    let field = plane_sdf(0.37);
    fill_block(&mut tsdf, BlockIndex::ZERO, &field);
    fill_block(&mut tsdf, BlockIndex::new(0, 1, 0), &field);

    let integrator = default_integrator();
    integrator.generate_mesh(
        &mut tsdf,
        &mut vertex_layer,
        &mut mesh_layer,
        None,
        false,
        false,
    );

    let lower = mesh_layer
        .block(BlockIndex::ZERO)
        .unwrap()
        .lock()
        .unwrap()
        .vertex_count();
    let upper = mesh_layer
        .block(BlockIndex::new(0, 1, 0))
        .unwrap()
        .lock()
        .unwrap()
        .vertex_count();
    assert!(lower > 0, "boundary cells of the lower block must mesh");
    assert_eq!(upper, 0, "the plane never crosses the upper block's cells");

    for (index, block) in mesh_snapshot(&mesh_layer) {
        for vertex in &block.vertices {
            assert!(
                (vertex.y - 0.37).abs() < 1e-4,
                "vertex {vertex} of block {index} is off the plane"
            );
        }
    }
}

#[test]
fn boundary_cells_are_never_meshed_twice() {
    let (mut tsdf, mut vertex_layer, mut mesh_layer) = make_layers();
    // Sphere centered on the shared corner of 8 blocks, so the surface
    // crosses every block face between them.
    fill_blocks(&mut tsdf, -1, 0, &sphere_sdf(Vec3::ZERO, 0.3));

    let integrator = default_integrator();
    integrator.generate_mesh(
        &mut tsdf,
        &mut vertex_layer,
        &mut mesh_layer,
        None,
        false,
        false,
    );

    let centroids = quantized_triangle_centroids(&mesh_layer);
    let unique: HashSet<_> = centroids.iter().copied().collect();
    assert_eq!(
        unique.len(),
        centroids.len(),
        "duplicate triangles indicate a boundary cell meshed by two blocks"
    );
    assert_eq!(centroids.len(), mesh_layer.triangle_count());
}

#[test]
fn seam_geometry_is_continuous_across_blocks() {
    let (mut tsdf, mut vertex_layer, mut mesh_layer) = make_layers();
    fill_blocks(&mut tsdf, -1, 0, &sphere_sdf(Vec3::ZERO, 0.3));

    let integrator = default_integrator();
    integrator.generate_mesh(
        &mut tsdf,
        &mut vertex_layer,
        &mut mesh_layer,
        None,
        false,
        false,
    );

    // Every block the sphere touches contributes geometry, and all of it
    // sits on the same analytic surface regardless of which block's
    // frame the cell was sampled in.
    for (index, block) in mesh_snapshot(&mesh_layer) {
        assert!(!block.is_empty(), "block {index} contributed no geometry");
        for vertex in &block.vertices {
            assert!(
                (vertex.length() - 0.3).abs() < 0.01,
                "seam vertex {vertex} of block {index} is off the surface"
            );
        }
    }
}

// ============================================================================
// Missing neighbors
// ============================================================================

#[test]
fn missing_neighbor_skips_boundary_cells_without_error() {
    let (mut tsdf, mut vertex_layer, mut mesh_layer) = make_layers();
    // The surface lives entirely in the lower block's boundary cells,
    // but the neighbor holding their upper corners was never observed.
    fill_block(&mut tsdf, BlockIndex::ZERO, &plane_sdf(0.37));

    let integrator = default_integrator();
    integrator.generate_mesh(
        &mut tsdf,
        &mut vertex_layer,
        &mut mesh_layer,
        None,
        false,
        false,
    );

    assert!(mesh_layer.has_block(BlockIndex::ZERO));
    assert_eq!(mesh_layer.vertex_count(), 0);
}

#[test]
fn markers_are_only_written_into_the_owning_block() {
    let (mut tsdf, mut vertex_layer, mut mesh_layer) = make_layers();
    let field = plane_sdf(0.37);
    fill_block(&mut tsdf, BlockIndex::ZERO, &field);
    fill_block(&mut tsdf, BlockIndex::new(0, 1, 0), &field);

    let integrator = default_integrator();
    integrator.generate_mesh(
        &mut tsdf,
        &mut vertex_layer,
        &mut mesh_layer,
        None,
        false,
        false,
    );

    // All crossings sit within a voxel of y = 0.37, so the neighbor's
    // markers (y >= 0.4) stay clean even though its voxels were sampled.
    assert!(vertex_layer.surface_voxel_count(BlockIndex::ZERO) > 0);
    assert_eq!(vertex_layer.surface_voxel_count(BlockIndex::new(0, 1, 0)), 0);
}
