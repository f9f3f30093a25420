//! Error types for layer construction and integrator setup.
//!
//! Runtime meshing never fails: cells with missing data are silently
//! skipped, and contract violations (inconsistent block registries,
//! mismatched layer geometry) are asserted. Everything recoverable is
//! caught at construction time and surfaces through [`MesherError`].

use thiserror::Error;

/// Errors raised while constructing layers or the mesh integrator.
#[derive(Error, Debug)]
pub enum MesherError {
    /// Voxel edge length must be a positive, finite number.
    #[error("voxel size must be positive, got {0}")]
    InvalidVoxelSize(f32),

    /// Blocks need at least 2 voxels per side so a block contains
    /// at least one fully interior cell.
    #[error("voxels per side must be at least 2, got {0}")]
    InvalidVoxelsPerSide(usize),

    /// The integrator needs at least one worker thread.
    #[error("integrator thread count must be nonzero")]
    NoWorkerThreads,

    /// Truncation distance drives the distance-to-color normalization
    /// and must be positive.
    #[error("truncation distance must be positive, got {0}")]
    InvalidTruncationDistance(f32),

    /// The worker thread pool could not be created.
    #[error("failed to build worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
