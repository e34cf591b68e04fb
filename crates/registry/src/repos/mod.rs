//! Repository traits for registry operations.

pub mod artifacts;
pub mod computations;

pub use artifacts::ArtifactRepo;
pub use computations::ComputationRepo;
