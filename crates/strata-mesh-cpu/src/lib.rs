//! CPU chunk mesh assembly: palette cache, face culling and per-category buffers.
#![forbid(unsafe_code)]

pub mod assemble;
pub mod batch;
pub mod constants;
pub mod cull;
pub mod error;
pub mod geometry;
pub mod mesh_build;
pub mod palette;

pub use assemble::{ChunkMeshes, assemble};
pub use batch::BatchAccumulator;
pub use cull::{NeighborLookup, PaletteLookup, VoxelMap, culls, visible_faces};
pub use error::MeshError;
pub use geometry::{ChunkGeometryData, NormalBuffer, PositionBuffer};
pub use mesh_build::{IndexBuffer, MaterialGroup, MeshBuilder, MeshData};
pub use palette::{PaletteBlockData, PaletteCache, PaletteMaterialGroup};
