//! Chunk coordinates, partitioning, grid sources and per-chunk build requests.
#![forbid(unsafe_code)]

pub mod coord;
pub mod grid;
pub mod request;

pub use coord::{
    ChunkKey, ChunkSideLength, InvalidSideLength, MAX_CHUNK_SIDE, MIN_CHUNK_SIDE, chunk_key_of,
    local_of, partition,
};
pub use grid::{BlockGrid, BlockGridSource, gather_chunk};
pub use request::{ChunkMeshRequest, RenderBounds};
