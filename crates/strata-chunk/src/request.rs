use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_blocks::{BakedBlockDef, BlockData};

use crate::coord::{ChunkKey, ChunkSideLength};

/// Integer clip box in absolute block coordinates, `min` inclusive, `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderBounds {
    pub min: [i32; 3],
    pub max: [i32; 3],
}

impl RenderBounds {
    pub fn new(min: [i32; 3], max: [i32; 3]) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= self.min[0]
            && x < self.max[0]
            && y >= self.min[1]
            && y < self.max[1]
            && z >= self.min[2]
            && z < self.max[2]
    }
}

/// Everything a worker needs to mesh one chunk without touching the grid.
#[derive(Clone, Debug)]
pub struct ChunkMeshRequest {
    pub key: ChunkKey,
    pub schematic_id: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub side: ChunkSideLength,
    pub blocks: Vec<BlockData>,
    /// Occupied cells just outside the chunk that touch one of its blocks.
    pub halo: Vec<BlockData>,
    pub rendering_bounds: Option<RenderBounds>,
    pub defs: Vec<(String, Arc<BakedBlockDef>)>,
    pub palette_epoch: u64,
}

impl ChunkMeshRequest {
    /// A request spanning the full chunk cube with no halo and no defs attached yet.
    pub fn new(key: ChunkKey, side: ChunkSideLength, blocks: Vec<BlockData>) -> Self {
        let s = side.get();
        Self {
            key,
            schematic_id: String::new(),
            width: s,
            height: s,
            depth: s,
            side,
            blocks,
            halo: Vec::new(),
            rendering_bounds: None,
            defs: Vec::new(),
            palette_epoch: 0,
        }
    }

    #[inline]
    pub fn origin(&self) -> [i32; 3] {
        self.key.origin(self.side)
    }

    /// True when the absolute cell lies inside `origin .. origin + (width,height,depth)`.
    pub fn in_extent(&self, x: i32, y: i32, z: i32) -> bool {
        let [ox, oy, oz] = self.origin();
        let (lx, ly, lz) = (x - ox, y - oy, z - oz);
        lx >= 0
            && ly >= 0
            && lz >= 0
            && (lx as u32) < self.width
            && (ly as u32) < self.height
            && (lz as u32) < self.depth
    }

    #[inline]
    pub fn renders(&self, x: i32, y: i32, z: i32) -> bool {
        self.rendering_bounds
            .is_none_or(|b| b.contains(x, y, z))
    }

    pub fn def(&self, state_key: &str) -> Option<&Arc<BakedBlockDef>> {
        self.defs
            .iter()
            .find(|(k, _)| k == state_key)
            .map(|(_, d)| d)
    }
}
