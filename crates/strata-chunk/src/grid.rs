use std::collections::{HashMap, HashSet};

use strata_blocks::{BlockData, Face};

use crate::coord::{ChunkKey, ChunkSideLength, chunk_key_of};
use crate::request::ChunkMeshRequest;

/// Read access to a sparse block grid.
pub trait BlockGridSource {
    fn blocks_in_chunk(&self, key: ChunkKey, side: ChunkSideLength) -> Vec<BlockData>;
    fn block_at(&self, x: i32, y: i32, z: i32) -> Option<BlockData>;
    fn for_each_block(&self, f: &mut dyn FnMut(&BlockData));

    fn schematic_id(&self) -> &str {
        ""
    }

    /// Occupied extent as `(min inclusive, max exclusive)`; `None` means unbounded.
    fn extent(&self) -> Option<([i32; 3], [i32; 3])> {
        None
    }
}

/// In-memory grid keyed by absolute position.
#[derive(Clone, Debug, Default)]
pub struct BlockGrid {
    pub schematic_id: String,
    cells: HashMap<(i32, i32, i32), BlockData>,
    /// Occupied extent, kept current by `set` and `remove`.
    bounds: Option<([i32; 3], [i32; 3])>,
}

impl BlockGrid {
    pub fn new(schematic_id: impl Into<String>) -> Self {
        Self {
            schematic_id: schematic_id.into(),
            cells: HashMap::new(),
            bounds: None,
        }
    }

    pub fn from_blocks(schematic_id: impl Into<String>, blocks: impl IntoIterator<Item = BlockData>) -> Self {
        let mut grid = Self::new(schematic_id);
        for b in blocks {
            grid.set(b);
        }
        grid
    }

    /// Places `block` at its own position, returning whatever was there.
    pub fn set(&mut self, block: BlockData) -> Option<BlockData> {
        let (x, y, z) = block.pos();
        self.bounds = Some(match self.bounds {
            None => ([x, y, z], [x + 1, y + 1, z + 1]),
            Some((mut lo, mut hi)) => {
                for (a, v) in [x, y, z].into_iter().enumerate() {
                    lo[a] = lo[a].min(v);
                    hi[a] = hi[a].max(v + 1);
                }
                (lo, hi)
            }
        });
        self.cells.insert((x, y, z), block)
    }

    /// Removing a cell on the boundary rescans the grid for the new extent.
    pub fn remove(&mut self, x: i32, y: i32, z: i32) -> Option<BlockData> {
        let old = self.cells.remove(&(x, y, z))?;
        if let Some((lo, hi)) = self.bounds {
            let p = [x, y, z];
            if (0..3).any(|a| p[a] == lo[a] || p[a] + 1 == hi[a]) {
                self.bounds = self.scan_bounds();
            }
        }
        Some(old)
    }

    fn scan_bounds(&self) -> Option<([i32; 3], [i32; 3])> {
        let mut it = self.cells.keys();
        let &(x, y, z) = it.next()?;
        let mut lo = [x, y, z];
        let mut hi = [x + 1, y + 1, z + 1];
        for &(x, y, z) in it {
            for (a, v) in [x, y, z].into_iter().enumerate() {
                lo[a] = lo[a].min(v);
                hi[a] = hi[a].max(v + 1);
            }
        }
        Some((lo, hi))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Every chunk holding at least one block.
    pub fn chunk_keys(&self, side: ChunkSideLength) -> HashSet<ChunkKey> {
        self.cells
            .keys()
            .map(|&(x, y, z)| chunk_key_of(x, y, z, side))
            .collect()
    }
}

impl BlockGridSource for BlockGrid {
    fn blocks_in_chunk(&self, key: ChunkKey, side: ChunkSideLength) -> Vec<BlockData> {
        let s = side.get() as i32;
        let volume = (s as usize).pow(3);
        let mut out = Vec::new();
        if volume < self.cells.len() {
            let [ox, oy, oz] = key.origin(side);
            for y in oy..oy + s {
                for z in oz..oz + s {
                    for x in ox..ox + s {
                        if let Some(b) = self.cells.get(&(x, y, z)) {
                            out.push(b.clone());
                        }
                    }
                }
            }
        } else {
            out.extend(
                self.cells
                    .values()
                    .filter(|b| chunk_key_of(b.x, b.y, b.z, side) == key)
                    .cloned(),
            );
        }
        out
    }

    fn block_at(&self, x: i32, y: i32, z: i32) -> Option<BlockData> {
        self.cells.get(&(x, y, z)).cloned()
    }

    fn for_each_block(&self, f: &mut dyn FnMut(&BlockData)) {
        for b in self.cells.values() {
            f(b);
        }
    }

    fn schematic_id(&self) -> &str {
        &self.schematic_id
    }

    fn extent(&self) -> Option<([i32; 3], [i32; 3])> {
        self.bounds
    }
}

/// Collects a chunk's blocks plus the face-adjacent halo just outside it.
///
/// The extent is clipped to the grid's occupied extent when the source reports one.
/// Defs are left empty for the caller to fill from its palette.
pub fn gather_chunk<G: BlockGridSource + ?Sized>(
    grid: &G,
    key: ChunkKey,
    side: ChunkSideLength,
) -> ChunkMeshRequest {
    let blocks = grid.blocks_in_chunk(key, side);
    let mut req = ChunkMeshRequest::new(key, side, Vec::new());
    req.schematic_id = grid.schematic_id().to_string();
    let origin = req.origin();
    let s = side.get() as i32;
    if let Some((_, hi)) = grid.extent() {
        let clip = |a: usize| (hi[a] - origin[a]).clamp(1, s) as u32;
        req.width = clip(0);
        req.height = clip(1);
        req.depth = clip(2);
    }

    let mut seen: HashSet<(i32, i32, i32)> = HashSet::new();
    for b in &blocks {
        for face in Face::ALL {
            let (dx, dy, dz) = face.delta();
            let (nx, ny, nz) = (b.x + dx, b.y + dy, b.z + dz);
            if chunk_key_of(nx, ny, nz, side) == key || !seen.insert((nx, ny, nz)) {
                continue;
            }
            if let Some(n) = grid.block_at(nx, ny, nz) {
                req.halo.push(n);
            }
        }
    }
    req.blocks = blocks;
    req
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stone(x: i32, y: i32, z: i32) -> BlockData {
        BlockData::new("stone", x, y, z, None)
    }

    #[test]
    fn halo_holds_only_face_neighbors_outside_chunk() {
        let side = ChunkSideLength::new(4).unwrap();
        let grid = BlockGrid::from_blocks(
            "demo",
            [
                stone(3, 0, 0),
                stone(4, 0, 0),  // face neighbor across +x
                stone(4, 1, 0),  // diagonal, not a halo cell
                stone(2, 0, 0),  // same chunk
                stone(-1, 0, 0), // not adjacent to any chunk block
            ],
        );
        let req = gather_chunk(&grid, ChunkKey::new(0, 0, 0), side);
        assert_eq!(req.blocks.len(), 2);
        assert_eq!(req.halo.len(), 1);
        assert_eq!(req.halo[0].pos(), (4, 0, 0));
        assert_eq!(req.schematic_id, "demo");
    }

    #[test]
    fn extent_clips_request() {
        let side = ChunkSideLength::new(16).unwrap();
        let grid = BlockGrid::from_blocks("g", [stone(0, 0, 0), stone(4, 2, 9)]);
        assert_eq!(grid.extent(), Some(([0, 0, 0], [5, 3, 10])));
        let req = gather_chunk(&grid, ChunkKey::new(0, 0, 0), side);
        assert_eq!((req.width, req.height, req.depth), (5, 3, 10));
    }

    #[test]
    fn extent_tracks_edits() {
        let mut grid = BlockGrid::from_blocks("g", [stone(0, 0, 0), stone(2, 1, 1), stone(5, 3, 2)]);
        assert_eq!(grid.extent(), Some(([0, 0, 0], [6, 4, 3])));
        // interior cell: extent unchanged
        grid.set(stone(1, 1, 1));
        grid.remove(1, 1, 1);
        assert_eq!(grid.extent(), Some(([0, 0, 0], [6, 4, 3])));
        grid.remove(5, 3, 2);
        assert_eq!(grid.extent(), grid.scan_bounds());
        assert_eq!(grid.extent(), Some(([0, 0, 0], [3, 2, 2])));
        grid.set(stone(-4, 0, 0));
        assert_eq!(grid.extent(), Some(([-4, 0, 0], [3, 2, 2])));
        grid.remove(-4, 0, 0);
        grid.remove(0, 0, 0);
        grid.remove(2, 1, 1);
        assert_eq!(grid.extent(), None);
        assert!(grid.remove(9, 9, 9).is_none());
    }

    #[test]
    fn chunk_scan_matches_either_strategy() {
        let side = ChunkSideLength::new(2).unwrap();
        let mut grid = BlockGrid::new("g");
        for x in 0..6 {
            grid.set(stone(x, 0, 0));
        }
        // fewer cells than the chunk volume: filters the map
        assert_eq!(grid.blocks_in_chunk(ChunkKey::new(1, 0, 0), side).len(), 2);
        for x in 6..12 {
            grid.set(stone(x, 0, 0));
        }
        // more cells than the chunk volume: walks the chunk
        assert_eq!(grid.blocks_in_chunk(ChunkKey::new(1, 0, 0), side).len(), 2);
        assert_eq!(grid.chunk_keys(side).len(), 6);
    }
}
