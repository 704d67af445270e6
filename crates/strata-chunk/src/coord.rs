use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strata_blocks::BlockData;

pub const MIN_CHUNK_SIDE: u32 = 1;
pub const MAX_CHUNK_SIDE: u32 = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkKey {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
            cz: self.cz + dz,
        }
    }

    /// Block coordinates of the chunk's minimum corner.
    #[inline]
    pub fn origin(self, side: ChunkSideLength) -> [i32; 3] {
        let s = side.get() as i32;
        [self.cx * s, self.cy * s, self.cz * s]
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.cx, self.cy, self.cz)
    }
}

impl From<(i32, i32, i32)> for ChunkKey {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<ChunkKey> for (i32, i32, i32) {
    fn from(value: ChunkKey) -> Self {
        (value.cx, value.cy, value.cz)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidSideLength(pub i64);

impl fmt::Display for InvalidSideLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk side length {} outside [{}, {}]",
            self.0, MIN_CHUNK_SIDE, MAX_CHUNK_SIDE
        )
    }
}

impl std::error::Error for InvalidSideLength {}

/// Chunk edge length in blocks, guaranteed to lie in `[1, 64]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u32")]
pub struct ChunkSideLength(u32);

impl ChunkSideLength {
    pub const DEFAULT: ChunkSideLength = ChunkSideLength(16);

    pub fn new(side: i64) -> Result<Self, InvalidSideLength> {
        if side < i64::from(MIN_CHUNK_SIDE) || side > i64::from(MAX_CHUNK_SIDE) {
            return Err(InvalidSideLength(side));
        }
        Ok(Self(side as u32))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for ChunkSideLength {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<ChunkSideLength> for u32 {
    fn from(value: ChunkSideLength) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for ChunkSideLength {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        ChunkSideLength::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Owning chunk of a block, using floored division so negatives land below zero.
#[inline]
pub fn chunk_key_of(x: i32, y: i32, z: i32, side: ChunkSideLength) -> ChunkKey {
    let s = side.get() as i32;
    ChunkKey::new(x.div_euclid(s), y.div_euclid(s), z.div_euclid(s))
}

/// Position of a block inside its chunk, each component in `[0, side)`.
#[inline]
pub fn local_of(x: i32, y: i32, z: i32, side: ChunkSideLength) -> (i32, i32, i32) {
    let s = side.get() as i32;
    (x.rem_euclid(s), y.rem_euclid(s), z.rem_euclid(s))
}

/// Groups a flat block list into per-chunk batches.
pub fn partition(
    blocks: impl IntoIterator<Item = BlockData>,
    side: ChunkSideLength,
) -> HashMap<ChunkKey, Vec<BlockData>> {
    let mut out: HashMap<ChunkKey, Vec<BlockData>> = HashMap::new();
    for b in blocks {
        out.entry(chunk_key_of(b.x, b.y, b.z, side)).or_default().push(b);
    }
    out
}
