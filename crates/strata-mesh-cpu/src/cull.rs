use strata_blocks::{BakedBlockDef, BakedFace, Category, Face};

use crate::constants::EMPTY_CELL;
use crate::palette::{PaletteBlockData, PaletteCache};

/// Resolves the occupant of an absolute cell, which may lie in the halo.
pub trait NeighborLookup {
    fn neighbor(&self, x: i32, y: i32, z: i32) -> Option<&PaletteBlockData>;
}

/// Whether `there`, sitting against `here` across `face`, hides that face.
///
/// The neighbor must fully cover the shared side, and the two categories
/// must agree on opacity: opaque hides opaque, water hides water, and
/// transparent hides transparent only for the same block. Anything else
/// leaves the face visible.
#[inline]
pub fn culls(here: &PaletteBlockData, there: &PaletteBlockData, face: Face) -> bool {
    if !there.covers_mask(face.opposite().index()) {
        return false;
    }
    match (here.category, there.category) {
        (a, b) if a.is_opaque() && b.is_opaque() => true,
        (Category::Water, Category::Water) => true,
        (Category::Transparent, Category::Transparent) => here.block_name == there.block_name,
        _ => false,
    }
}

/// Faces of `def` at `pos` that survive culling, with their index into `def.faces`.
pub fn visible_faces<'a, L: NeighborLookup + ?Sized>(
    pos: (i32, i32, i32),
    def: &'a BakedBlockDef,
    here: &'a PaletteBlockData,
    lookup: &'a L,
) -> impl Iterator<Item = (usize, &'a BakedFace)> + 'a {
    def.faces.iter().enumerate().filter(move |(_, face)| {
        let Some(side) = face.cull_face() else {
            return true;
        };
        let (dx, dy, dz) = side.delta();
        match lookup.neighbor(pos.0 + dx, pos.1 + dy, pos.2 + dz) {
            Some(there) => !culls(here, there, side),
            None => true,
        }
    })
}

/// Dense palette-index map over a chunk plus a one-cell border.
#[derive(Clone, Debug)]
pub struct VoxelMap {
    min: [i32; 3],
    dims: [usize; 3],
    cells: Vec<u32>,
}

impl VoxelMap {
    /// Covers `origin - 1 .. origin + extent + 1` on every axis.
    pub fn padded(origin: [i32; 3], extent: [u32; 3]) -> Self {
        let dims = [
            extent[0] as usize + 2,
            extent[1] as usize + 2,
            extent[2] as usize + 2,
        ];
        Self {
            min: [origin[0] - 1, origin[1] - 1, origin[2] - 1],
            dims,
            cells: vec![EMPTY_CELL; dims[0] * dims[1] * dims[2]],
        }
    }

    #[inline]
    fn idx(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        let lx = usize::try_from(x - self.min[0]).ok()?;
        let ly = usize::try_from(y - self.min[1]).ok()?;
        let lz = usize::try_from(z - self.min[2]).ok()?;
        if lx >= self.dims[0] || ly >= self.dims[1] || lz >= self.dims[2] {
            return None;
        }
        Some((ly * self.dims[2] + lz) * self.dims[0] + lx)
    }

    /// Stores a palette index. Returns false when the cell was already taken
    /// or lies outside the map.
    pub fn set(&mut self, x: i32, y: i32, z: i32, palette_index: u32) -> bool {
        match self.idx(x, y, z) {
            Some(i) if self.cells[i] == EMPTY_CELL => {
                self.cells[i] = palette_index;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<u32> {
        let i = self.idx(x, y, z)?;
        let v = self.cells[i];
        (v != EMPTY_CELL).then_some(v)
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        self.idx(x, y, z).is_some()
    }
}

/// Neighbor lookup through a voxel map into the shared palette.
pub struct PaletteLookup<'a> {
    pub map: &'a VoxelMap,
    pub palette: &'a PaletteCache,
}

impl NeighborLookup for PaletteLookup<'_> {
    #[inline]
    fn neighbor(&self, x: i32, y: i32, z: i32) -> Option<&PaletteBlockData> {
        self.map
            .get(x, y, z)
            .and_then(|i| self.palette.get(i as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapLookup(HashMap<(i32, i32, i32), PaletteBlockData>);

    impl NeighborLookup for MapLookup {
        fn neighbor(&self, x: i32, y: i32, z: i32) -> Option<&PaletteBlockData> {
            self.0.get(&(x, y, z))
        }
    }

    fn entry(name: &str, category: Category, mask: u8) -> PaletteBlockData {
        PaletteBlockData {
            block_name: name.to_string(),
            state_key: name.to_string(),
            category,
            material_groups: Vec::new(),
            face_materials: Vec::new(),
            occlusion_mask: mask,
        }
    }

    #[test]
    fn category_pairs() {
        let stone = entry("stone", Category::Solid, 0x3F);
        let lamp = entry("glowstone", Category::Emissive, 0x3F);
        let water = entry("water", Category::Water, 0x3F);
        let glass = entry("glass", Category::Transparent, 0x3F);
        let ice = entry("ice", Category::Transparent, 0x3F);
        assert!(culls(&stone, &lamp, Face::PosX));
        assert!(culls(&water, &water, Face::PosY));
        assert!(culls(&glass, &glass, Face::NegZ));
        assert!(!culls(&glass, &ice, Face::NegZ));
        assert!(!culls(&stone, &glass, Face::PosX));
        assert!(!culls(&glass, &stone, Face::PosX));
        assert!(!culls(&stone, &water, Face::PosX));
        assert!(!culls(&water, &glass, Face::PosX));
    }

    #[test]
    fn partial_neighbor_does_not_cull() {
        // Bottom slab covers only its -Y side.
        let slab = entry("oak_slab", Category::Solid, 1 << Face::NegY.index());
        let stone = entry("stone", Category::Solid, 0x3F);
        assert!(!culls(&stone, &slab, Face::PosY));
        assert!(culls(&stone, &slab, Face::NegY));
    }

    #[test]
    fn visible_faces_against_lookup() {
        let def = BakedBlockDef::full_cube("stone");
        let stone = entry("stone", Category::Solid, 0x3F);
        let mut cells = HashMap::new();
        cells.insert((1, 0, 0), stone.clone());
        cells.insert((0, 1, 0), stone.clone());
        let lookup = MapLookup(cells);
        let faces: Vec<usize> = visible_faces((0, 0, 0), &def, &stone, &lookup)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(faces.len(), 4);
        let hidden: Vec<Face> = def
            .faces
            .iter()
            .enumerate()
            .filter(|(i, _)| !faces.contains(i))
            .filter_map(|(_, f)| f.cull_face())
            .collect();
        assert!(hidden.contains(&Face::PosX) && hidden.contains(&Face::PosY));
    }

    #[test]
    fn voxel_map_padding() {
        let mut map = VoxelMap::padded([16, 0, -16], [16, 16, 16]);
        assert!(map.contains(15, -1, -17));
        assert!(map.contains(32, 16, 0));
        assert!(!map.contains(33, 0, 0));
        assert!(map.set(15, 0, -16, 7));
        assert!(!map.set(15, 0, -16, 8));
        assert_eq!(map.get(15, 0, -16), Some(7));
        assert_eq!(map.get(16, 0, -16), None);
    }
}
