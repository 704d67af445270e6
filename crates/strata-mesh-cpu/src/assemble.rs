use std::collections::{BTreeMap, HashMap};

use strata_blocks::{BakedBlockDef, Category};
use strata_chunk::{ChunkKey, ChunkMeshRequest};

use crate::cull::{PaletteLookup, VoxelMap, visible_faces};
use crate::error::MeshError;
use crate::mesh_build::{MeshBuilder, MeshData};
use crate::palette::PaletteCache;

/// All category meshes of one chunk. Categories without faces are absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMeshes {
    pub key: ChunkKey,
    /// Chunk origin in block units; mesh positions are relative to it.
    pub origin: [i32; 3],
    pub meshes: BTreeMap<Category, MeshData>,
}

impl ChunkMeshes {
    pub fn get(&self, category: Category) -> Option<&MeshData> {
        self.meshes.get(&category)
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.values().map(MeshData::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.values().map(MeshData::triangle_count).sum()
    }

    pub fn byte_len(&self) -> usize {
        self.meshes.values().map(MeshData::byte_len).sum()
    }
}

struct Placed<'a> {
    palette_index: usize,
    pos: (i32, i32, i32),
    def: &'a BakedBlockDef,
}

/// Builds every category mesh of one chunk.
///
/// Blocks are emitted in palette order, then by y, z, x. Blocks and halo cells
/// outside the request's rendering bounds are skipped entirely, so they
/// neither draw nor hide their neighbors.
pub fn assemble(req: &ChunkMeshRequest, palette: &PaletteCache) -> Result<ChunkMeshes, MeshError> {
    let origin = req.origin();
    let defs: HashMap<&str, &BakedBlockDef> = req
        .defs
        .iter()
        .map(|(k, d)| (k.as_str(), d.as_ref()))
        .collect();

    let mut map = VoxelMap::padded(origin, [req.width, req.height, req.depth]);
    let mut placed: Vec<Placed<'_>> = Vec::with_capacity(req.blocks.len());
    for b in &req.blocks {
        if !req.in_extent(b.x, b.y, b.z) {
            return Err(MeshError::OutsideChunk { x: b.x, y: b.y, z: b.z });
        }
        let palette_index = palette
            .index_of(&b.state_key)
            .ok_or_else(|| MeshError::MissingPaletteEntry {
                state_key: b.state_key.clone(),
            })?;
        let def = defs
            .get(b.state_key.as_str())
            .copied()
            .ok_or_else(|| MeshError::MissingDefinition {
                state_key: b.state_key.clone(),
            })?;
        if !req.renders(b.x, b.y, b.z) {
            continue;
        }
        if !map.set(b.x, b.y, b.z, palette_index as u32) {
            return Err(MeshError::DuplicateBlock { x: b.x, y: b.y, z: b.z });
        }
        placed.push(Placed {
            palette_index,
            pos: b.pos(),
            def,
        });
    }
    for h in &req.halo {
        if !req.renders(h.x, h.y, h.z) {
            continue;
        }
        match palette.index_of(&h.state_key) {
            Some(i) => {
                map.set(h.x, h.y, h.z, i as u32);
            }
            None => log::debug!(target: "mesh", "halo state '{}' not in palette; treated as air", h.state_key),
        }
    }

    placed.sort_unstable_by_key(|p| (p.palette_index, p.pos.1, p.pos.2, p.pos.0));

    let lookup = PaletteLookup {
        map: &map,
        palette,
    };
    let mut builders: BTreeMap<Category, MeshBuilder> = BTreeMap::new();
    let mut visible: Vec<bool> = Vec::new();
    for p in &placed {
        let Some(here) = palette.get(p.palette_index) else {
            continue;
        };
        visible.clear();
        visible.resize(p.def.faces.len(), false);
        for (fi, _) in visible_faces(p.pos, p.def, here, &lookup) {
            visible[fi] = true;
        }
        if !visible.iter().any(|&v| v) {
            continue;
        }
        let offset = [
            (p.pos.0 - origin[0]) as f32,
            (p.pos.1 - origin[1]) as f32,
            (p.pos.2 - origin[2]) as f32,
        ];
        let builder = builders
            .entry(here.category)
            .or_insert_with(|| MeshBuilder::new(here.category));
        for group in &here.material_groups {
            for &fi in &group.base_geometry {
                if !visible.get(fi).copied().unwrap_or(false) {
                    continue;
                }
                builder.add_face(&p.def.faces[fi], offset, group.material_index)?;
            }
        }
    }

    let meshes = builders
        .into_iter()
        .filter(|(_, b)| !b.is_empty())
        .map(|(c, b)| (c, b.finish()))
        .collect();
    Ok(ChunkMeshes {
        key: req.key,
        origin,
        meshes,
    })
}
