use std::collections::{BTreeMap, HashMap};

use strata_blocks::Category;

use crate::assemble::ChunkMeshes;
use crate::constants::MAX_MATERIALS_PER_CATEGORY;
use crate::error::MeshError;
use crate::mesh_build::{IndexBuffer, MaterialGroup, MeshData};

#[derive(Default)]
struct BatchMesh {
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    indices: Vec<u32>,
    material_ids: Vec<u8>,
    materials: Vec<u32>,
    slot_of: HashMap<u32, u8>,
    groups: Vec<MaterialGroup>,
}

/// Slot mapping for one mesh, computed before any buffer is touched.
struct SlotPlan {
    remap: Vec<u8>,
    fresh: Vec<u32>,
}

impl BatchMesh {
    fn plan(&self, category: Category, mesh: &MeshData) -> Result<SlotPlan, MeshError> {
        let mut remap = Vec::with_capacity(mesh.materials.len());
        let mut fresh: Vec<u32> = Vec::new();
        for &m in &mesh.materials {
            let slot = match self.slot_of.get(&m) {
                Some(&s) => s,
                None => match fresh.iter().position(|&f| f == m) {
                    Some(i) => (self.materials.len() + i) as u8,
                    None => {
                        let next = self.materials.len() + fresh.len();
                        if next >= MAX_MATERIALS_PER_CATEGORY {
                            return Err(MeshError::TooManyMaterials { category });
                        }
                        fresh.push(m);
                        next as u8
                    }
                },
            };
            remap.push(slot);
        }
        Ok(SlotPlan { remap, fresh })
    }

    fn apply(&mut self, plan: SlotPlan, mesh: &MeshData, shift: [f32; 3]) {
        let SlotPlan { remap, fresh } = plan;
        for m in fresh {
            self.slot_of.insert(m, self.materials.len() as u8);
            self.materials.push(m);
        }

        let base = (self.positions.len() / 3) as u32;
        let index_base = self.indices.len() as u32;
        self.positions.extend(
            mesh.positions
                .chunks_exact(3)
                .flat_map(|p| [p[0] + shift[0], p[1] + shift[1], p[2] + shift[2]]),
        );
        self.normals.extend_from_slice(&mesh.normals);
        self.uvs.extend_from_slice(&mesh.uvs);
        self.material_ids
            .extend(mesh.material_ids.iter().map(|&s| remap[s as usize]));
        self.indices.extend(mesh.indices.iter().map(|i| i + base));
        for g in &mesh.groups {
            match self.groups.last_mut() {
                Some(last)
                    if last.material_index == g.material_index
                        && last.start + last.count == g.start + index_base =>
                {
                    last.count += g.count
                }
                _ => self.groups.push(MaterialGroup {
                    start: g.start + index_base,
                    ..*g
                }),
            }
        }
    }

    fn finish(self) -> MeshData {
        let vertex_count = self.positions.len() / 3;
        MeshData {
            positions: self.positions,
            normals: self.normals,
            uvs: self.uvs,
            indices: IndexBuffer::from_u32(self.indices, vertex_count),
            material_ids: self.material_ids,
            materials: self.materials,
            groups: self.groups,
        }
    }
}

/// Merges several chunks into one buffer per category.
///
/// Positions are re-expressed relative to the first appended chunk's origin.
#[derive(Default)]
pub struct BatchAccumulator {
    origin: Option<[i32; 3]>,
    meshes: BTreeMap<Category, BatchMesh>,
    chunks: usize,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops anything accumulated so far.
    pub fn start(&mut self) {
        self.origin = None;
        self.meshes.clear();
        self.chunks = 0;
    }

    /// Adds one chunk. On error nothing of the chunk is kept.
    pub fn append(&mut self, chunk: &ChunkMeshes) -> Result<(), MeshError> {
        let empty = BatchMesh::default();
        let mut plans = Vec::with_capacity(chunk.meshes.len());
        for (&category, mesh) in &chunk.meshes {
            let target = self.meshes.get(&category).unwrap_or(&empty);
            plans.push((category, target.plan(category, mesh)?, mesh));
        }

        let origin = *self.origin.get_or_insert(chunk.origin);
        let shift = [
            (chunk.origin[0] - origin[0]) as f32,
            (chunk.origin[1] - origin[1]) as f32,
            (chunk.origin[2] - origin[2]) as f32,
        ];
        for (category, plan, mesh) in plans {
            self.meshes.entry(category).or_default().apply(plan, mesh, shift);
        }
        self.chunks += 1;
        Ok(())
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    pub fn origin(&self) -> Option<[i32; 3]> {
        self.origin
    }

    /// Returns the merged meshes and leaves the accumulator empty.
    pub fn finish(&mut self) -> BTreeMap<Category, MeshData> {
        let meshes = std::mem::take(&mut self.meshes);
        self.origin = None;
        self.chunks = 0;
        meshes.into_iter().map(|(c, m)| (c, m.finish())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_chunk::ChunkKey;

    /// A mesh with one quad drawn with the first of `materials`.
    fn quad(materials: impl IntoIterator<Item = u32>) -> MeshData {
        let materials: Vec<u32> = materials.into_iter().collect();
        MeshData {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            uvs: vec![0.0; 8],
            indices: IndexBuffer::from_u32(vec![0, 1, 2, 0, 2, 3], 4),
            material_ids: vec![0; 4],
            groups: vec![MaterialGroup {
                start: 0,
                count: 6,
                material_index: materials[0],
            }],
            materials,
        }
    }

    fn chunk(key: ChunkKey, meshes: Vec<(Category, MeshData)>) -> ChunkMeshes {
        ChunkMeshes {
            key,
            origin: [key.cx * 16, key.cy * 16, key.cz * 16],
            meshes: meshes.into_iter().collect(),
        }
    }

    #[test]
    fn failed_append_keeps_nothing_of_the_chunk() {
        let mut batch = BatchAccumulator::new();
        let bad = chunk(
            ChunkKey::new(1, 0, 0),
            vec![(Category::Solid, quad([7])), (Category::Transparent, quad(0..300))],
        );
        assert_eq!(
            batch.append(&bad),
            Err(MeshError::TooManyMaterials {
                category: Category::Transparent
            })
        );
        assert_eq!(batch.chunk_count(), 0);
        assert_eq!(batch.origin(), None);
        assert!(batch.finish().is_empty());
    }

    #[test]
    fn overflow_on_second_chunk_leaves_first_intact() {
        let mut batch = BatchAccumulator::new();
        let first = chunk(
            ChunkKey::new(0, 0, 0),
            vec![(Category::Solid, quad([1])), (Category::Transparent, quad(0..200))],
        );
        batch.append(&first).unwrap();
        let second = chunk(
            ChunkKey::new(1, 0, 0),
            vec![(Category::Solid, quad([2])), (Category::Transparent, quad(1000..1100))],
        );
        assert!(batch.append(&second).is_err());
        assert_eq!(batch.chunk_count(), 1);
        let merged = batch.finish();
        assert_eq!(merged[&Category::Solid], first.meshes[&Category::Solid]);
        assert_eq!(merged[&Category::Transparent].materials.len(), 200);
    }

    #[test]
    fn shared_materials_reuse_slots() {
        let mut batch = BatchAccumulator::new();
        batch
            .append(&chunk(ChunkKey::new(0, 0, 0), vec![(Category::Solid, quad([5, 9]))]))
            .unwrap();
        batch
            .append(&chunk(ChunkKey::new(0, 0, 1), vec![(Category::Solid, quad([9, 5]))]))
            .unwrap();
        let merged = batch.finish();
        let solid = &merged[&Category::Solid];
        assert_eq!(solid.materials, vec![5, 9]);
        // second quad is drawn with material 9, slot 1
        assert_eq!(&solid.material_ids[4..], &[1, 1, 1, 1]);
        assert_eq!(solid.positions[14], 16.0);
        assert_eq!(&solid.indices.to_u32()[6..], &[4, 5, 6, 4, 6, 7]);
    }
}
