use std::collections::HashMap;

use strata_blocks::{BakedFace, Category, MODEL_UNITS};

use crate::constants::{INDICES_PER_FACE, MAX_MATERIALS_PER_CATEGORY, MAX_U16_VERTICES, VERTS_PER_FACE};
use crate::error::MeshError;

/// Triangle indices, `u16` whenever the vertex count allows it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Default for IndexBuffer {
    fn default() -> Self {
        IndexBuffer::U16(Vec::new())
    }
}

impl IndexBuffer {
    /// Picks the narrowest width able to address `vertex_count` vertices.
    pub fn from_u32(indices: Vec<u32>, vertex_count: usize) -> Self {
        if vertex_count <= MAX_U16_VERTICES {
            IndexBuffer::U16(indices.into_iter().map(|i| i as u16).collect())
        } else {
            IndexBuffer::U32(indices)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U16(v) => v.len(),
            IndexBuffer::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            IndexBuffer::U16(v) => v.get(i).map(|&x| u32::from(x)),
            IndexBuffer::U32(v) => v.get(i).copied(),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            IndexBuffer::U16(v) => Box::new(v.iter().map(|&x| u32::from(x))),
            IndexBuffer::U32(v) => Box::new(v.iter().copied()),
        }
    }

    pub fn is_u16(&self) -> bool {
        matches!(self, IndexBuffer::U16(_))
    }

    pub fn to_u32(&self) -> Vec<u32> {
        self.iter().collect()
    }

    pub fn byte_len(&self) -> usize {
        match self {
            IndexBuffer::U16(v) => v.len() * 2,
            IndexBuffer::U32(v) => v.len() * 4,
        }
    }
}

/// Draw sub-range `start..start+count` of the index buffer using one material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: u32,
}

/// Geometry for one render category of one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// Chunk-local, in block units.
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: IndexBuffer,
    /// Per-vertex slot into `materials`.
    pub material_ids: Vec<u8>,
    /// Slot to global material index.
    pub materials: Vec<u32>,
    pub groups: Vec<MaterialGroup>,
}

impl MeshData {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        (self.positions.len() + self.normals.len() + self.uvs.len()) * 4
            + self.material_ids.len()
            + self.indices.byte_len()
    }
}

/// Growable per-category buffers. Index width is only decided in `finish`.
#[derive(Clone, Debug)]
pub struct MeshBuilder {
    category: Category,
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    indices: Vec<u32>,
    material_ids: Vec<u8>,
    materials: Vec<u32>,
    slot_of: HashMap<u32, u8>,
    groups: Vec<MaterialGroup>,
}

impl MeshBuilder {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            material_ids: Vec::new(),
            materials: Vec::new(),
            slot_of: HashMap::new(),
            groups: Vec::new(),
        }
    }

    /// Pre-reserve capacity for approximately `n_faces` quads.
    pub fn reserve_faces(&mut self, n_faces: usize) {
        let verts = n_faces * VERTS_PER_FACE;
        self.positions.reserve(verts * 3);
        self.normals.reserve(verts * 3);
        self.uvs.reserve(verts * 2);
        self.material_ids.reserve(verts);
        self.indices.reserve(n_faces * INDICES_PER_FACE);
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    fn slot(&mut self, material_index: u32) -> Result<u8, MeshError> {
        if let Some(&s) = self.slot_of.get(&material_index) {
            return Ok(s);
        }
        if self.materials.len() >= MAX_MATERIALS_PER_CATEGORY {
            return Err(MeshError::TooManyMaterials {
                category: self.category,
            });
        }
        let s = self.materials.len() as u8;
        self.materials.push(material_index);
        self.slot_of.insert(material_index, s);
        Ok(s)
    }

    /// Appends a baked face translated to `offset` (chunk-local block position).
    pub fn add_face(
        &mut self,
        face: &BakedFace,
        offset: [f32; 3],
        material_index: u32,
    ) -> Result<(), MeshError> {
        let slot = self.slot(material_index)?;
        let base = self.vertex_count() as u32;
        for i in 0..VERTS_PER_FACE {
            let v = face.vertex(i);
            self.positions.extend_from_slice(&[
                offset[0] + v[0] / MODEL_UNITS,
                offset[1] + v[1] / MODEL_UNITS,
                offset[2] + v[2] / MODEL_UNITS,
            ]);
            self.normals.extend_from_slice(&face.normal);
            self.uvs.extend_from_slice(&face.uv[i * 2..i * 2 + 2]);
            self.material_ids.push(slot);
        }
        let start = self.indices.len() as u32;
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        match self.groups.last_mut() {
            Some(g) if g.material_index == material_index => g.count += INDICES_PER_FACE as u32,
            _ => self.groups.push(MaterialGroup {
                start,
                count: INDICES_PER_FACE as u32,
                material_index,
            }),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn finish(self) -> MeshData {
        let vertex_count = self.vertex_count();
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
