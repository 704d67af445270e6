use crate::constants::{NORMAL_SCALE, POSITION_SCALE};
use crate::mesh_build::{IndexBuffer, MaterialGroup, MeshData};

#[derive(Clone, Debug, PartialEq)]
pub enum PositionBuffer {
    /// Fixed point, `POSITION_SCALE` units per block.
    Fixed16(Vec<i16>),
    F32(Vec<f32>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum NormalBuffer {
    /// Signed normalized, `NORMAL_SCALE` per unit.
    Snorm8(Vec<i8>),
    F32(Vec<f32>),
}

/// Upload-ready mesh with each attribute narrowed only when every value fits.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkGeometryData {
    pub positions: PositionBuffer,
    pub normals: NormalBuffer,
    pub uvs: Vec<f32>,
    pub indices: IndexBuffer,
    pub material_ids: Vec<u8>,
    pub materials: Vec<u32>,
    pub groups: Vec<MaterialGroup>,
}

fn narrow_positions(src: &[f32]) -> PositionBuffer {
    let lo = f32::from(i16::MIN);
    let hi = f32::from(i16::MAX);
    let fits = src.iter().all(|&v| {
        let s = (v * POSITION_SCALE).round();
        s.is_finite() && (lo..=hi).contains(&s)
    });
    if fits {
        PositionBuffer::Fixed16(src.iter().map(|&v| (v * POSITION_SCALE).round() as i16).collect())
    } else {
        PositionBuffer::F32(src.to_vec())
    }
}

fn narrow_normals(src: &[f32]) -> NormalBuffer {
    if src.iter().all(|v| (-1.0..=1.0).contains(v)) {
        NormalBuffer::Snorm8(src.iter().map(|&v| (v * NORMAL_SCALE).round() as i8).collect())
    } else {
        NormalBuffer::F32(src.to_vec())
    }
}

impl ChunkGeometryData {
    pub fn from_mesh(mesh: &MeshData) -> Self {
        let indices = match &mesh.indices {
            IndexBuffer::U32(v) => IndexBuffer::from_u32(v.clone(), mesh.vertex_count()),
            narrow => narrow.clone(),
        };
        Self {
            positions: narrow_positions(&mesh.positions),
            normals: narrow_normals(&mesh.normals),
            uvs: mesh.uvs.clone(),
            indices,
            material_ids: mesh.material_ids.clone(),
            materials: mesh.materials.clone(),
            groups: mesh.groups.clone(),
        }
    }

    /// Decodes positions back to block units.
    pub fn positions_f32(&self) -> Vec<f32> {
        match &self.positions {
            PositionBuffer::Fixed16(v) => v.iter().map(|&p| f32::from(p) / POSITION_SCALE).collect(),
            PositionBuffer::F32(v) => v.clone(),
        }
    }

    pub fn byte_len(&self) -> usize {
        let pos = match &self.positions {
            PositionBuffer::Fixed16(v) => v.len() * 2,
            PositionBuffer::F32(v) => v.len() * 4,
        };
        let norm = match &self.normals {
            NormalBuffer::Snorm8(v) => v.len(),
            NormalBuffer::F32(v) => v.len() * 4,
        };
        pos + norm + self.uvs.len() * 4 + self.material_ids.len() + self.indices.byte_len()
    }
}
