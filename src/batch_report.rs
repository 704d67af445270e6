use std::collections::BTreeMap;

use strata_blocks::Category;
use strata_mesh_cpu::{BatchAccumulator, ChunkGeometryData, ChunkMeshes, MeshError, PositionBuffer};

/// Merged totals for one category across every batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CategoryTotals {
    pub vertices: usize,
    pub triangles: usize,
    pub groups: usize,
    /// Largest material table of any single batch.
    pub materials: usize,
    pub f32_bytes: usize,
    pub upload_bytes: usize,
    /// Batches whose positions did not fit fixed point.
    pub wide_positions: usize,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub batches: usize,
    pub chunks: usize,
    pub categories: BTreeMap<Category, CategoryTotals>,
}

impl BatchReport {
    fn absorb(&mut self, acc: &mut BatchAccumulator) {
        if acc.chunk_count() == 0 {
            return;
        }
        self.batches += 1;
        self.chunks += acc.chunk_count();
        for (category, mesh) in acc.finish() {
            let geometry = ChunkGeometryData::from_mesh(&mesh);
            let t = self.categories.entry(category).or_default();
            t.vertices += mesh.vertex_count();
            t.triangles += mesh.triangle_count();
            t.groups += mesh.groups.len();
            t.materials = t.materials.max(mesh.materials.len());
            t.f32_bytes += mesh.byte_len();
            t.upload_bytes += geometry.byte_len();
            if matches!(geometry.positions, PositionBuffer::F32(_)) {
                t.wide_positions += 1;
            }
        }
    }
}

/// Merges chunks, in the order given, into as few batches as the per-category
/// material limit allows. A chunk that would overflow a batch starts the next one.
pub fn merge<'a>(chunks: impl IntoIterator<Item = &'a ChunkMeshes>) -> Result<BatchReport, MeshError> {
    let mut report = BatchReport::default();
    let mut acc = BatchAccumulator::new();
    for chunk in chunks {
        match acc.append(chunk) {
            Ok(()) => {}
            Err(MeshError::TooManyMaterials { category }) => {
                log::debug!(target: "mesh", "{category} material table full; starting a new batch at chunk {}", chunk.key);
                report.absorb(&mut acc);
                acc.append(chunk)?;
            }
            Err(e) => return Err(e),
        }
    }
    report.absorb(&mut acc);
    Ok(report)
}

pub fn print(report: &BatchReport) {
    println!("-- batched: {} chunks in {} batches --", report.chunks, report.batches);
    for (category, t) in &report.categories {
        println!(
            "{:>12}: {} vertices, {} triangles, {} groups, {} materials, {} -> {} bytes{}",
            category.as_str(),
            t.vertices,
            t.triangles,
            t.groups,
            t.materials,
            t.f32_bytes,
            t.upload_bytes,
            if t.wide_positions > 0 { " (f32 positions)" } else { "" }
        );
    }
}
