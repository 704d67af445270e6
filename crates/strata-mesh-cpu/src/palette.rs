use std::collections::HashMap;

use strata_blocks::{
    BakedBlockDef, Category, ClassifyHints, Material, MaterialCatalog, RenderType, classify,
};

/// Faces of one block state that share a material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteMaterialGroup {
    pub material: String,
    /// Face indices into the state's baked definition.
    pub base_geometry: Vec<usize>,
    pub material_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteBlockData {
    pub block_name: String,
    pub state_key: String,
    pub category: Category,
    pub material_groups: Vec<PaletteMaterialGroup>,
    /// Material index per baked face, parallel to the definition's faces.
    pub face_materials: Vec<u32>,
    pub occlusion_mask: u8,
}

impl PaletteBlockData {
    #[inline]
    pub fn covers_mask(&self, face_index: usize) -> bool {
        self.occlusion_mask & (1 << face_index) != 0
    }
}

/// Deduplicated block states and their materials for one loaded grid.
///
/// Indices handed out by `ensure` and material indices are stable for the
/// lifetime of the cache. The orchestrator shares it behind an `Arc` and
/// clones on write.
#[derive(Clone, Debug, Default)]
pub struct PaletteCache {
    palette: Vec<String>,
    block_data: Vec<PaletteBlockData>,
    materials: MaterialCatalog,
    by_state: HashMap<String, usize>,
    categories: HashMap<String, Category>,
    ready: bool,
    epoch: u64,
}

impl PaletteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epoch(epoch: u64) -> Self {
        Self {
            epoch,
            ..Self::default()
        }
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the palette index of `state_key`, resolving its category and
    /// material groups on first sight.
    pub fn ensure(
        &mut self,
        state_key: &str,
        block_name: &str,
        def: &BakedBlockDef,
        render_type: Option<RenderType>,
        emission: u8,
    ) -> usize {
        if let Some(&idx) = self.by_state.get(state_key) {
            return idx;
        }
        let hints = ClassifyHints {
            render_type,
            emission,
            full_cube: def.is_full_cube(),
        };
        let category = self.category_of(block_name, hints);

        let mut material_groups: Vec<PaletteMaterialGroup> = Vec::new();
        let mut face_materials = Vec::with_capacity(def.faces.len());
        for (fi, face) in def.faces.iter().enumerate() {
            let material_index = self.materials.intern(&face.tex_key, category);
            face_materials.push(material_index);
            match material_groups
                .iter_mut()
                .find(|g| g.material_index == material_index)
            {
                Some(g) => g.base_geometry.push(fi),
                None => material_groups.push(PaletteMaterialGroup {
                    material: face.tex_key.clone(),
                    base_geometry: vec![fi],
                    material_index,
                }),
            }
        }

        let idx = self.palette.len();
        self.palette.push(state_key.to_string());
        self.block_data.push(PaletteBlockData {
            block_name: block_name.to_string(),
            state_key: state_key.to_string(),
            category,
            material_groups,
            face_materials,
            occlusion_mask: def.occlusion_mask(),
        });
        self.by_state.insert(state_key.to_string(), idx);
        idx
    }

    /// Category for a block name; the first classification of a name sticks.
    pub fn category_of(&mut self, block_name: &str, hints: ClassifyHints) -> Category {
        if let Some(&c) = self.categories.get(block_name) {
            return c;
        }
        let c = classify(block_name, hints);
        self.categories.insert(block_name.to_string(), c);
        c
    }

    pub fn cached_category(&self, block_name: &str) -> Option<Category> {
        self.categories.get(block_name).copied()
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&PaletteBlockData> {
        self.block_data.get(index)
    }

    #[inline]
    pub fn index_of(&self, state_key: &str) -> Option<usize> {
        self.by_state.get(state_key).copied()
    }

    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    pub fn block_data(&self) -> &[PaletteBlockData] {
        &self.block_data
    }

    pub fn global_materials(&self) -> &[Material] {
        &self.materials.materials
    }

    pub fn material(&self, index: u32) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn len(&self) -> usize {
        self.palette.len()
    }

    pub fn is_empty(&self) -> bool {
        self.palette.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_blocks::Face;

    #[test]
    fn ensure_is_idempotent() {
        let mut p = PaletteCache::new();
        let def = BakedBlockDef::full_cube("stone");
        let a = p.ensure("stone", "stone", &def, None, 0);
        let b = p.ensure("stone", "stone", &def, None, 0);
        assert_eq!(a, b);
        assert_eq!(p.len(), 1);
        assert_eq!(p.palette().len(), p.block_data().len());
        assert_eq!(p.global_materials().len(), 1);
    }

    #[test]
    fn groups_faces_by_material() {
        let mut p = PaletteCache::new();
        let def = BakedBlockDef::from_cuboids(&[([0.0; 3], [16.0; 3])], |f| match f {
            Face::PosY => "grass_top".into(),
            Face::NegY => "dirt".into(),
            _ => "grass_side".into(),
        });
        let idx = p.ensure("grass_block", "grass_block", &def, None, 0);
        let data = p.get(idx).unwrap();
        assert_eq!(data.category, Category::Solid);
        assert_eq!(data.material_groups.len(), 3);
        let side = data
            .material_groups
            .iter()
            .find(|g| g.material == "grass_side")
            .unwrap();
        assert_eq!(side.base_geometry.len(), 4);
        assert_eq!(data.face_materials.len(), 6);
        assert_eq!(data.occlusion_mask, 0b11_1111);
    }

    #[test]
    fn material_indices_are_monotonic_and_category_scoped() {
        let mut p = PaletteCache::new();
        let cube = BakedBlockDef::full_cube("shared");
        p.ensure("a", "stone", &cube, None, 0);
        p.ensure("b", "glass", &cube, None, 0);
        let a = p.get(0).unwrap().face_materials[0];
        let b = p.get(1).unwrap().face_materials[0];
        assert_eq!((a, b), (0, 1));
        assert_eq!(p.material(b).map(|m| m.category), Some(Category::Transparent));
        assert_eq!(p.cached_category("glass"), Some(Category::Transparent));
    }

    #[test]
    fn ready_flag_survives_later_entries() {
        let mut p = PaletteCache::with_epoch(3);
        assert!(!p.is_ready());
        p.mark_ready();
        p.ensure("x", "x", &BakedBlockDef::missing(), None, 0);
        assert!(p.is_ready());
        assert_eq!(p.epoch(), 3);
    }
}
