use std::collections::HashMap;

use crate::types::Category;

/// A render material: one texture drawn with one category's pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Material {
    pub index: u32,
    pub tex_key: String,
    pub category: Category,
}

/// Append-only material table. Indices are handed out once and never reused.
#[derive(Default, Clone, Debug)]
pub struct MaterialCatalog {
    pub materials: Vec<Material>,
    pub by_key: HashMap<(String, Category), u32>,
}

impl MaterialCatalog {
    pub fn new() -> Self {
        Self {
            materials: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn get_id(&self, tex_key: &str, category: Category) -> Option<u32> {
        self.by_key.get(&(tex_key.to_string(), category)).copied()
    }

    pub fn get(&self, index: u32) -> Option<&Material> {
        self.materials.get(index as usize)
    }

    /// Returns the index for `(tex_key, category)`, assigning the next free one on first sight.
    pub fn intern(&mut self, tex_key: &str, category: Category) -> u32 {
        if let Some(id) = self.get_id(tex_key, category) {
            return id;
        }
        let index = self.materials.len() as u32;
        self.by_key.insert((tex_key.to_string(), category), index);
        self.materials.push(Material {
            index,
            tex_key: tex_key.to_string(),
            category,
        });
        index
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
