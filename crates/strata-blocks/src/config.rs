use serde::Deserialize;
use std::collections::HashMap;

use crate::types::RenderType;

// Top-level block definition file
#[derive(Deserialize, Debug, Default)]
pub struct DefinitionsConfig {
    #[serde(default)]
    pub blocks: Vec<BlockDefConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BlockDefConfig {
    pub name: String,
    #[serde(default)]
    pub shape: Option<ShapeConfig>,
    #[serde(default)]
    pub textures: Option<TexturesDef>,
    #[serde(default)]
    pub render_type: Option<RenderType>,
    #[serde(default)]
    pub emission: Option<u8>,
}

// Shape config supports either a simple string ("cube") or a detailed table
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ShapeConfig {
    Simple(String),
    Detailed(ShapeDetailed),
}

#[derive(Deserialize, Debug, Clone)]
pub struct ShapeDetailed {
    pub kind: String,
    // Slab half comes from a state property ("bottom" | "top" | "double")
    #[serde(default)]
    pub half: Option<PropertyFrom>,
    #[serde(default)]
    pub elements: Option<Vec<ElementConfig>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PropertyFrom {
    pub from: String,
}

/// One cuboid in model units (0..16).
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct ElementConfig {
    pub from: [f32; 3],
    pub to: [f32; 3],
}

// Texture mapping: all/top/bottom/side, each can be a key or a by-property map
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TexturesDef {
    #[serde(default)]
    pub all: Option<TextureSelector>,
    #[serde(default)]
    pub top: Option<TextureSelector>,
    #[serde(default)]
    pub bottom: Option<TextureSelector>,
    #[serde(default)]
    pub side: Option<TextureSelector>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum TextureSelector {
    Key(String),
    By {
        by: String,
        map: HashMap<String, String>,
    },
}
