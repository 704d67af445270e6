use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::baked::{BakedBlockDef, MISSING_TEXTURE, MODEL_UNITS};
use crate::config::{DefinitionsConfig, ElementConfig, ShapeConfig, TextureSelector, TexturesDef};
use crate::face::Face;
use crate::types::{RenderType, bare_name, parse_state_key};

/// Supplies baked geometry for block states. Implemented by whatever owns the
/// loaded resource packs; the pipeline only ever asks by state key.
pub trait BlockDefinitionProvider: Send + Sync {
    /// Returns `None` when the state cannot be resolved.
    fn bake_block_state(&self, state_key: &str) -> Option<BakedBlockDef>;

    fn render_type(&self, _block_name: &str) -> Option<RenderType> {
        None
    }

    fn light_emission(&self, _block_name: &str) -> u8 {
        0
    }
}

#[derive(Debug)]
pub enum DefinitionError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidShape { block: String, kind: String },
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionError::Io(e) => write!(f, "reading block definitions: {}", e),
            DefinitionError::Parse(e) => write!(f, "parsing block definitions: {}", e),
            DefinitionError::InvalidShape { block, kind } => {
                write!(f, "block '{}' has unknown shape '{}'", block, kind)
            }
        }
    }
}

impl std::error::Error for DefinitionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DefinitionError::Io(e) => Some(e),
            DefinitionError::Parse(e) => Some(e),
            DefinitionError::InvalidShape { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
enum CompiledShape {
    Cube,
    Slab { half_from: String },
    Carpet,
    Cross,
    Elements(Vec<ElementConfig>),
}

#[derive(Clone, Debug)]
struct CompiledBlock {
    shape: CompiledShape,
    textures: TexturesDef,
    render_type: Option<RenderType>,
    emission: u8,
}

/// Definition provider backed by a TOML block table.
#[derive(Clone, Debug, Default)]
pub struct TomlDefinitions {
    blocks: HashMap<String, CompiledBlock>,
}

impl TomlDefinitions {
    pub fn from_toml_str(s: &str) -> Result<Self, DefinitionError> {
        let cfg: DefinitionsConfig = toml::from_str(s).map_err(DefinitionError::Parse)?;
        Self::from_config(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let s = fs::read_to_string(path).map_err(DefinitionError::Io)?;
        Self::from_toml_str(&s)
    }

    pub fn from_config(cfg: DefinitionsConfig) -> Result<Self, DefinitionError> {
        let mut blocks = HashMap::with_capacity(cfg.blocks.len());
        for def in cfg.blocks {
            let shape = compile_shape(&def.name, def.shape)?;
            let name = bare_name(&def.name).to_string();
            blocks.insert(
                name,
                CompiledBlock {
                    shape,
                    textures: def.textures.unwrap_or_default(),
                    render_type: def.render_type,
                    emission: def.emission.unwrap_or(0),
                },
            );
        }
        Ok(Self { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn lookup(&self, block_name: &str) -> Option<&CompiledBlock> {
        self.blocks.get(bare_name(block_name))
    }
}

fn compile_shape(block: &str, shape: Option<ShapeConfig>) -> Result<CompiledShape, DefinitionError> {
    let (kind, half, elements) = match shape {
        None => return Ok(CompiledShape::Cube),
        Some(ShapeConfig::Simple(kind)) => (kind, None, None),
        Some(ShapeConfig::Detailed(d)) => (d.kind, d.half, d.elements),
    };
    match kind.as_str() {
        "cube" => Ok(CompiledShape::Cube),
        "slab" => Ok(CompiledShape::Slab {
            half_from: half.map(|h| h.from).unwrap_or_else(|| "type".to_string()),
        }),
        "carpet" => Ok(CompiledShape::Carpet),
        "cross" => Ok(CompiledShape::Cross),
        "elements" => Ok(CompiledShape::Elements(elements.unwrap_or_default())),
        _ => Err(DefinitionError::InvalidShape {
            block: block.to_string(),
            kind,
        }),
    }
}

fn cuboids_for(shape: &CompiledShape, props: &BTreeMap<String, String>) -> Vec<([f32; 3], [f32; 3])> {
    let full = MODEL_UNITS;
    let half = MODEL_UNITS / 2.0;
    match shape {
        CompiledShape::Cube => vec![([0.0; 3], [full; 3])],
        CompiledShape::Slab { half_from } => match props.get(half_from).map(String::as_str) {
            Some("top") => vec![([0.0, half, 0.0], [full; 3])],
            Some("double") => vec![([0.0; 3], [full; 3])],
            _ => vec![([0.0; 3], [full, half, full])],
        },
        CompiledShape::Carpet => vec![([0.0; 3], [full, 1.0, full])],
        CompiledShape::Cross => Vec::new(),
        CompiledShape::Elements(els) => els.iter().map(|e| (e.from, e.to)).collect(),
    }
}

fn resolve_selector(sel: &TextureSelector, props: &BTreeMap<String, String>) -> Option<String> {
    match sel {
        TextureSelector::Key(k) => Some(k.clone()),
        TextureSelector::By { by, map } => props.get(by).and_then(|v| map.get(v)).cloned(),
    }
}

fn texture_for(textures: &TexturesDef, face: Face, props: &BTreeMap<String, String>) -> String {
    let specific = match face {
        Face::PosY => textures.top.as_ref(),
        Face::NegY => textures.bottom.as_ref(),
        _ => textures.side.as_ref(),
    };
    specific
        .or(textures.all.as_ref())
        .and_then(|sel| resolve_selector(sel, props))
        .unwrap_or_else(|| MISSING_TEXTURE.to_string())
}

impl BlockDefinitionProvider for TomlDefinitions {
    fn bake_block_state(&self, state_key: &str) -> Option<BakedBlockDef> {
        let (name, props) = parse_state_key(state_key);
        let block = self.lookup(&name)?;
        if let CompiledShape::Cross = block.shape {
            return Some(BakedBlockDef::cross(&texture_for(&block.textures, Face::PosZ, &props)));
        }
        let cuboids = cuboids_for(&block.shape, &props);
        if cuboids.is_empty() {
            return None;
        }
        Some(BakedBlockDef::from_cuboids(&cuboids, |face| {
            texture_for(&block.textures, face, &props)
        }))
    }

    fn render_type(&self, block_name: &str) -> Option<RenderType> {
        self.lookup(block_name).and_then(|b| b.render_type)
    }

    fn light_emission(&self, block_name: &str) -> u8 {
        self.lookup(block_name).map_or(0, |b| b.emission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFS: &str = r#"
        [[blocks]]
        name = "grass_block"
        textures = { top = "grass_top", bottom = "dirt", side = "grass_side" }

        [[blocks]]
        name = "oak_slab"
        shape = { kind = "slab", half = { from = "type" } }
        textures = { all = "oak_planks" }

        [[blocks]]
        name = "wool"
        textures = { all = { by = "color", map = { red = "red_wool" } } }

        [[blocks]]
        name = "glass"
        render_type = "translucent"
        textures = { all = "glass" }
    "#;

    #[test]
    fn bakes_role_textures() {
        let defs = TomlDefinitions::from_toml_str(DEFS).unwrap();
        let def = defs.bake_block_state("minecraft:grass_block").unwrap();
        let top = def.faces.iter().find(|f| f.normal == [0.0, 1.0, 0.0]).unwrap();
        let east = def.faces.iter().find(|f| f.normal == [1.0, 0.0, 0.0]).unwrap();
        assert_eq!(top.tex_key, "grass_top");
        assert_eq!(east.tex_key, "grass_side");
        assert_eq!(defs.render_type("glass"), Some(RenderType::Translucent));
    }

    #[test]
    fn slab_half_follows_property() {
        let defs = TomlDefinitions::from_toml_str(DEFS).unwrap();
        let top = defs.bake_block_state("oak_slab[type=top]").unwrap();
        assert_eq!(top.bbox, [0.0, 8.0, 0.0, 16.0, 16.0, 16.0]);
        let bottom = defs.bake_block_state("oak_slab").unwrap();
        assert_eq!(bottom.bbox, [0.0, 0.0, 0.0, 16.0, 8.0, 16.0]);
    }

    #[test]
    fn unresolved_selector_uses_missing_texture() {
        let defs = TomlDefinitions::from_toml_str(DEFS).unwrap();
        let red = defs.bake_block_state("wool[color=red]").unwrap();
        assert!(red.faces.iter().all(|f| f.tex_key == "red_wool"));
        let blue = defs.bake_block_state("wool[color=blue]").unwrap();
        assert!(blue.faces.iter().all(|f| f.tex_key == MISSING_TEXTURE));
        assert!(defs.bake_block_state("unknown_block").is_none());
    }

    #[test]
    fn rejects_unknown_shape() {
        let err = TomlDefinitions::from_toml_str(
            r#"
            [[blocks]]
            name = "odd"
            shape = "teapot"
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidShape { .. }));
    }
}
