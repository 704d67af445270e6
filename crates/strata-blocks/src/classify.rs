//! Block-name based render category routing.

use crate::types::{Category, RenderType, bare_name};

/// Everything besides the name that classification may consult.
#[derive(Copy, Clone, Debug, Default)]
pub struct ClassifyHints {
    pub render_type: Option<RenderType>,
    pub emission: u8,
    pub full_cube: bool,
}

const LIQUIDS: &[&str] = &[
    "water",
    "flowing_water",
    "lava",
    "flowing_lava",
    "bubble_column",
];

const REDSTONE: &[&str] = &[
    "redstone_wire",
    "repeater",
    "comparator",
    "redstone_torch",
    "redstone_wall_torch",
    "lever",
    "observer",
    "piston",
    "sticky_piston",
    "piston_head",
    "redstone_block",
    "target",
    "daylight_detector",
    "tripwire",
    "tripwire_hook",
    "dropper",
    "dispenser",
    "hopper",
];

const REDSTONE_SUFFIXES: &[&str] = &["_button", "_pressure_plate"];

const EMISSIVE: &[&str] = &[
    "glowstone",
    "sea_lantern",
    "shroomlight",
    "torch",
    "wall_torch",
    "soul_torch",
    "soul_wall_torch",
    "lantern",
    "soul_lantern",
    "jack_o_lantern",
    "end_rod",
    "beacon",
    "magma_block",
    "glow_lichen",
    "ochre_froglight",
    "verdant_froglight",
    "pearlescent_froglight",
    "redstone_lamp",
];

const TRANSPARENT: &[&str] = &[
    "glass",
    "glass_pane",
    "tinted_glass",
    "ice",
    "frosted_ice",
    "slime_block",
    "honey_block",
    "barrier",
    "iron_bars",
    "scaffolding",
    "cobweb",
    "spawner",
];

const TRANSPARENT_SUFFIXES: &[&str] = &["_glass", "_glass_pane", "_leaves", "_trapdoor", "_door"];

fn matches(name: &str, exact: &[&str], suffixes: &[&str]) -> bool {
    exact.contains(&name) || suffixes.iter().any(|s| name.ends_with(s))
}

/// Routes a block into a render category.
///
/// Liquids, then the redstone family, then light emitters take precedence;
/// render-type metadata decides the rest, and without it non-full-cube or
/// known see-through names fall back to transparent.
pub fn classify(block_name: &str, hints: ClassifyHints) -> Category {
    let name = bare_name(block_name);
    if LIQUIDS.contains(&name) {
        return Category::Water;
    }
    if matches(name, REDSTONE, REDSTONE_SUFFIXES) {
        return Category::Redstone;
    }
    if hints.emission > 0 || EMISSIVE.contains(&name) {
        return Category::Emissive;
    }
    match hints.render_type {
        Some(RenderType::Translucent | RenderType::Cutout | RenderType::CutoutMipped) => {
            Category::Transparent
        }
        Some(RenderType::Solid) => Category::Solid,
        None if !hints.full_cube || matches(name, TRANSPARENT, TRANSPARENT_SUFFIXES) => {
            Category::Transparent
        }
        None => Category::Solid,
    }
}
