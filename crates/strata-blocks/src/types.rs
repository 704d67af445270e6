use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Render category a face is routed into. Each category gets its own output buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Solid,
    Water,
    Redstone,
    Transparent,
    Emissive,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Solid,
        Category::Water,
        Category::Redstone,
        Category::Transparent,
        Category::Emissive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Solid => "solid",
            Category::Water => "water",
            Category::Redstone => "redstone",
            Category::Transparent => "transparent",
            Category::Emissive => "emissive",
        }
    }

    /// Opaque categories hide whatever lies behind a fully covering face.
    #[inline]
    pub fn is_opaque(self) -> bool {
        matches!(
            self,
            Category::Solid | Category::Emissive | Category::Redstone
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render-type metadata as declared by a resource pack.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderType {
    Solid,
    Cutout,
    CutoutMipped,
    Translucent,
}

/// One occupied cell of the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData {
    pub name: String,
    pub state_key: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    #[serde(default)]
    pub properties: Option<BTreeMap<String, String>>,
}

impl BlockData {
    /// Builds a block at `(x,y,z)` deriving the canonical state key from `name` and `properties`.
    pub fn new(
        name: impl Into<String>,
        x: i32,
        y: i32,
        z: i32,
        properties: Option<BTreeMap<String, String>>,
    ) -> Self {
        let name = name.into();
        let state_key = canonical_state_key(&name, properties.as_ref());
        Self {
            name,
            state_key,
            x,
            y,
            z,
            properties,
        }
    }

    #[inline]
    pub fn pos(&self) -> (i32, i32, i32) {
        (self.x, self.y, self.z)
    }

    /// Same block identity moved to another cell.
    pub fn moved_to(&self, x: i32, y: i32, z: i32) -> Self {
        Self {
            x,
            y,
            z,
            ..self.clone()
        }
    }
}

/// `name` when there are no properties, otherwise `name[k1=v1,k2=v2]` sorted by key.
pub fn canonical_state_key(name: &str, properties: Option<&BTreeMap<String, String>>) -> String {
    match properties {
        Some(props) if !props.is_empty() => {
            let body: Vec<String> = props.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{name}[{}]", body.join(","))
        }
        _ => name.to_string(),
    }
}

/// Splits a state key into block name and properties. Malformed property pairs are skipped.
pub fn parse_state_key(key: &str) -> (String, BTreeMap<String, String>) {
    let mut props = BTreeMap::new();
    let Some(open) = key.find('[') else {
        return (key.to_string(), props);
    };
    let name = key[..open].to_string();
    let body = key[open + 1..].trim_end_matches(']');
    for pair in body.split(',') {
        if let Some((k, v)) = pair.split_once('=') {
            let k = k.trim();
            if !k.is_empty() {
                props.insert(k.to_string(), v.trim().to_string());
            }
        }
    }
    (name, props)
}

/// Strips a `namespace:` prefix (`minecraft:stone` -> `stone`).
#[inline]
pub fn bare_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, n)| n)
}
