use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use strata_blocks::BlockData;
use strata_chunk::BlockGrid;

// Grid description file
#[derive(Deserialize, Debug, Default)]
pub struct GridFile {
    #[serde(default)]
    pub schematic_id: String,
    #[serde(default)]
    pub blocks: Vec<BlockEntry>,
    #[serde(default)]
    pub fill: Vec<FillEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BlockEntry {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    #[serde(default)]
    pub properties: Option<BTreeMap<String, String>>,
}

/// Inclusive box of one block state.
#[derive(Deserialize, Debug, Clone)]
pub struct FillEntry {
    pub name: String,
    pub from: [i32; 3],
    pub to: [i32; 3],
    #[serde(default)]
    pub properties: Option<BTreeMap<String, String>>,
}

#[derive(Debug)]
pub enum GridFileError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    EmptyFill { name: String },
}

impl fmt::Display for GridFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridFileError::Io(e) => write!(f, "reading grid file: {}", e),
            GridFileError::Parse(e) => write!(f, "parsing grid file: {}", e),
            GridFileError::EmptyFill { name } => {
                write!(f, "fill of '{}' has a 'to' corner below its 'from' corner", name)
            }
        }
    }
}

impl std::error::Error for GridFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GridFileError::Io(e) => Some(e),
            GridFileError::Parse(e) => Some(e),
            GridFileError::EmptyFill { .. } => None,
        }
    }
}

impl GridFile {
    pub fn from_toml_str(s: &str) -> Result<Self, GridFileError> {
        toml::from_str(s).map_err(GridFileError::Parse)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GridFileError> {
        let s = fs::read_to_string(path).map_err(GridFileError::Io)?;
        Self::from_toml_str(&s)
    }

    /// Fills first, then single blocks, so blocks overwrite filled cells.
    pub fn into_grid(self) -> Result<BlockGrid, GridFileError> {
        let mut grid = BlockGrid::new(self.schematic_id);
        for f in self.fill {
            if (0..3).any(|a| f.to[a] < f.from[a]) {
                return Err(GridFileError::EmptyFill { name: f.name });
            }
            let proto = BlockData::new(f.name, f.from[0], f.from[1], f.from[2], f.properties);
            for y in f.from[1]..=f.to[1] {
                for z in f.from[2]..=f.to[2] {
                    for x in f.from[0]..=f.to[0] {
                        grid.set(proto.moved_to(x, y, z));
                    }
                }
            }
        }
        for b in self.blocks {
            grid.set(BlockData::new(b.name, b.x, b.y, b.z, b.properties));
        }
        Ok(grid)
    }
}
