use std::fmt;

use strata_blocks::Category;

/// A malformed build request. Fails only the request that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshError {
    OutsideChunk { x: i32, y: i32, z: i32 },
    DuplicateBlock { x: i32, y: i32, z: i32 },
    MissingPaletteEntry { state_key: String },
    MissingDefinition { state_key: String },
    TooManyMaterials { category: Category },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::OutsideChunk { x, y, z } => {
                write!(f, "block at ({x},{y},{z}) lies outside the chunk extent")
            }
            MeshError::DuplicateBlock { x, y, z } => {
                write!(f, "more than one block at ({x},{y},{z})")
            }
            MeshError::MissingPaletteEntry { state_key } => {
                write!(f, "no palette entry for '{state_key}'")
            }
            MeshError::MissingDefinition { state_key } => {
                write!(f, "request carries no baked definition for '{state_key}'")
            }
            MeshError::TooManyMaterials { category } => {
                write!(f, "more than 256 materials in category {category}")
            }
        }
    }
}

impl std::error::Error for MeshError {}
