//! Block identity, baked block geometry, classification and the definition baker.
#![forbid(unsafe_code)]

pub mod baked;
pub mod baker;
pub mod classify;
pub mod config;
pub mod face;
pub mod material;
pub mod provider;
pub mod types;

pub use baked::{BakedBlockDef, BakedFace, MODEL_UNITS};
pub use baker::DefinitionBaker;
pub use classify::{ClassifyHints, classify};
pub use face::Face;
pub use material::{Material, MaterialCatalog};
pub use provider::{BlockDefinitionProvider, DefinitionError, TomlDefinitions};
pub use types::{BlockData, Category, RenderType, canonical_state_key, parse_state_key};
