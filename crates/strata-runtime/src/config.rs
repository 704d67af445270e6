use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strata_chunk::{ChunkSideLength, InvalidSideLength};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshBuildingMode {
    /// Build every chunk synchronously during load.
    Immediate,
    /// Mark chunks dirty and build them over successive pumps.
    #[default]
    Incremental,
    /// Like incremental, reusing meshes of chunks with identical contents.
    Instanced,
}

impl MeshBuildingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MeshBuildingMode::Immediate => "immediate",
            MeshBuildingMode::Incremental => "incremental",
            MeshBuildingMode::Instanced => "instanced",
        }
    }
}

impl fmt::Display for MeshBuildingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeshBuildingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(MeshBuildingMode::Immediate),
            "incremental" => Ok(MeshBuildingMode::Incremental),
            "instanced" => Ok(MeshBuildingMode::Instanced),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    ChunkSideLength(InvalidSideLength),
    UnknownMode(String),
    ZeroDispatch,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config read error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::ChunkSideLength(e) => write!(f, "{e}"),
            ConfigError::UnknownMode(m) => write!(
                f,
                "unknown mesh building mode '{m}' (expected immediate, incremental or instanced)"
            ),
            ConfigError::ZeroDispatch => f.write_str("max_dispatch_per_pump must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::ChunkSideLength(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InvalidSideLength> for ConfigError {
    fn from(e: InvalidSideLength) -> Self {
        ConfigError::ChunkSideLength(e)
    }
}

fn default_side() -> i64 {
    16
}

fn default_dispatch() -> usize {
    64
}

/// Pipeline settings as read from `strata.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_side")]
    pub chunk_side_length: i64,
    #[serde(default)]
    pub mesh_building_mode: MeshBuildingMode,
    /// `None` picks one less than the available parallelism; `0` builds inline.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_dispatch")]
    pub max_dispatch_per_pump: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_side_length: default_side(),
            mesh_building_mode: MeshBuildingMode::default(),
            workers: None,
            max_dispatch_per_pump: default_dispatch(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: PipelineConfig = toml::from_str(s).map_err(ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&s)
    }

    pub fn side(&self) -> Result<ChunkSideLength, ConfigError> {
        Ok(ChunkSideLength::new(self.chunk_side_length)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.side()?;
        if self.max_dispatch_per_pump == 0 {
            return Err(ConfigError::ZeroDispatch);
        }
        Ok(())
    }

    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1)
        })
    }
}
