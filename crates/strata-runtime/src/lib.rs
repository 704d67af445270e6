//! Build workers, request correlation and the chunk mesh pipeline.
#![forbid(unsafe_code)]

pub mod config;
pub mod correlate;
pub mod instancing;
pub mod pipeline;
pub mod pool;
pub mod protocol;

pub use config::{ConfigError, MeshBuildingMode, PipelineConfig};
pub use correlate::{BuildError, BuildOutcome, Correlator};
pub use instancing::{InstanceCache, InstanceKey};
pub use pipeline::{ChunkUpdate, Pipeline, PipelineStats};
pub use pool::{BuildHandle, BuildPool, PoolStats, TransportKind};
pub use protocol::{BuildPayload, MessageKind, RequestId, WorkerReply, WorkerRequest};
