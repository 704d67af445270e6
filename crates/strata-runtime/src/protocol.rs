use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use strata_chunk::ChunkMeshRequest;
use strata_mesh_cpu::{ChunkMeshes, PaletteCache, assemble};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    BuildChunk,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::BuildChunk => "buildChunk",
        }
    }
}

/// Correlates a reply with the request that caused it. Displays as `buildChunk-<n>`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId {
    pub kind: MessageKind,
    pub seq: u64,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.as_str(), self.seq)
    }
}

/// Monotonic id source, one per pool.
#[derive(Debug, Default)]
pub struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    pub fn next(&self, kind: MessageKind) -> RequestId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        RequestId { kind, seq }
    }
}

#[derive(Clone, Debug)]
pub struct BuildPayload {
    pub request: ChunkMeshRequest,
    pub palette: Arc<PaletteCache>,
}

#[derive(Clone, Debug)]
pub struct WorkerRequest {
    pub kind: MessageKind,
    pub request_id: RequestId,
    pub payload: BuildPayload,
}

#[derive(Debug)]
pub enum WorkerReply {
    Data { request_id: RequestId, data: ChunkMeshes },
    Error { request_id: RequestId, error: String },
}

impl WorkerReply {
    pub fn request_id(&self) -> RequestId {
        match self {
            WorkerReply::Data { request_id, .. } | WorkerReply::Error { request_id, .. } => {
                *request_id
            }
        }
    }
}

fn panic_message(p: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Worker side of the protocol: runs one request to a reply, never panicking.
pub fn process_request(msg: WorkerRequest) -> WorkerReply {
    let WorkerRequest {
        kind,
        request_id,
        payload,
    } = msg;
    match kind {
        MessageKind::BuildChunk => {
            let t0 = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| {
                assemble(&payload.request, &payload.palette)
            }));
            let ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
            match result {
                Ok(Ok(data)) => {
                    log::debug!(
                        target: "perf",
                        "ms={} {} chunk={} verts={} tris={}",
                        ms,
                        request_id,
                        payload.request.key,
                        data.vertex_count(),
                        data.triangle_count()
                    );
                    WorkerReply::Data { request_id, data }
                }
                Ok(Err(e)) => WorkerReply::Error {
                    request_id,
                    error: e.to_string(),
                },
                Err(p) => WorkerReply::Error {
                    request_id,
                    error: format!("worker panicked: {}", panic_message(p.as_ref())),
                },
            }
        }
    }
}
