use std::fmt;

use crossbeam_channel::{Receiver, Sender, bounded};
use hashbrown::HashMap;
use strata_chunk::ChunkKey;
use strata_mesh_cpu::ChunkMeshes;

use crate::protocol::{RequestId, WorkerReply};

#[derive(Debug)]
pub enum BuildOutcome {
    Built(ChunkMeshes),
    /// A newer build for the same chunk was dispatched before this one finished.
    Superseded,
}

impl BuildOutcome {
    pub fn is_superseded(&self) -> bool {
        matches!(self, BuildOutcome::Superseded)
    }

    pub fn into_meshes(self) -> Option<ChunkMeshes> {
        match self {
            BuildOutcome::Built(m) => Some(m),
            BuildOutcome::Superseded => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    Worker(String),
    Disposed,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Worker(e) => write!(f, "chunk build failed: {e}"),
            BuildError::Disposed => f.write_str("build pool disposed"),
        }
    }
}

impl std::error::Error for BuildError {}

pub type BuildResult = Result<BuildOutcome, BuildError>;

struct Pending {
    key: ChunkKey,
    tx: Sender<BuildResult>,
}

/// Matches worker replies to waiting handles by request id.
///
/// Each id resolves exactly once and is removed on resolution. Only the
/// newest request per chunk key stays pending; registering a newer one
/// resolves the older handle as superseded.
#[derive(Default)]
pub struct Correlator {
    pending: HashMap<RequestId, Pending>,
    latest: HashMap<ChunkKey, RequestId>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: RequestId, key: ChunkKey) -> Receiver<BuildResult> {
        let (tx, rx) = bounded(1);
        if let Some(old) = self.latest.insert(key, id) {
            if let Some(p) = self.pending.remove(&old) {
                log::trace!(target: "pool", "{} superseded by {} for chunk {}", old, id, key);
                let _ = p.tx.send(Ok(BuildOutcome::Superseded));
            }
        }
        self.pending.insert(id, Pending { key, tx });
        rx
    }

    /// Fulfills the handle waiting on `reply`. Returns false for ids that are
    /// no longer pending (superseded or rejected).
    pub fn resolve(&mut self, reply: WorkerReply) -> bool {
        let id = reply.request_id();
        let Some(p) = self.pending.remove(&id) else {
            log::trace!(target: "pool", "dropping reply for {}", id);
            return false;
        };
        if self.latest.get(&p.key) == Some(&id) {
            self.latest.remove(&p.key);
        }
        let result = match reply {
            WorkerReply::Data { data, .. } => Ok(BuildOutcome::Built(data)),
            WorkerReply::Error { error, .. } => Err(BuildError::Worker(error)),
        };
        let _ = p.tx.send(result);
        true
    }

    pub fn reject_all(&mut self, err: BuildError) {
        for (_, p) in self.pending.drain() {
            let _ = p.tx.send(Err(err.clone()));
        }
        self.latest.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageKind, RequestIds};

    fn data(key: ChunkKey, id: RequestId) -> WorkerReply {
        WorkerReply::Data {
            request_id: id,
            data: ChunkMeshes {
                key,
                ..ChunkMeshes::default()
            },
        }
    }

    #[test]
    fn out_of_order_replies_reach_their_handles() {
        let ids = RequestIds::default();
        let mut c = Correlator::new();
        let (ka, kb, kc) = (ChunkKey::new(0, 0, 0), ChunkKey::new(1, 0, 0), ChunkKey::new(2, 0, 0));
        let (a, b, cc) = (
            ids.next(MessageKind::BuildChunk),
            ids.next(MessageKind::BuildChunk),
            ids.next(MessageKind::BuildChunk),
        );
        let ra = c.register(a, ka);
        let rb = c.register(b, kb);
        let rc = c.register(cc, kc);
        assert!(c.resolve(data(kc, cc)));
        assert!(c.resolve(WorkerReply::Error {
            request_id: a,
            error: "boom".into(),
        }));
        assert!(c.resolve(data(kb, b)));
        assert_eq!(c.pending_len(), 0);

        assert_eq!(ra.recv().unwrap().unwrap_err(), BuildError::Worker("boom".into()));
        let mb = rb.recv().unwrap().unwrap().into_meshes().unwrap();
        assert_eq!(mb.key, kb);
        let mc = rc.recv().unwrap().unwrap().into_meshes().unwrap();
        assert_eq!(mc.key, kc);
        // resolving twice is a no-op
        assert!(!c.resolve(data(kc, cc)));
    }

    #[test]
    fn newer_request_supersedes_older() {
        let ids = RequestIds::default();
        let mut c = Correlator::new();
        let k = ChunkKey::new(3, 1, 0);
        let old = ids.next(MessageKind::BuildChunk);
        let new = ids.next(MessageKind::BuildChunk);
        let r_old = c.register(old, k);
        let r_new = c.register(new, k);
        assert!(matches!(r_old.recv().unwrap(), Ok(BuildOutcome::Superseded)));
        // the late reply for the old id is dropped
        assert!(!c.resolve(data(k, old)));
        assert!(c.resolve(data(k, new)));
        assert!(r_new.recv().unwrap().unwrap().into_meshes().is_some());
    }

    #[test]
    fn reject_all_fails_every_pending_handle() {
        let ids = RequestIds::default();
        let mut c = Correlator::new();
        let rxs: Vec<_> = (0..4)
            .map(|i| c.register(ids.next(MessageKind::BuildChunk), ChunkKey::new(i, 0, 0)))
            .collect();
        c.reject_all(BuildError::Disposed);
        for rx in rxs {
            assert_eq!(rx.recv().unwrap().unwrap_err(), BuildError::Disposed);
        }
        assert_eq!(c.pending_len(), 0);
    }
}
