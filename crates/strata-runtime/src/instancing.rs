use std::sync::Arc;

use hashbrown::HashMap;
use strata_chunk::{ChunkKey, ChunkMeshRequest};
use strata_mesh_cpu::ChunkMeshes;

/// Everything that determines a chunk's geometry, expressed relative to its origin.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    extent: [u32; 3],
    bounds: Option<([i32; 3], [i32; 3])>,
    blocks: Vec<(i32, i32, i32, String)>,
    halo: Vec<(i32, i32, i32, String)>,
}

impl InstanceKey {
    pub fn of(req: &ChunkMeshRequest) -> Self {
        let [ox, oy, oz] = req.origin();
        let rel = |cells: &[strata_blocks::BlockData]| {
            let mut v: Vec<(i32, i32, i32, String)> = cells
                .iter()
                .map(|b| (b.x - ox, b.y - oy, b.z - oz, b.state_key.clone()))
                .collect();
            v.sort_unstable();
            v
        };
        let bounds = req.rendering_bounds.map(|b| {
            (
                [b.min[0] - ox, b.min[1] - oy, b.min[2] - oz],
                [b.max[0] - ox, b.max[1] - oy, b.max[2] - oz],
            )
        });
        Self {
            extent: [req.width, req.height, req.depth],
            bounds,
            blocks: rel(&req.blocks),
            halo: rel(&req.halo),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Content-addressed store of built chunk meshes for instanced building.
///
/// Each chunk is bound to the layout it currently shows; a layout is dropped
/// once no chunk is bound to it.
#[derive(Default)]
pub struct InstanceCache {
    by_layout: HashMap<InstanceKey, Shared>,
    by_chunk: HashMap<ChunkKey, InstanceKey>,
    hits: usize,
}

struct Shared {
    owner: ChunkKey,
    meshes: Arc<ChunkMeshes>,
    users: usize,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chunk that first produced this layout, and its meshes.
    pub fn lookup(&mut self, key: &InstanceKey) -> Option<(ChunkKey, Arc<ChunkMeshes>)> {
        let hit = self
            .by_layout
            .get(key)
            .map(|s| (s.owner, Arc::clone(&s.meshes)));
        if hit.is_some() {
            self.hits += 1;
        }
        hit
    }

    /// Stores freshly built meshes and binds `owner` to them.
    pub fn insert(&mut self, key: InstanceKey, owner: ChunkKey, meshes: Arc<ChunkMeshes>) {
        self.by_layout.entry(key.clone()).or_insert(Shared {
            owner,
            meshes,
            users: 0,
        });
        self.bind(owner, key);
    }

    /// Records that `chunk` now shows `key`, releasing whatever it showed before.
    pub fn bind(&mut self, chunk: ChunkKey, key: InstanceKey) {
        if self.by_chunk.get(&chunk) == Some(&key) {
            return;
        }
        let Some(shared) = self.by_layout.get_mut(&key) else {
            return;
        };
        shared.users += 1;
        if let Some(old) = self.by_chunk.insert(chunk, key) {
            self.release(&old);
        }
    }

    /// Forgets `chunk`'s binding, e.g. when it is rebuilt outside the cache.
    pub fn unbind(&mut self, chunk: ChunkKey) {
        if let Some(old) = self.by_chunk.remove(&chunk) {
            self.release(&old);
        }
    }

    fn release(&mut self, key: &InstanceKey) {
        let Some(shared) = self.by_layout.get_mut(key) else {
            return;
        };
        shared.users = shared.users.saturating_sub(1);
        if shared.users == 0 {
            self.by_layout.remove(key);
            log::trace!(target: "pipeline", "evicted instance layout; {} left", self.by_layout.len());
        }
    }

    pub fn clear(&mut self) {
        self.by_layout.clear();
        self.by_chunk.clear();
    }

    pub fn len(&self) -> usize {
        self.by_layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_layout.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}
