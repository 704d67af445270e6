//! Block mutation tracking and per-chunk rebuild scheduling.
#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet, VecDeque};

use strata_chunk::{ChunkKey, ChunkSideLength, chunk_key_of, local_of};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ChunkState {
    #[default]
    Clean,
    Dirty,
    Building,
}

/// Outcome of reporting a finished build.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The chunk changed after the build was dispatched; it is dirty again.
    Stale,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidatorStats {
    pub tracked: usize,
    pub dirty: usize,
    pub building: usize,
    pub stamp: u64,
}

/// Chunk-aware change tracker.
///
/// Every mutation gets a monotonically increasing stamp recorded as the
/// chunk's revision. A build dispatched at revision `r` only counts when no
/// newer stamp landed on the chunk in the meantime.
pub struct Invalidator {
    side: ChunkSideLength,
    rev: HashMap<ChunkKey, u64>,
    built: HashMap<ChunkKey, u64>,
    inflight: HashMap<ChunkKey, u64>,
    dirty: HashSet<ChunkKey>,
    queue: VecDeque<ChunkKey>,
    counter: u64,
}

impl Invalidator {
    pub fn new(side: ChunkSideLength) -> Self {
        Self {
            side,
            rev: HashMap::new(),
            built: HashMap::new(),
            inflight: HashMap::new(),
            dirty: HashSet::new(),
            queue: VecDeque::new(),
            counter: 0,
        }
    }

    pub fn side(&self) -> ChunkSideLength {
        self.side
    }

    fn next_stamp(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(1).max(1);
        self.counter
    }

    fn mark_with(&mut self, key: ChunkKey, stamp: u64) {
        self.rev.insert(key, stamp);
        if self.dirty.insert(key) {
            self.queue.push_back(key);
        }
    }

    /// Chunks whose mesh can change when the cell at `(x,y,z)` changes: the
    /// owner plus the face neighbor across every boundary plane the cell sits on.
    pub fn affected_chunks(&self, x: i32, y: i32, z: i32) -> Vec<ChunkKey> {
        let key = chunk_key_of(x, y, z, self.side);
        let (lx, ly, lz) = local_of(x, y, z, self.side);
        let last = self.side.get() as i32 - 1;
        let mut out = vec![key];
        for (axis, l) in [lx, ly, lz].into_iter().enumerate() {
            let mut step = |d: i32| {
                let mut delta = [0; 3];
                delta[axis] = d;
                let n = key.offset(delta[0], delta[1], delta[2]);
                if !out.contains(&n) {
                    out.push(n);
                }
            };
            if l == 0 {
                step(-1);
            }
            if l == last {
                step(1);
            }
        }
        out
    }

    /// Records a mutation of one cell. Returns the stamp given to every affected chunk.
    pub fn on_block_changed(&mut self, x: i32, y: i32, z: i32) -> u64 {
        let stamp = self.next_stamp();
        let affected = self.affected_chunks(x, y, z);
        log::trace!(target: "edit", "block ({},{},{}) changed stamp={} chunks={}", x, y, z, stamp, affected.len());
        for key in affected {
            self.mark_with(key, stamp);
        }
        stamp
    }

    /// Marks a single chunk for rebuild, e.g. after a definition reload.
    pub fn mark_dirty(&mut self, key: ChunkKey) -> u64 {
        let stamp = self.next_stamp();
        self.mark_with(key, stamp);
        stamp
    }

    /// Hands out up to `limit` dirty chunks that have no build in flight,
    /// moving them to `Building`. Each comes with the revision it is built at.
    pub fn take_dirty(&mut self, limit: usize) -> Vec<(ChunkKey, u64)> {
        let mut out = Vec::new();
        let mut deferred = Vec::new();
        while out.len() < limit {
            let Some(key) = self.queue.pop_front() else {
                break;
            };
            if !self.dirty.contains(&key) {
                continue;
            }
            if self.inflight.contains_key(&key) {
                deferred.push(key);
                continue;
            }
            let rev = self.get_rev(key);
            self.dirty.remove(&key);
            self.inflight.insert(key, rev);
            out.push((key, rev));
        }
        // Still dirty but waiting on an older build; keep their queue position.
        for key in deferred.into_iter().rev() {
            self.queue.push_front(key);
        }
        out
    }

    /// Reports a finished build of `key` made at revision `rev`.
    pub fn complete(&mut self, key: ChunkKey, rev: u64) -> Completion {
        if self.inflight.get(&key) == Some(&rev) {
            self.inflight.remove(&key);
        }
        if rev >= self.get_rev(key) {
            let e = self.built.entry(key).or_insert(0);
            if rev > *e {
                *e = rev;
            }
            Completion::Applied
        } else {
            log::debug!(target: "edit", "stale build for chunk {} rev={} current={}", key, rev, self.get_rev(key));
            if self.dirty.insert(key) {
                self.queue.push_back(key);
            }
            Completion::Stale
        }
    }

    /// A build of `key` failed; the chunk goes back to dirty.
    pub fn fail(&mut self, key: ChunkKey) {
        self.inflight.remove(&key);
        if self.dirty.insert(key) {
            self.queue.push_back(key);
        }
    }

    /// Drops every trace of `key`, e.g. when its chunk no longer exists.
    pub fn forget(&mut self, key: ChunkKey) {
        self.rev.remove(&key);
        self.built.remove(&key);
        self.inflight.remove(&key);
        self.dirty.remove(&key);
    }

    pub fn state(&self, key: ChunkKey) -> ChunkState {
        if self.inflight.contains_key(&key) {
            if self.dirty.contains(&key) {
                // a newer mutation landed mid-build
                ChunkState::Dirty
            } else {
                ChunkState::Building
            }
        } else if self.dirty.contains(&key) {
            ChunkState::Dirty
        } else {
            ChunkState::Clean
        }
    }

    pub fn get_rev(&self, key: ChunkKey) -> u64 {
        self.rev.get(&key).copied().unwrap_or(0)
    }

    pub fn get_built_rev(&self, key: ChunkKey) -> u64 {
        self.built.get(&key).copied().unwrap_or(0)
    }

    pub fn needs_rebuild(&self, key: ChunkKey) -> bool {
        self.get_rev(key) > self.get_built_rev(key)
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty() || !self.inflight.is_empty()
    }

    pub fn stats(&self) -> InvalidatorStats {
        InvalidatorStats {
            tracked: self.rev.len(),
            dirty: self.dirty.len(),
            building: self.inflight.len(),
            stamp: self.counter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv() -> Invalidator {
        Invalidator::new(ChunkSideLength::new(16).unwrap())
    }

    #[test]
    fn boundary_cells_touch_face_neighbors_only() {
        let inv = inv();
        assert_eq!(inv.affected_chunks(5, 5, 5).len(), 1);
        assert_eq!(inv.affected_chunks(15, 5, 5).len(), 2);
        assert_eq!(inv.affected_chunks(15, 0, 5).len(), 3);
        let corner = inv.affected_chunks(0, 15, 16);
        assert_eq!(corner.len(), 4);
        for n in [
            ChunkKey::new(0, 0, 1),
            ChunkKey::new(-1, 0, 1),
            ChunkKey::new(0, 1, 1),
            ChunkKey::new(0, 0, 0),
        ] {
            assert!(corner.contains(&n), "missing {n}");
        }
        assert!(!corner.contains(&ChunkKey::new(-1, 1, 1)));
    }

    #[test]
    fn unit_chunks_touch_all_six_neighbors() {
        let inv = Invalidator::new(ChunkSideLength::new(1).unwrap());
        let affected = inv.affected_chunks(3, -2, 0);
        assert_eq!(affected.len(), 7);
        assert_eq!(affected[0], ChunkKey::new(3, -2, 0));
        for n in [
            ChunkKey::new(2, -2, 0),
            ChunkKey::new(4, -2, 0),
            ChunkKey::new(3, -3, 0),
            ChunkKey::new(3, -1, 0),
            ChunkKey::new(3, -2, -1),
            ChunkKey::new(3, -2, 1),
        ] {
            assert!(affected.contains(&n), "missing {n}");
        }
    }

    #[test]
    fn negative_coordinates_use_floored_chunks() {
        let inv = inv();
        let a = inv.affected_chunks(-1, 3, 3);
        assert_eq!(a, vec![ChunkKey::new(-1, 0, 0), ChunkKey::new(0, 0, 0)]);
    }

    #[test]
    fn repeated_mutations_coalesce() {
        let mut inv = inv();
        inv.on_block_changed(3, 3, 3);
        inv.on_block_changed(4, 3, 3);
        let s = inv.on_block_changed(5, 3, 3);
        let taken = inv.take_dirty(16);
        assert_eq!(taken, vec![(ChunkKey::new(0, 0, 0), s)]);
        assert!(inv.take_dirty(16).is_empty());
    }

    #[test]
    fn lifecycle_and_stale_completion() {
        let mut inv = inv();
        let k = ChunkKey::new(0, 0, 0);
        assert_eq!(inv.state(k), ChunkState::Clean);
        inv.on_block_changed(1, 1, 1);
        assert_eq!(inv.state(k), ChunkState::Dirty);
        let (_, rev) = inv.take_dirty(1)[0];
        assert_eq!(inv.state(k), ChunkState::Building);

        // mutation mid-build: dirty again, but not handed out while in flight
        inv.on_block_changed(2, 2, 2);
        assert_eq!(inv.state(k), ChunkState::Dirty);
        assert!(inv.take_dirty(8).is_empty());

        assert_eq!(inv.complete(k, rev), Completion::Stale);
        let (_, rev2) = inv.take_dirty(8)[0];
        assert!(rev2 > rev);
        assert_eq!(inv.complete(k, rev2), Completion::Applied);
        assert_eq!(inv.state(k), ChunkState::Clean);
        assert!(!inv.needs_rebuild(k));
        assert!(!inv.has_pending());
    }

    #[test]
    fn failure_requeues_and_forget_clears() {
        let mut inv = inv();
        let k = ChunkKey::new(2, 0, 0);
        inv.mark_dirty(k);
        assert_eq!(inv.take_dirty(4).len(), 1);
        inv.fail(k);
        assert_eq!(inv.state(k), ChunkState::Dirty);
        inv.forget(k);
        assert_eq!(inv.state(k), ChunkState::Clean);
        assert!(inv.take_dirty(4).is_empty());
        assert_eq!(inv.stats().tracked, 0);
    }
}
