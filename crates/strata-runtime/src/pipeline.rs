use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::{HashMap, HashSet};
use strata_blocks::{BlockData, BlockDefinitionProvider, DefinitionBaker};
use strata_chunk::{
    BlockGridSource, ChunkKey, ChunkMeshRequest, ChunkSideLength, chunk_key_of, gather_chunk,
};
use strata_edit::{Completion, Invalidator, InvalidatorStats};
use strata_mesh_cpu::{ChunkMeshes, PaletteCache};

use crate::config::{ConfigError, MeshBuildingMode, PipelineConfig};
use crate::correlate::{BuildError, BuildOutcome, BuildResult};
use crate::instancing::{InstanceCache, InstanceKey};
use crate::pool::{BuildHandle, BuildPool, PoolStats, TransportKind};

/// A chunk whose meshes changed.
#[derive(Clone, Debug)]
pub struct ChunkUpdate {
    pub key: ChunkKey,
    pub meshes: Arc<ChunkMeshes>,
    /// Set when the meshes were reused from an identical chunk.
    pub instance_of: Option<ChunkKey>,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct PipelineStats {
    pub known_chunks: usize,
    pub meshed_chunks: usize,
    pub in_flight: usize,
    pub palette_entries: usize,
    pub materials: usize,
    pub epoch: u64,
    pub instance_hits: usize,
    /// Distinct layouts still shown by some chunk.
    pub instance_layouts: usize,
    pub invalidator: InvalidatorStats,
    pub pool: PoolStats,
}

struct InflightBuild {
    handle: BuildHandle,
    rev: u64,
    epoch: u64,
    layout: Option<InstanceKey>,
}

/// Ties the grid, definitions, palette, invalidator and build pool together.
pub struct Pipeline {
    config: PipelineConfig,
    side: ChunkSideLength,
    baker: DefinitionBaker,
    palette: Arc<PaletteCache>,
    epoch: u64,
    invalidator: Invalidator,
    pool: BuildPool,
    inflight: HashMap<ChunkKey, InflightBuild>,
    meshes: HashMap<ChunkKey, Arc<ChunkMeshes>>,
    known: HashSet<ChunkKey>,
    instances: InstanceCache,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn BlockDefinitionProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let side = config.side()?;
        let workers = config.resolved_workers();
        let pool = BuildPool::new(workers);
        log::info!(
            target: "pipeline",
            "pipeline side={} mode={} transport={:?}",
            side.get(),
            config.mesh_building_mode,
            pool.transport_kind()
        );
        Ok(Self {
            config,
            side,
            baker: DefinitionBaker::new(provider),
            palette: Arc::new(PaletteCache::new()),
            epoch: 0,
            invalidator: Invalidator::new(side),
            pool,
            inflight: HashMap::new(),
            meshes: HashMap::new(),
            known: HashSet::new(),
            instances: InstanceCache::new(),
        })
    }

    pub fn mode(&self) -> MeshBuildingMode {
        self.config.mesh_building_mode
    }

    pub fn side(&self) -> ChunkSideLength {
        self.side
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.pool.transport_kind()
    }

    pub fn palette(&self) -> &Arc<PaletteCache> {
        &self.palette
    }

    pub fn mesh(&self, key: ChunkKey) -> Option<Arc<ChunkMeshes>> {
        self.meshes.get(&key).cloned()
    }

    pub fn known_chunks(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.known.iter().copied()
    }

    /// Adds palette entries for any state not seen yet. Copies the shared
    /// palette only when something is actually new.
    fn ensure_states<'a>(&mut self, blocks: impl IntoIterator<Item = &'a BlockData>) {
        for b in blocks {
            if self.palette.index_of(&b.state_key).is_some() {
                continue;
            }
            let def = self.baker.bake(&b.state_key);
            let render_type = self.baker.render_type(&b.name);
            let emission = self.baker.light_emission(&b.name);
            Arc::make_mut(&mut self.palette).ensure(&b.state_key, &b.name, &def, render_type, emission);
        }
    }

    /// Full palette scan of `grid`; returns every chunk holding a block.
    fn scan<G: BlockGridSource + ?Sized>(&mut self, grid: &G) -> HashSet<ChunkKey> {
        let t0 = Instant::now();
        let mut states: HashMap<String, BlockData> = HashMap::new();
        let mut keys = HashSet::new();
        grid.for_each_block(&mut |b| {
            keys.insert(chunk_key_of(b.x, b.y, b.z, self.side));
            if !states.contains_key(&b.state_key) {
                states.insert(b.state_key.clone(), b.clone());
            }
        });
        let mut sorted: Vec<BlockData> = states.into_values().collect();
        sorted.sort_by(|a, b| a.state_key.cmp(&b.state_key));
        self.ensure_states(sorted.iter());
        Arc::make_mut(&mut self.palette).mark_ready();
        log::info!(
            target: "perf",
            "ms={} palette_scan entries={} materials={} chunks={}",
            t0.elapsed().as_millis(),
            self.palette.len(),
            self.palette.global_materials().len(),
            keys.len()
        );
        keys
    }

    /// Scans the grid and either builds everything now (`immediate`) or
    /// schedules every chunk for the following pumps.
    pub fn load<G: BlockGridSource + ?Sized>(&mut self, grid: &G) -> Vec<ChunkUpdate> {
        let keys = self.scan(grid);
        self.known.extend(keys.iter().copied());
        match self.mode() {
            MeshBuildingMode::Immediate => self.build_all_now(grid, keys),
            MeshBuildingMode::Incremental | MeshBuildingMode::Instanced => {
                let mut keys: Vec<ChunkKey> = keys.into_iter().collect();
                keys.sort_unstable();
                for key in keys {
                    self.invalidator.mark_dirty(key);
                }
                Vec::new()
            }
        }
    }

    fn build_all_now<G: BlockGridSource + ?Sized>(
        &mut self,
        grid: &G,
        keys: HashSet<ChunkKey>,
    ) -> Vec<ChunkUpdate> {
        let t0 = Instant::now();
        let mut keys: Vec<ChunkKey> = keys.into_iter().collect();
        keys.sort_unstable();
        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            let req = self.prepare_request(grid, key);
            handles.push(self.pool.build(req, Arc::clone(&self.palette)));
        }
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let key = handle.key();
            match handle.wait() {
                Ok(BuildOutcome::Built(m)) => {
                    let meshes = Arc::new(m);
                    self.meshes.insert(key, Arc::clone(&meshes));
                    out.push(ChunkUpdate {
                        key,
                        meshes,
                        instance_of: None,
                    });
                }
                Ok(BuildOutcome::Superseded) => {}
                Err(e) => log::warn!(target: "pipeline", "chunk {} failed: {}", key, e),
            }
        }
        log::info!(target: "perf", "ms={} immediate_build chunks={}", t0.elapsed().as_millis(), out.len());
        out
    }

    /// Gathers blocks and halo for `key` and ships the definitions they need.
    pub fn prepare_request<G: BlockGridSource + ?Sized>(
        &mut self,
        grid: &G,
        key: ChunkKey,
    ) -> ChunkMeshRequest {
        let mut req = gather_chunk(grid, key, self.side);
        self.ensure_states(req.blocks.iter().chain(req.halo.iter()));
        {
            let mut seen: HashSet<&str> = HashSet::new();
            for b in &req.blocks {
                if seen.insert(b.state_key.as_str()) {
                    req.defs.push((b.state_key.clone(), self.baker.bake(&b.state_key)));
                }
            }
        }
        req.palette_epoch = self.epoch;
        req
    }

    /// Raw entry point: builds a prepared request against the current palette.
    pub fn build_chunk_mesh(&self, request: ChunkMeshRequest) -> BuildHandle {
        self.pool.build(request, Arc::clone(&self.palette))
    }

    /// Records a mutation. The grid must already reflect it when the next pump runs.
    pub fn notify_block_changed(&mut self, x: i32, y: i32, z: i32) -> u64 {
        self.known.insert(chunk_key_of(x, y, z, self.side));
        self.invalidator.on_block_changed(x, y, z)
    }

    fn collect_finished(&mut self, out: &mut Vec<ChunkUpdate>) {
        let finished: Vec<(ChunkKey, BuildResult)> = self
            .inflight
            .iter()
            .filter_map(|(k, b)| b.handle.try_take().map(|r| (*k, r)))
            .collect();
        for (key, result) in finished {
            let Some(build) = self.inflight.remove(&key) else {
                continue;
            };
            match result {
                Ok(BuildOutcome::Built(m)) => {
                    if build.epoch != self.epoch {
                        log::debug!(target: "pipeline", "discarding chunk {} from epoch {}", key, build.epoch);
                        self.invalidator.fail(key);
                        continue;
                    }
                    match self.invalidator.complete(key, build.rev) {
                        Completion::Applied => {
                            let meshes = Arc::new(m);
                            if let Some(layout) = build.layout {
                                self.instances.insert(layout, key, Arc::clone(&meshes));
                            }
                            self.meshes.insert(key, Arc::clone(&meshes));
                            out.push(ChunkUpdate {
                                key,
                                meshes,
                                instance_of: None,
                            });
                        }
                        Completion::Stale => {}
                    }
                }
                Ok(BuildOutcome::Superseded) => self.invalidator.fail(key),
                Err(BuildError::Disposed) => {}
                Err(BuildError::Worker(e)) => {
                    log::warn!(target: "pipeline", "chunk {} build failed: {}", key, e);
                    // Settle it; a later edit to the chunk schedules a retry.
                    self.invalidator.complete(key, build.rev);
                }
            }
        }
    }

    fn dispatch<G: BlockGridSource + ?Sized>(&mut self, grid: &G, out: &mut Vec<ChunkUpdate>) {
        let batch = self.invalidator.take_dirty(self.config.max_dispatch_per_pump);
        let mut building: HashSet<InstanceKey> = self
            .inflight
            .values()
            .filter_map(|b| b.layout.clone())
            .collect();
        for (key, rev) in batch {
            let req = self.prepare_request(grid, key);
            let layout = match self.mode() {
                MeshBuildingMode::Instanced => Some(InstanceKey::of(&req)),
                _ => None,
            };
            if let Some(layout) = &layout {
                if let Some((owner, meshes)) = self.instances.lookup(layout) {
                    if self.invalidator.complete(key, rev) == Completion::Applied {
                        self.instances.bind(key, layout.clone());
                        self.meshes.insert(key, Arc::clone(&meshes));
                        out.push(ChunkUpdate {
                            key,
                            meshes,
                            instance_of: (owner != key).then_some(owner),
                        });
                    }
                    continue;
                }
                if !building.insert(layout.clone()) {
                    // Same contents already building; pick it up from the cache next pump.
                    self.invalidator.fail(key);
                    continue;
                }
            }
            let handle = self.pool.build(req, Arc::clone(&self.palette));
            self.inflight.insert(
                key,
                InflightBuild {
                    handle,
                    rev,
                    epoch: self.epoch,
                    layout,
                },
            );
        }
    }

    /// Collects finished builds, dispatches dirty chunks, then collects again
    /// so inline builds surface in the same call.
    pub fn pump<G: BlockGridSource + ?Sized>(&mut self, grid: &G) -> Vec<ChunkUpdate> {
        let mut out = Vec::new();
        if self.pool.is_disposed() {
            return out;
        }
        self.collect_finished(&mut out);
        self.dispatch(grid, &mut out);
        self.collect_finished(&mut out);
        out
    }

    /// Pumps until nothing is dirty or in flight, or `timeout` passes.
    pub fn run_until_idle<G: BlockGridSource + ?Sized>(
        &mut self,
        grid: &G,
        timeout: Duration,
    ) -> Vec<ChunkUpdate> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        loop {
            out.extend(self.pump(grid));
            if self.is_idle() || Instant::now() >= deadline || self.pool.is_disposed() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        out
    }

    /// Swaps the definition provider. Starts a new palette epoch, rebuilds
    /// the palette from `grid` and schedules every known chunk.
    pub fn reload_definitions<G: BlockGridSource + ?Sized>(
        &mut self,
        provider: Arc<dyn BlockDefinitionProvider>,
        grid: &G,
    ) {
        self.baker.replace_provider(provider);
        self.epoch += 1;
        self.palette = Arc::new(PaletteCache::with_epoch(self.epoch));
        self.instances.clear();
        let keys = self.scan(grid);
        self.known.extend(keys);
        let mut keys: Vec<ChunkKey> = self.known.iter().copied().collect();
        keys.sort_unstable();
        for key in keys {
            self.invalidator.mark_dirty(key);
        }
        log::info!(target: "pipeline", "definitions reloaded epoch={} chunks={}", self.epoch, self.known.len());
    }

    pub fn is_idle(&self) -> bool {
        self.inflight.is_empty() && !self.invalidator.has_pending()
    }

    pub fn dispose(&mut self) {
        self.pool.dispose();
        self.inflight.clear();
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            known_chunks: self.known.len(),
            meshed_chunks: self.meshes.len(),
            in_flight: self.inflight.len(),
            palette_entries: self.palette.len(),
            materials: self.palette.global_materials().len(),
            epoch: self.epoch,
            instance_hits: self.instances.hits(),
            instance_layouts: self.instances.len(),
            invalidator: self.invalidator.stats(),
            pool: self.pool.stats(),
        }
    }
}
