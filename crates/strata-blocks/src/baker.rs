use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::baked::BakedBlockDef;
use crate::provider::BlockDefinitionProvider;
use crate::types::RenderType;

/// Caches baked definitions by state key for the lifetime of a provider.
///
/// The cache is only ever dropped as a whole, when the provider (the loaded
/// resource pack set) is swapped.
pub struct DefinitionBaker {
    provider: RwLock<Arc<dyn BlockDefinitionProvider>>,
    cache: RwLock<HashMap<String, Arc<BakedBlockDef>>>,
    missing: Arc<BakedBlockDef>,
    generation: AtomicU64,
}

impl DefinitionBaker {
    pub fn new(provider: Arc<dyn BlockDefinitionProvider>) -> Self {
        Self {
            provider: RwLock::new(provider),
            cache: RwLock::new(HashMap::new()),
            missing: Arc::new(BakedBlockDef::missing()),
            generation: AtomicU64::new(0),
        }
    }

    fn current_provider(&self) -> Arc<dyn BlockDefinitionProvider> {
        Arc::clone(&self.provider.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the baked definition for `state_key`, baking it on first use.
    /// Unresolvable states yield the shared `missing` definition.
    pub fn bake(&self, state_key: &str) -> Arc<BakedBlockDef> {
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(state_key)
        {
            return Arc::clone(hit);
        }
        let baked = match self.current_provider().bake_block_state(state_key) {
            Some(def) => Arc::new(def),
            None => {
                log::debug!(target: "baker", "no definition for '{}', using missing", state_key);
                Arc::clone(&self.missing)
            }
        };
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(state_key.to_string()).or_insert(baked))
    }

    pub fn render_type(&self, block_name: &str) -> Option<RenderType> {
        self.current_provider().render_type(block_name)
    }

    pub fn light_emission(&self, block_name: &str) -> u8 {
        self.current_provider().light_emission(block_name)
    }

    /// Swaps the resource pack set and drops every cached definition.
    pub fn replace_provider(&self, provider: Arc<dyn BlockDefinitionProvider>) {
        *self.provider.write().unwrap_or_else(PoisonError::into_inner) = provider;
        self.invalidate_all();
    }

    pub fn invalidate_all(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = cache.len();
        cache.clear();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!(target: "baker", "definition cache cleared entries={} generation={}", dropped, generation);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
