use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use strata_blocks::{
    BakedBlockDef, BlockDefinitionProvider, DefinitionBaker, Face, TomlDefinitions,
    canonical_state_key, parse_state_key,
};

struct CountingProvider {
    calls: AtomicUsize,
    tex: &'static str,
}

impl BlockDefinitionProvider for CountingProvider {
    fn bake_block_state(&self, state_key: &str) -> Option<BakedBlockDef> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if state_key.starts_with("known") {
            Some(BakedBlockDef::full_cube(self.tex))
        } else {
            None
        }
    }
}

#[test]
fn bake_caches_by_state_key() {
    let provider = Arc::new(CountingProvider {
        calls: AtomicUsize::new(0),
        tex: "a",
    });
    let baker = DefinitionBaker::new(provider.clone());
    let first = baker.bake("known_block");
    let second = baker.bake("known_block");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(provider.calls.load(Ordering::Relaxed), 1);
    assert_eq!(baker.cached_len(), 1);
}

#[test]
fn unknown_state_bakes_to_missing() {
    let baker = DefinitionBaker::new(Arc::new(TomlDefinitions::default()));
    let def = baker.bake("minecraft:not_a_block[facing=north]");
    assert!(def.is_missing());
    assert_eq!(def.faces.len(), 1);
}

#[test]
fn replacing_provider_invalidates_wholesale() {
    let a = Arc::new(CountingProvider {
        calls: AtomicUsize::new(0),
        tex: "a",
    });
    let b = Arc::new(CountingProvider {
        calls: AtomicUsize::new(0),
        tex: "b",
    });
    let baker = DefinitionBaker::new(a);
    baker.bake("known_1");
    baker.bake("known_2");
    assert_eq!(baker.cached_len(), 2);
    let gen_before = baker.generation();

    baker.replace_provider(b.clone());
    assert_eq!(baker.cached_len(), 0);
    assert_eq!(baker.generation(), gen_before + 1);
    let def = baker.bake("known_1");
    assert_eq!(def.faces[0].tex_key, "b");
    assert_eq!(b.calls.load(Ordering::Relaxed), 1);
}

fn prop_name() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,7}"
}

proptest! {
    // Canonical keys parse back to the same name and properties.
    #[test]
    fn state_key_roundtrip(name in prop_name(), props in proptest::collection::btree_map(prop_name(), prop_name(), 0..4)) {
        let key = canonical_state_key(&name, Some(&props));
        let (n, p) = parse_state_key(&key);
        prop_assert_eq!(n, name);
        prop_assert_eq!(p, props);
    }

    // A cuboid covers a side exactly when it spans that whole side.
    #[test]
    fn cuboid_cover_matches_extent(x0 in 0u8..=8, x1 in 8u8..=16, y0 in 0u8..=8, y1 in 8u8..=16) {
        let def = BakedBlockDef::from_cuboids(
            &[([x0 as f32, y0 as f32, 0.0], [x1 as f32, y1 as f32, 16.0])],
            |_| "t".into(),
        );
        let full_x = x0 == 0 && x1 == 16;
        let full_y = y0 == 0 && y1 == 16;
        prop_assert_eq!(def.covers(Face::PosY), y1 == 16 && full_x);
        prop_assert_eq!(def.covers(Face::NegX), x0 == 0 && full_y);
        prop_assert_eq!(def.covers(Face::PosZ), full_x && full_y);
    }
}
