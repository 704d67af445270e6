use std::sync::Arc;
use std::time::Duration;

use strata_blocks::{BakedBlockDef, BlockData, Category};
use strata_chunk::{BlockGrid, ChunkKey, ChunkMeshRequest, ChunkSideLength, gather_chunk};
use strata_mesh_cpu::PaletteCache;
use strata_runtime::{BuildError, BuildOutcome, BuildPool, TransportKind};

fn side(n: i64) -> ChunkSideLength {
    ChunkSideLength::new(n).unwrap()
}

fn grid() -> BlockGrid {
    let mut blocks = Vec::new();
    for x in 0..12 {
        for z in 0..4 {
            blocks.push(BlockData::new("stone", x, 0, z, None));
            if (x + z) % 3 == 0 {
                blocks.push(BlockData::new("glass", x, 1, z, None));
            }
        }
    }
    BlockGrid::from_blocks("pool-test", blocks)
}

/// Requests for every chunk plus a palette covering all of them.
fn requests(g: &BlockGrid, s: ChunkSideLength) -> (Vec<ChunkMeshRequest>, Arc<PaletteCache>) {
    let mut palette = PaletteCache::new();
    let mut keys: Vec<ChunkKey> = g.chunk_keys(s).into_iter().collect();
    keys.sort_unstable();
    let mut out = Vec::new();
    for key in keys {
        let mut req = gather_chunk(g, key, s);
        let all: Vec<BlockData> = req.blocks.iter().chain(req.halo.iter()).cloned().collect();
        for b in all {
            let def = Arc::new(BakedBlockDef::full_cube(&b.name));
            palette.ensure(&b.state_key, &b.name, &def, None, 0);
            if req.def(&b.state_key).is_none() {
                req.defs.push((b.state_key.clone(), def));
            }
        }
        out.push(req);
    }
    palette.mark_ready();
    (out, Arc::new(palette))
}

fn checker(n: i32) -> (ChunkMeshRequest, Arc<PaletteCache>) {
    let mut blocks = Vec::new();
    for y in 0..n {
        for z in 0..n {
            for x in 0..n {
                if (x + y + z) % 2 == 0 {
                    blocks.push(BlockData::new("stone", x + 1000, y, z, None));
                }
            }
        }
    }
    let g = BlockGrid::from_blocks("heavy", blocks);
    let (mut reqs, palette) = requests(&g, side(n.into()));
    (reqs.remove(0), palette)
}

#[test]
fn zero_workers_builds_inline() {
    let pool = BuildPool::new(0);
    assert_eq!(pool.transport_kind(), TransportKind::Inline);
    let g = grid();
    let (reqs, palette) = requests(&g, side(4));
    for req in reqs {
        let handle = pool.build(req, palette.clone());
        // inline builds resolve before `build` returns
        assert!(handle.try_take().is_some());
    }
    assert_eq!(pool.stats().pending, 0);
}

#[test]
fn threaded_and_inline_agree() {
    let g = grid();
    let (reqs, palette) = requests(&g, side(4));
    let inline = BuildPool::new(0);
    let threaded = BuildPool::new(3);
    assert_eq!(threaded.transport_kind(), TransportKind::Threaded { workers: 3 });

    let handles: Vec<_> = reqs
        .iter()
        .map(|r| threaded.build(r.clone(), palette.clone()))
        .collect();
    for (req, handle) in reqs.into_iter().zip(handles) {
        let a = inline.build_blocking(req, palette.clone()).unwrap().into_meshes().unwrap();
        let b = handle.wait().unwrap().into_meshes().unwrap();
        assert_eq!(a, b);
        assert!(a.get(Category::Solid).is_some());
    }
}

#[test]
fn newer_build_supersedes_pending_one() {
    let g = grid();
    let (reqs, palette) = requests(&g, side(4));
    let (heavy, heavy_palette) = checker(32);
    let pool = BuildPool::new(1);
    // occupy the single worker so both builds below queue behind it
    let blockers: Vec<_> = (0..4)
        .map(|_| pool.build(heavy.clone(), heavy_palette.clone()))
        .collect();
    let first = pool.build(reqs[0].clone(), palette.clone());
    let second = pool.build(reqs[0].clone(), palette.clone());
    assert!(first.id() != second.id());
    assert!(first.wait().unwrap().is_superseded());
    assert!(matches!(second.wait(), Ok(BuildOutcome::Built(_))));
    for b in blockers {
        assert!(b.wait().is_ok());
    }
}

#[test]
fn dispose_rejects_pending_and_later_builds() {
    let g = grid();
    let (reqs, palette) = requests(&g, side(2));
    let mut pool = BuildPool::new(1);
    let handles: Vec<_> = reqs
        .iter()
        .map(|r| pool.build(r.clone(), palette.clone()))
        .collect();
    pool.dispose();
    assert!(pool.is_disposed());
    for h in handles {
        // finished before dispose, or rejected by it
        match h.wait() {
            Ok(BuildOutcome::Built(_)) | Err(BuildError::Disposed) => {}
            other => panic!("unexpected {other:?}"),
        }
    }
    let late = pool.build(reqs[0].clone(), palette.clone());
    assert_eq!(
        late.wait_timeout(Duration::from_secs(1)).unwrap().unwrap_err(),
        BuildError::Disposed
    );
    assert_eq!(pool.stats().pending, 0);
}

#[test]
fn assembly_errors_come_back_as_worker_errors() {
    let pool = BuildPool::new(2);
    let req = ChunkMeshRequest::new(
        ChunkKey::new(0, 0, 0),
        side(4),
        vec![BlockData::new("stone", 1, 1, 1, None)],
    );
    // no palette entry and no definition shipped
    let err = pool
        .build(req, Arc::new(PaletteCache::new()))
        .wait()
        .unwrap_err();
    match err {
        BuildError::Worker(msg) => assert!(msg.contains("stone")),
        other => panic!("unexpected {other:?}"),
    }
}
