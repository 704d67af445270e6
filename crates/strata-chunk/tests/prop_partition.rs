use proptest::prelude::*;
use strata_blocks::BlockData;
use strata_chunk::{
    BlockGrid, BlockGridSource, ChunkKey, ChunkSideLength, chunk_key_of, gather_chunk, local_of,
    partition,
};

fn side() -> impl Strategy<Value = ChunkSideLength> {
    (1i64..=64).prop_map(|s| ChunkSideLength::new(s).unwrap())
}

proptest! {
    // The owning chunk's origin plus the local offset gives back the block.
    #[test]
    fn key_and_local_reconstruct_position(x in -5000i32..5000, y in -5000i32..5000, z in -5000i32..5000, side in side()) {
        let key = chunk_key_of(x, y, z, side);
        let (lx, ly, lz) = local_of(x, y, z, side);
        let s = side.get() as i32;
        prop_assert!((0..s).contains(&lx) && (0..s).contains(&ly) && (0..s).contains(&lz));
        let [ox, oy, oz] = key.origin(side);
        prop_assert_eq!((ox + lx, oy + ly, oz + lz), (x, y, z));
    }

    #[test]
    fn only_sides_in_range_are_valid(n in -200i64..200) {
        prop_assert_eq!(ChunkSideLength::new(n).is_ok(), (1..=64).contains(&n));
    }

    // Partitioning neither drops nor duplicates blocks, and every batch is homogeneous.
    #[test]
    fn partition_is_a_disjoint_cover(
        cells in proptest::collection::hash_set((-40i32..40, -40i32..40, -40i32..40), 0..200),
        side in side(),
    ) {
        let blocks: Vec<BlockData> = cells.iter().map(|&(x, y, z)| BlockData::new("stone", x, y, z, None)).collect();
        let parts = partition(blocks.clone(), side);
        let total: usize = parts.values().map(Vec::len).sum();
        prop_assert_eq!(total, blocks.len());
        for (key, batch) in &parts {
            for b in batch {
                prop_assert_eq!(chunk_key_of(b.x, b.y, b.z, side), *key);
            }
        }
    }

    // Grid chunk lookup agrees with partitioning.
    #[test]
    fn grid_chunk_lookup_matches_partition(
        cells in proptest::collection::hash_set((-20i32..20, -20i32..20, -20i32..20), 1..120),
        side in (1i64..=8).prop_map(|s| ChunkSideLength::new(s).unwrap()),
    ) {
        let blocks: Vec<BlockData> = cells.iter().map(|&(x, y, z)| BlockData::new("stone", x, y, z, None)).collect();
        let grid = BlockGrid::from_blocks("p", blocks.clone());
        let parts = partition(blocks, side);
        for (key, batch) in &parts {
            let mut from_grid: Vec<_> = grid.blocks_in_chunk(*key, side).into_iter().map(|b| b.pos()).collect();
            let mut expected: Vec<_> = batch.iter().map(BlockData::pos).collect();
            from_grid.sort_unstable();
            expected.sort_unstable();
            prop_assert_eq!(from_grid, expected);
        }
    }

    // Halo cells sit outside the chunk and touch a chunk block along one axis.
    #[test]
    fn halo_cells_are_face_adjacent(
        cells in proptest::collection::hash_set((-6i32..6, -6i32..6, -6i32..6), 1..150),
    ) {
        let side = ChunkSideLength::new(4).unwrap();
        let grid = BlockGrid::from_blocks("h", cells.iter().map(|&(x, y, z)| BlockData::new("stone", x, y, z, None)));
        let key = ChunkKey::new(0, 0, 0);
        let req = gather_chunk(&grid, key, side);
        for h in &req.halo {
            prop_assert_ne!(chunk_key_of(h.x, h.y, h.z, side), key);
            let touches = req.blocks.iter().any(|b| {
                (b.x - h.x).abs() + (b.y - h.y).abs() + (b.z - h.z).abs() == 1
            });
            prop_assert!(touches);
        }
    }
}
