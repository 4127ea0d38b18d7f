/*!
 * Property Tests
 * Table partition invariants under arbitrary allocate/free sequences
 */

use ai_os_vmem::memory::{Block, BlockTable, LinkedBlockTable};
use proptest::prelude::*;

const TABLE_SIZE: usize = 4096;

fn assert_partition(table: &LinkedBlockTable) {
    let mut blocks: Vec<Block> = table
        .free_blocks()
        .into_iter()
        .chain(table.used_blocks())
        .filter(|block| !block.is_empty())
        .collect();
    blocks.sort_by_key(|block| block.address);

    let mut cursor = 0;
    for block in &blocks {
        assert_eq!(block.address, cursor, "gap or overlap at {}", block);
        cursor = block.end();
    }
    assert_eq!(cursor, TABLE_SIZE);
}

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    Free(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..600).prop_map(Op::Allocate),
        any::<usize>().prop_map(Op::Free),
    ]
}

proptest! {
    #[test]
    fn prop_blocks_partition_the_range(ops in prop::collection::vec(op(), 1..80)) {
        let table = LinkedBlockTable::new(TABLE_SIZE);
        let mut held: Vec<Block> = Vec::new();

        for op in ops {
            match op {
                Op::Allocate(size) => {
                    if let Some(block) = table.allocate(size).unwrap() {
                        prop_assert_eq!(block.size, size);
                        held.push(block);
                    }
                }
                Op::Free(index) if !held.is_empty() => {
                    let block = held.swap_remove(index % held.len());
                    prop_assert!(table.free(block));
                }
                Op::Free(_) => {}
            }
            prop_assert_eq!(table.free_size() + table.used_size(), TABLE_SIZE);
            assert_partition(&table);
        }
    }

    #[test]
    fn prop_any_free_order_restores_one_block(
        (sizes, order) in prop::collection::vec(1usize..200, 1..20).prop_flat_map(|sizes| {
            let indices: Vec<usize> = (0..sizes.len()).collect();
            (Just(sizes), Just(indices).prop_shuffle())
        }),
    ) {
        let table = LinkedBlockTable::new(TABLE_SIZE);
        let blocks: Vec<Block> = sizes
            .iter()
            .filter_map(|size| table.allocate(*size).unwrap())
            .collect();
        prop_assert_eq!(blocks.len(), sizes.len());

        for index in order {
            prop_assert!(table.free(blocks[index]));
        }
        prop_assert_eq!(table.coalesce(), 0);
        prop_assert_eq!(table.free_blocks(), vec![Block::new(0, TABLE_SIZE)]);
    }
}
