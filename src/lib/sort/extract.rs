//! Chunk extraction and block repacking.
//!
//! Once a partition-size vector is selected, the chunk leaves the blocks in
//! three moves:
//!
//! 1. **Merge**: the designated per-block prefixes are already sorted, so a
//!    k-way heap merge stages them into the auxiliary buffer in ascending
//!    order; equal keys pop in block order, keeping extraction
//!    deterministic.
//! 2. **Repack**: every block's remaining elements slide toward the end of
//!    the storage, leaving the blocks contiguous, rightmost-packed, and
//!    still individually sorted. This frees the output range at the front.
//! 3. **Restore**: the auxiliary buffer is transferred into the freed range,
//!    which is the chunk's final position in the sorted output.

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::sort::surface::{BlockRun, SortKey, Surface};

/// An element at the merge frontier: the next unstaged element of one block.
pub(crate) struct MergeEntry<K> {
    pub key: K,
    pub block: usize,
    pub pos: usize,
}

impl<K: Ord> PartialEq for MergeEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.block == other.block
    }
}

impl<K: Ord> Eq for MergeEntry<K> {}

impl<K: Ord> PartialOrd for MergeEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> Ord for MergeEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal keys pop lowest block first - the documented duplicate rule.
        self.key.cmp(&other.key).then_with(|| self.block.cmp(&other.block))
    }
}

/// Merge each block's selected prefix into the auxiliary buffer.
///
/// Stages `part[i]` elements from block `i`, ascending across all blocks,
/// into auxiliary slots `0..sum(part)`. Returns the staged count. The heap
/// is reused across iterations to avoid per-chunk allocation.
pub(crate) fn merge_into_aux<K: SortKey, S: Surface<K>>(
    surface: &mut S,
    blocks: &[BlockRun],
    part: &[usize],
    heap: &mut BinaryHeap<Reverse<MergeEntry<K>>>,
) -> usize {
    heap.clear();
    for (i, (b, &take)) in blocks.iter().zip(part.iter()).enumerate() {
        debug_assert!(take <= b.size);
        if take > 0 {
            heap.push(Reverse(MergeEntry { key: surface.key_at(b.offset), block: i, pos: 0 }));
        }
    }

    let mut slot = 0usize;
    while let Some(Reverse(entry)) = heap.pop() {
        let block = &blocks[entry.block];
        surface.stage(block.offset + entry.pos, slot);
        slot += 1;

        let next = entry.pos + 1;
        if next < part[entry.block] {
            heap.push(Reverse(MergeEntry {
                key: surface.key_at(block.offset + next),
                block: entry.block,
                pos: next,
            }));
        }
    }
    slot
}

/// Compact block remainders toward the end of the storage.
///
/// Processed from the last block backwards, each remainder moves right by
/// the total extracted below it, so destinations never overrun sources and
/// the blocks end up contiguous against `storage_len`. Block descriptors
/// are updated in place; per-block sortedness is preserved because elements
/// only translate.
pub(crate) fn repack<K: SortKey, S: Surface<K>>(
    surface: &mut S,
    blocks: &mut [BlockRun],
    part: &[usize],
    storage_len: usize,
) {
    let mut cursor = storage_len;
    for i in (0..blocks.len()).rev() {
        let rem = blocks[i].size - part[i];
        cursor -= rem;
        let src = blocks[i].offset + part[i];
        debug_assert!(cursor >= src, "repack must move remainders right");
        if rem > 0 && src != cursor {
            surface.shift(src, cursor, rem);
        }
        blocks[i].offset = cursor;
        blocks[i].size = rem;
    }
}

/// Transfer the staged chunk from the auxiliary buffer into its output
/// range `base..base + count`, freed by the preceding repack.
pub(crate) fn restore_chunk<K: SortKey, S: Surface<K>>(
    surface: &mut S,
    base: usize,
    count: usize,
) {
    for slot in 0..count {
        surface.restore(slot, base + slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::surface::ContiguousKeys;

    #[test]
    fn test_merge_is_sorted_across_blocks() {
        // Blocks: [1, 4, 7] [2, 5, 8] [0, 3, 6]
        let mut keys = vec![1u64, 4, 7, 2, 5, 8, 0, 3, 6];
        let mut aux = vec![0u64; 6];
        let mut surface = ContiguousKeys::new(&mut keys, &mut aux);
        let blocks = vec![
            BlockRun { offset: 0, size: 3 },
            BlockRun { offset: 3, size: 3 },
            BlockRun { offset: 6, size: 3 },
        ];
        let part = vec![2, 1, 3];
        let mut heap = BinaryHeap::new();
        let staged = merge_into_aux(&mut surface, &blocks, &part, &mut heap);
        assert_eq!(staged, 6);
        let staged_keys: Vec<u64> = (0..6).map(|s| surface.aux_key(s)).collect();
        assert_eq!(staged_keys, vec![0, 1, 2, 3, 4, 6]);
    }

    #[test]
    fn test_merge_pops_equal_keys_in_block_order() {
        let mut keys = vec![5u64, 5, 5, 5];
        let mut aux = vec![0u64; 2];
        let mut surface = ContiguousKeys::new(&mut keys, &mut aux);
        let blocks =
            vec![BlockRun { offset: 0, size: 2 }, BlockRun { offset: 2, size: 2 }];
        let mut heap = BinaryHeap::new();
        // Take one element from each block: block 0's must be staged first.
        let staged = merge_into_aux(&mut surface, &blocks, &[1, 1], &mut heap);
        assert_eq!(staged, 2);
        // Overwrite the sources to observe which element went where.
        // (Both are 5s; the ordering contract is exercised through the
        // pair surfaces in the integration tests.)
        assert_eq!(surface.aux_key(0), 5);
        assert_eq!(surface.aux_key(1), 5);
    }

    #[test]
    fn test_repack_compacts_to_the_right() {
        // Blocks: [1, 4, 7] [2, 5, 8] [0, 3, 6]; extract [2, 1, 3].
        let mut keys = vec![1u64, 4, 7, 2, 5, 8, 0, 3, 6];
        let mut aux = vec![0u64; 6];
        let mut surface = ContiguousKeys::new(&mut keys, &mut aux);
        let mut blocks = vec![
            BlockRun { offset: 0, size: 3 },
            BlockRun { offset: 3, size: 3 },
            BlockRun { offset: 6, size: 3 },
        ];
        let part = vec![2, 1, 3];
        let mut heap = BinaryHeap::new();
        merge_into_aux(&mut surface, &blocks, &part, &mut heap);
        repack(&mut surface, &mut blocks, &part, 9);

        assert_eq!(blocks[0], BlockRun { offset: 6, size: 1 });
        assert_eq!(blocks[1], BlockRun { offset: 7, size: 2 });
        assert_eq!(blocks[2], BlockRun { offset: 9, size: 0 });
        assert_eq!(surface.key_at(6), 7);
        assert_eq!(surface.key_at(7), 5);
        assert_eq!(surface.key_at(8), 8);

        restore_chunk(&mut surface, 0, 6);
        assert_eq!(keys[..6], [0, 1, 2, 3, 4, 6]);
    }
}
