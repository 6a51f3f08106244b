//! The partition-selection sort orchestrator.
//!
//! [`PartitionSorter`] drives the whole algorithm: split the input into `k`
//! blocks, sort each block locally, then run `k - 1` selection iterations,
//! each extracting the globally smallest block-sized chunk through the
//! auxiliary buffer, and finally drain the residual tail as the last chunk.
//! Each iteration steps through
//!
//! ```text
//! estimate range -> bound check -> { direct | bisect | tie-break }
//!                -> merge into aux -> repack -> restore chunk
//! ```
//!
//! and the concatenation of the restored chunks, in iteration order, is the
//! ascending sort of the input, in place.
//!
//! # Storage protocol
//!
//! Working storage follows a two-call protocol: `storage_required_*` computes
//! the exact byte requirement for `(n, block_size)` without touching data;
//! the matching `sort_*` call runs inside a caller buffer of that size. The
//! two calls share one layout computation and always agree. See
//! [`crate::sort::workspace`].
//!
//! # Concurrency
//!
//! With `threads > 1`, per-block work (block-local sorting, per-block
//! threshold searches) runs on the rayon pool; every step that produces an
//! aggregate consumed by control logic is a barrier. The outer loop and the
//! bisection loop are strictly sequential, and the sorter is the only
//! writer of the storage for the duration of a call.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::debug;

use crate::errors::{Result, SortError};
use crate::sort::extract::{merge_into_aux, repack, restore_chunk, MergeEntry};
use crate::sort::scan::exclusive_sum_into;
use crate::sort::select::{select_partition, Resolution, SelectionBuffers};
use crate::sort::surface::{
    BlockRun, ChunkedKeys, ChunkedPairs, ContiguousKeys, ContiguousPairs, Element, SortKey,
    Surface,
};
use crate::sort::workspace::{StorageRequest, WorkPlan, Workspace};
use crate::validation;

/// Memory-bounded sorter over `k` independently pre-sorted blocks.
///
/// Configure with the builder methods, size the working storage with a
/// `storage_required_*` call, then sort with the matching `sort_*` call.
/// The sorter itself is stateless and reusable across calls.
pub struct PartitionSorter {
    /// Elements per block; also the auxiliary buffer capacity.
    block_size: usize,
    /// Number of threads for per-block parallel work.
    threads: usize,
}

impl PartitionSorter {
    /// Create a sorter with the given block size.
    #[must_use]
    pub fn new(block_size: usize) -> Self {
        Self { block_size, threads: 1 }
    }

    /// Set the number of threads for per-block parallel work.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Dry-run sizing for a key-only sort of `n` elements: computes the
    /// exact working-storage byte requirement without any data movement.
    pub fn storage_required_keys<K: SortKey>(&self, n: usize) -> Result<StorageRequest> {
        validation::validate_block_size(self.block_size)?;
        Ok(WorkPlan::<K, ()>::new(n, self.block_size, false)?.request())
    }

    /// Dry-run sizing for a key/value sort of `n` elements.
    pub fn storage_required_pairs<K: SortKey, V: Element>(
        &self,
        n: usize,
    ) -> Result<StorageRequest> {
        validation::validate_block_size(self.block_size)?;
        Ok(WorkPlan::<K, V>::new(n, self.block_size, true)?.request())
    }

    /// Sort `keys` ascending in place.
    ///
    /// `storage` must hold at least [`Self::storage_required_keys`] bytes
    /// for `keys.len()`; otherwise [`SortError::AllocationFailure`] is
    /// returned before any element moves.
    pub fn sort_keys<K: SortKey>(&self, keys: &mut [K], storage: &mut [u8]) -> Result<SortReport> {
        validation::validate_block_size(self.block_size)?;
        let plan = WorkPlan::<K, ()>::new(keys.len(), self.block_size, false)?;
        let request = plan.request();
        let ws = plan.bind(storage)?;
        let Workspace { aux_keys, part, cumul, lower, upper, probe_lo, probe_hi, .. } = ws;

        let mut blocks = initial_blocks(keys.len(), self.block_size);
        let mut surface = ContiguousKeys::new(keys, aux_keys);
        let mut bufs = SelectionBuffers { part, cumul, lower, upper, probe_lo, probe_hi };
        self.run(&mut surface, &mut blocks, &mut bufs, request)
    }

    /// Sort `keys` ascending in place, permuting `values` in lockstep.
    pub fn sort_pairs<K: SortKey, V: Element>(
        &self,
        keys: &mut [K],
        values: &mut [V],
        storage: &mut [u8],
    ) -> Result<SortReport> {
        validation::validate_block_size(self.block_size)?;
        validation::validate_paired_lengths(keys.len(), values.len())?;
        let plan = WorkPlan::<K, V>::new(keys.len(), self.block_size, true)?;
        let request = plan.request();
        let ws = plan.bind(storage)?;
        let Workspace { aux_keys, aux_values, perm, part, cumul, lower, upper, probe_lo, probe_hi } =
            ws;

        let mut blocks = initial_blocks(keys.len(), self.block_size);
        let mut surface = ContiguousPairs::new(keys, values, aux_keys, aux_values, perm);
        let mut bufs = SelectionBuffers { part, cumul, lower, upper, probe_lo, probe_hi };
        self.run(&mut surface, &mut blocks, &mut bufs, request)
    }

    /// Sort keys held in an array of fixed-capacity chunks.
    ///
    /// Every chunk must hold exactly the block size except the last, which
    /// holds the (non-empty) remainder. After the call the concatenation of
    /// the chunks, in order, is ascending.
    pub fn sort_chunked_keys<K: SortKey>(
        &self,
        chunks: &mut [&mut [K]],
        storage: &mut [u8],
    ) -> Result<SortReport> {
        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        let n = validation::validate_chunk_geometry(&lens, self.block_size)?;
        let plan = WorkPlan::<K, ()>::new(n, self.block_size, false)?;
        let request = plan.request();
        let ws = plan.bind(storage)?;
        let Workspace { aux_keys, part, cumul, lower, upper, probe_lo, probe_hi, .. } = ws;

        let mut blocks = initial_blocks(n, self.block_size);
        let mut surface = ChunkedKeys::new(chunks, self.block_size, aux_keys);
        let mut bufs = SelectionBuffers { part, cumul, lower, upper, probe_lo, probe_hi };
        self.run(&mut surface, &mut blocks, &mut bufs, request)
    }

    /// Sort chunked keys with chunked values permuted in lockstep.
    pub fn sort_chunked_pairs<'a, K: SortKey, V: Element>(
        &self,
        key_chunks: &mut [&'a mut [K]],
        value_chunks: &mut [&'a mut [V]],
        storage: &mut [u8],
    ) -> Result<SortReport> {
        let key_lens: Vec<usize> = key_chunks.iter().map(|c| c.len()).collect();
        let value_lens: Vec<usize> = value_chunks.iter().map(|c| c.len()).collect();
        let n = validation::validate_chunk_geometry(&key_lens, self.block_size)?;
        validation::validate_matching_chunks(&key_lens, &value_lens)?;
        let plan = WorkPlan::<K, V>::new(n, self.block_size, true)?;
        let request = plan.request();
        let ws = plan.bind(storage)?;
        let Workspace { aux_keys, aux_values, perm, part, cumul, lower, upper, probe_lo, probe_hi } =
            ws;

        let mut blocks = initial_blocks(n, self.block_size);
        let mut surface = ChunkedPairs::new(
            key_chunks,
            value_chunks,
            self.block_size,
            aux_keys,
            aux_values,
            perm,
        );
        let mut bufs = SelectionBuffers { part, cumul, lower, upper, probe_lo, probe_hi };
        self.run(&mut surface, &mut blocks, &mut bufs, request)
    }

    /// The outer iteration loop, shared by all four storage shapes.
    fn run<K: SortKey, S: Surface<K>>(
        &self,
        surface: &mut S,
        blocks: &mut [BlockRun],
        bufs: &mut SelectionBuffers<'_>,
        request: StorageRequest,
    ) -> Result<SortReport> {
        let n = surface.len();
        let k = blocks.len();
        let parallel = self.threads > 1;
        let mut report = SortReport {
            blocks: k,
            storage_bytes: request.bytes(),
            ..SortReport::default()
        };

        debug!("partition sort: {n} elements, {k} blocks of {}", self.block_size);

        // Block-local pre-sort; the selection machinery relies on every
        // block being sorted from here on.
        for b in blocks.iter() {
            surface.sort_block(b.offset, b.size, parallel);
        }

        if k <= 1 {
            // Degenerate case: the single block-local sort was the whole job.
            report.chunks = k;
            return Ok(report);
        }

        let mut heap: BinaryHeap<Reverse<MergeEntry<K>>> = BinaryHeap::with_capacity(k);
        let mut chunk_base = 0usize;
        let mut prev_last: Option<K> = None;

        for chunk in 0..k {
            let live = n - chunk_base;
            let target = if chunk == k - 1 { live } else { self.block_size };
            debug_assert!(target >= 1 && target <= live);

            if chunk == k - 1 {
                // Final chunk: drain every remaining element.
                for (p, b) in bufs.part.iter_mut().zip(blocks.iter()) {
                    *p = b.size;
                }
            } else {
                let resolution = select_partition(surface, blocks, target, bufs, parallel)?;
                report.bisect_rounds += resolution.rounds();
                match resolution {
                    Resolution::DirectHigh | Resolution::DirectLow => report.direct_chunks += 1,
                    Resolution::Bisected { .. } => report.bisected_chunks += 1,
                    Resolution::TieBroken { .. } => report.tie_break_chunks += 1,
                }
            }

            // The partition must cover the target exactly.
            exclusive_sum_into(bufs.part, bufs.cumul);
            let selected = bufs.cumul[k];
            if selected != target {
                return Err(SortError::ConsistencyViolation {
                    detail: format!(
                        "chunk {chunk}: partition sizes sum to {selected}, want {target}"
                    ),
                });
            }

            let staged = merge_into_aux(surface, blocks, bufs.part, &mut heap);
            debug_assert_eq!(staged, target);

            // Chunks leave in globally non-decreasing key order.
            if let Some(prev) = prev_last {
                if surface.aux_key(0) < prev {
                    return Err(SortError::ConsistencyViolation {
                        detail: format!(
                            "chunk {chunk} starts below the previous chunk's maximum"
                        ),
                    });
                }
            }
            prev_last = Some(surface.aux_key(target - 1));

            repack(surface, blocks, bufs.part, n);
            restore_chunk(surface, chunk_base, target);
            chunk_base += target;
        }

        report.chunks = k;
        debug!(
            "partition sort complete: {} chunks, {} bisection rounds, {} tie-breaks",
            report.chunks, report.bisect_rounds, report.tie_break_chunks
        );
        Ok(report)
    }
}

/// Instrumentation from one sort call.
///
/// Replaces ambient debug state: everything a caller may want to inspect
/// about the run is returned here explicitly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortReport {
    /// Number of blocks (`k`) the input was split into.
    pub blocks: usize,
    /// Chunks emitted (equals `blocks` for multi-block runs).
    pub chunks: usize,
    /// Chunks finalized directly from an estimated threshold.
    pub direct_chunks: u64,
    /// Chunks finalized through the bisection loop.
    pub bisected_chunks: u64,
    /// Chunks that needed the duplicate-key tie-break.
    pub tie_break_chunks: u64,
    /// Total bisection rounds across all chunks.
    pub bisect_rounds: u64,
    /// Byte requirement implied by this call; always equals the dry-run
    /// figure for the same input size, block size, and element types.
    pub storage_bytes: usize,
}

/// Initial block descriptors: `k - 1` full blocks plus the remainder.
fn initial_blocks(n: usize, block_size: usize) -> Vec<BlockRun> {
    let k = n.div_ceil(block_size);
    (0..k)
        .map(|i| BlockRun {
            offset: i * block_size,
            size: if i + 1 == k { n - i * block_size } else { block_size },
        })
        .collect()
}
