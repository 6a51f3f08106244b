//! Threshold searches over the live blocks.
//!
//! The selection step reasons about candidate boundary keys through counts:
//! for a threshold `t`, how many live elements sit under it in each block,
//! and in total. Each per-block count is one binary search over that block's
//! sorted live range; blocks are independent, so the searches run in
//! parallel when configured. Counts are only valid for the block snapshot
//! they were taken from - blocks must not move between a search and the use
//! of its result.

use rayon::prelude::*;

use crate::errors::{Result, SortError};
use crate::sort::surface::{BlockRun, SortKey, Surface};

/// Which side of the threshold a count captures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Probe {
    /// Elements with key strictly below the threshold (`lower_bound` rank).
    Under,
    /// Elements with key at or below the threshold (`upper_bound` rank).
    Through,
}

/// Count elements under `threshold` in every block.
///
/// Fills `out[i]` with block `i`'s count and returns the aggregate total.
pub(crate) fn count_multi<K: SortKey, S: Surface<K>>(
    surface: &S,
    blocks: &[BlockRun],
    threshold: K,
    probe: Probe,
    out: &mut [usize],
    parallel: bool,
) -> usize {
    debug_assert_eq!(blocks.len(), out.len());
    if parallel {
        out.par_iter_mut()
            .zip(blocks.par_iter())
            .for_each(|(o, b)| *o = count_in(surface, b, threshold, probe));
    } else {
        for (o, b) in out.iter_mut().zip(blocks.iter()) {
            *o = count_in(surface, b, threshold, probe);
        }
    }
    out.iter().sum()
}

/// Rank of `threshold` within one block's sorted live range.
fn count_in<K: SortKey, S: Surface<K>>(
    surface: &S,
    block: &BlockRun,
    threshold: K,
    probe: Probe,
) -> usize {
    let (mut lo, mut hi) = (0usize, block.size);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let key = surface.key_at(block.offset + mid);
        let under = match probe {
            Probe::Under => key < threshold,
            Probe::Through => key <= threshold,
        };
        if under {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Derive a bracketing threshold pair for the current target count from
/// sampled block keys.
///
/// The pair `(t_low, t_high)` satisfies two count guarantees that the
/// selection step relies on:
///
/// - strictly fewer than `target` live elements have keys below `t_low`
///   (at most `k * (ceil(target / k) - 1)` by a pigeonhole argument), and
/// - at least `target` live elements have keys at or below `t_high`.
///
/// Tightness only affects how many bisection rounds follow, never
/// correctness.
pub(crate) fn estimate_range<K: SortKey, S: Surface<K>>(
    surface: &S,
    blocks: &[BlockRun],
    target: usize,
) -> Result<(K, K)> {
    debug_assert!(target >= 1);
    let k = blocks.len();
    let quota = target.div_ceil(k.max(1));

    let mut t_low: Option<K> = None;
    let mut first_min: Option<K> = None;
    let mut t_high: Option<K> = None;
    let mut last_max: Option<K> = None;

    for b in blocks.iter().filter(|b| b.size > 0) {
        let first = surface.key_at(b.offset);
        first_min = Some(first_min.map_or(first, |m: K| m.min(first)));
        let last = surface.key_at(b.offset + b.size - 1);
        last_max = Some(last_max.map_or(last, |m: K| m.max(last)));

        if b.size >= quota {
            let sample = surface.key_at(b.offset + quota - 1);
            t_low = Some(t_low.map_or(sample, |m: K| m.min(sample)));
        }
        if b.size >= target {
            let sample = surface.key_at(b.offset + target - 1);
            t_high = Some(t_high.map_or(sample, |m: K| m.min(sample)));
        }
    }

    // At least one block is non-empty whenever a target exists, so the
    // fallbacks are always available: the global minimum bounds from below
    // (nothing is under it) and the global maximum bounds from above
    // (everything is at or under it).
    match (t_low.or(first_min), t_high.or(last_max)) {
        (Some(low), Some(high)) => Ok((low, high)),
        _ => Err(SortError::ConsistencyViolation {
            detail: format!("range estimation found no live elements for target {target}"),
        }),
    }
}

/// Find the block whose bracket counts disagree most.
///
/// Returns `(gap, block_index)` for the first block attaining the maximum
/// of `upper[i] - lower[i]`.
pub(crate) fn max_gap(lower: &[usize], upper: &[usize]) -> (usize, usize) {
    debug_assert_eq!(lower.len(), upper.len());
    let mut best = 0usize;
    let mut arg = 0usize;
    for (i, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
        debug_assert!(hi >= lo, "bracket counts crossed in block {i}");
        let gap = hi - lo;
        if gap > best {
            best = gap;
            arg = i;
        }
    }
    (best, arg)
}
