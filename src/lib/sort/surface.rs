//! Storage surfaces: logical element addressing over the four storage shapes.
//!
//! The selection algorithm never touches memory directly; it goes through a
//! [`Surface`], which maps a logical position in `0..n` onto the backing
//! storage and knows how to
//!
//! - read the key at a position (threshold searches, tie-break candidates),
//! - stage an element into / restore it from the auxiliary buffer,
//! - shift a run of elements within the storage (repacking), and
//! - sort one block in place (the block-local sort collaborator).
//!
//! Four shapes are provided, one per public sort entry point: contiguous or
//! chunked key storage, each with or without a value array reordered in
//! lockstep. Chunked storage addresses an array of fixed-capacity chunks;
//! logical runs may span chunk boundaries after repacking.

use bytemuck::Pod;
use rayon::prelude::*;

/// Plain-old-data element that can be staged in caller-provided storage.
///
/// Implemented for every `bytemuck::Pod` type; composite keys should be
/// `#[repr(C)]` structs deriving `Pod` and `Zeroable`.
pub trait Element: Pod + Send + Sync + 'static {}

impl<T: Pod + Send + Sync + 'static> Element for T {}

/// A totally ordered sortable key.
pub trait SortKey: Element + Ord {}

impl<T: Element + Ord> SortKey for T {}

/// One partition of the input: a run of `size` live elements starting at
/// logical `offset`. Live elements stay sorted by key between iterations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockRun {
    /// Logical start within the surface.
    pub offset: usize,
    /// Count of live (not yet extracted) elements.
    pub size: usize,
}

/// Element access and movement over one of the four storage shapes.
///
/// Positions are logical indices in `0..len()`. Implementations are `Sync`
/// so per-block searches can read the surface from worker threads; all
/// mutation happens from the single orchestrating thread between barriers.
pub(crate) trait Surface<K: SortKey>: Sync {
    /// Total logical element count.
    fn len(&self) -> usize;

    /// Key at logical position `pos`.
    fn key_at(&self, pos: usize) -> K;

    /// Key currently held in auxiliary slot `slot`.
    fn aux_key(&self, slot: usize) -> K;

    /// Copy the element at `pos` into auxiliary slot `slot`.
    fn stage(&mut self, pos: usize, slot: usize);

    /// Copy auxiliary slot `slot` back to position `pos`.
    fn restore(&mut self, slot: usize, pos: usize);

    /// Move `len` elements from `src..src + len` to `dst..dst + len`.
    /// The ranges may overlap (memmove semantics).
    fn shift(&mut self, src: usize, dst: usize, len: usize);

    /// Sort the block occupying `start..start + len` in place by key.
    /// Only called on freshly created blocks, before any repacking.
    fn sort_block(&mut self, start: usize, len: usize, parallel: bool);
}

// ============================================================================
// Contiguous storage
// ============================================================================

/// Keys in one contiguous slice.
pub(crate) struct ContiguousKeys<'d, 'w, K> {
    keys: &'d mut [K],
    aux: &'w mut [K],
}

impl<'d, 'w, K: SortKey> ContiguousKeys<'d, 'w, K> {
    pub fn new(keys: &'d mut [K], aux: &'w mut [K]) -> Self {
        Self { keys, aux }
    }
}

impl<K: SortKey> Surface<K> for ContiguousKeys<'_, '_, K> {
    fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    fn key_at(&self, pos: usize) -> K {
        self.keys[pos]
    }

    #[inline]
    fn aux_key(&self, slot: usize) -> K {
        self.aux[slot]
    }

    #[inline]
    fn stage(&mut self, pos: usize, slot: usize) {
        self.aux[slot] = self.keys[pos];
    }

    #[inline]
    fn restore(&mut self, slot: usize, pos: usize) {
        self.keys[pos] = self.aux[slot];
    }

    fn shift(&mut self, src: usize, dst: usize, len: usize) {
        self.keys.copy_within(src..src + len, dst);
    }

    fn sort_block(&mut self, start: usize, len: usize, parallel: bool) {
        let run = &mut self.keys[start..start + len];
        if parallel {
            run.par_sort_unstable();
        } else {
            run.sort_unstable();
        }
    }
}

/// Keys plus a value array reordered in lockstep, both contiguous.
pub(crate) struct ContiguousPairs<'d, 'w, K, V> {
    keys: &'d mut [K],
    values: &'d mut [V],
    aux_keys: &'w mut [K],
    aux_values: &'w mut [V],
    perm: &'w mut [usize],
}

impl<'d, 'w, K: SortKey, V: Element> ContiguousPairs<'d, 'w, K, V> {
    pub fn new(
        keys: &'d mut [K],
        values: &'d mut [V],
        aux_keys: &'w mut [K],
        aux_values: &'w mut [V],
        perm: &'w mut [usize],
    ) -> Self {
        Self { keys, values, aux_keys, aux_values, perm }
    }
}

impl<K: SortKey, V: Element> Surface<K> for ContiguousPairs<'_, '_, K, V> {
    fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    fn key_at(&self, pos: usize) -> K {
        self.keys[pos]
    }

    #[inline]
    fn aux_key(&self, slot: usize) -> K {
        self.aux_keys[slot]
    }

    #[inline]
    fn stage(&mut self, pos: usize, slot: usize) {
        self.aux_keys[slot] = self.keys[pos];
        self.aux_values[slot] = self.values[pos];
    }

    #[inline]
    fn restore(&mut self, slot: usize, pos: usize) {
        self.keys[pos] = self.aux_keys[slot];
        self.values[pos] = self.aux_values[slot];
    }

    fn shift(&mut self, src: usize, dst: usize, len: usize) {
        self.keys.copy_within(src..src + len, dst);
        self.values.copy_within(src..src + len, dst);
    }

    fn sort_block(&mut self, start: usize, len: usize, parallel: bool) {
        co_sort_run(
            &mut self.keys[start..start + len],
            &mut self.values[start..start + len],
            &mut self.aux_keys[..len],
            &mut self.aux_values[..len],
            &mut self.perm[..len],
            parallel,
        );
    }
}

// ============================================================================
// Chunked storage
// ============================================================================

/// Keys spread over an array of fixed-capacity chunks.
pub(crate) struct ChunkedKeys<'d, 'c, 'w, K> {
    chunks: &'d mut [&'c mut [K]],
    capacity: usize,
    len: usize,
    aux: &'w mut [K],
}

impl<'d, 'c, 'w, K: SortKey> ChunkedKeys<'d, 'c, 'w, K> {
    pub fn new(chunks: &'d mut [&'c mut [K]], capacity: usize, aux: &'w mut [K]) -> Self {
        let len = chunks.iter().map(|c| c.len()).sum();
        Self { chunks, capacity, len, aux }
    }

    #[inline]
    fn split(&self, pos: usize) -> (usize, usize) {
        (pos / self.capacity, pos % self.capacity)
    }
}

impl<K: SortKey> Surface<K> for ChunkedKeys<'_, '_, '_, K> {
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn key_at(&self, pos: usize) -> K {
        let (c, i) = self.split(pos);
        self.chunks[c][i]
    }

    #[inline]
    fn aux_key(&self, slot: usize) -> K {
        self.aux[slot]
    }

    #[inline]
    fn stage(&mut self, pos: usize, slot: usize) {
        self.aux[slot] = self.key_at(pos);
    }

    #[inline]
    fn restore(&mut self, slot: usize, pos: usize) {
        let (c, i) = self.split(pos);
        self.chunks[c][i] = self.aux[slot];
    }

    fn shift(&mut self, src: usize, dst: usize, len: usize) {
        if dst > src {
            for j in (0..len).rev() {
                let (sc, si) = self.split(src + j);
                let (dc, di) = self.split(dst + j);
                self.chunks[dc][di] = self.chunks[sc][si];
            }
        } else if dst < src {
            for j in 0..len {
                let (sc, si) = self.split(src + j);
                let (dc, di) = self.split(dst + j);
                self.chunks[dc][di] = self.chunks[sc][si];
            }
        }
    }

    fn sort_block(&mut self, start: usize, len: usize, parallel: bool) {
        debug_assert_eq!(start % self.capacity, 0, "pre-sort blocks are chunk aligned");
        let run = &mut self.chunks[start / self.capacity][..len];
        if parallel {
            run.par_sort_unstable();
        } else {
            run.sort_unstable();
        }
    }
}

/// Chunked keys plus chunked values reordered in lockstep.
pub(crate) struct ChunkedPairs<'d, 'c, 'w, K, V> {
    key_chunks: &'d mut [&'c mut [K]],
    value_chunks: &'d mut [&'c mut [V]],
    capacity: usize,
    len: usize,
    aux_keys: &'w mut [K],
    aux_values: &'w mut [V],
    perm: &'w mut [usize],
}

impl<'d, 'c, 'w, K: SortKey, V: Element> ChunkedPairs<'d, 'c, 'w, K, V> {
    pub fn new(
        key_chunks: &'d mut [&'c mut [K]],
        value_chunks: &'d mut [&'c mut [V]],
        capacity: usize,
        aux_keys: &'w mut [K],
        aux_values: &'w mut [V],
        perm: &'w mut [usize],
    ) -> Self {
        let len = key_chunks.iter().map(|c| c.len()).sum();
        Self { key_chunks, value_chunks, capacity, len, aux_keys, aux_values, perm }
    }

    #[inline]
    fn split(&self, pos: usize) -> (usize, usize) {
        (pos / self.capacity, pos % self.capacity)
    }
}

impl<K: SortKey, V: Element> Surface<K> for ChunkedPairs<'_, '_, '_, K, V> {
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn key_at(&self, pos: usize) -> K {
        let (c, i) = self.split(pos);
        self.key_chunks[c][i]
    }

    #[inline]
    fn aux_key(&self, slot: usize) -> K {
        self.aux_keys[slot]
    }

    #[inline]
    fn stage(&mut self, pos: usize, slot: usize) {
        let (c, i) = self.split(pos);
        self.aux_keys[slot] = self.key_chunks[c][i];
        self.aux_values[slot] = self.value_chunks[c][i];
    }

    #[inline]
    fn restore(&mut self, slot: usize, pos: usize) {
        let (c, i) = self.split(pos);
        self.key_chunks[c][i] = self.aux_keys[slot];
        self.value_chunks[c][i] = self.aux_values[slot];
    }

    fn shift(&mut self, src: usize, dst: usize, len: usize) {
        if dst > src {
            for j in (0..len).rev() {
                let (sc, si) = self.split(src + j);
                let (dc, di) = self.split(dst + j);
                self.key_chunks[dc][di] = self.key_chunks[sc][si];
                self.value_chunks[dc][di] = self.value_chunks[sc][si];
            }
        } else if dst < src {
            for j in 0..len {
                let (sc, si) = self.split(src + j);
                let (dc, di) = self.split(dst + j);
                self.key_chunks[dc][di] = self.key_chunks[sc][si];
                self.value_chunks[dc][di] = self.value_chunks[sc][si];
            }
        }
    }

    fn sort_block(&mut self, start: usize, len: usize, parallel: bool) {
        debug_assert_eq!(start % self.capacity, 0, "pre-sort blocks are chunk aligned");
        let c = start / self.capacity;
        co_sort_run(
            &mut self.key_chunks[c][..len],
            &mut self.value_chunks[c][..len],
            &mut self.aux_keys[..len],
            &mut self.aux_values[..len],
            &mut self.perm[..len],
            parallel,
        );
    }
}

// ============================================================================
// Block-local pair sort
// ============================================================================

/// Sort a key run and its value run together.
///
/// Sorts a permutation of indices by `(key, source index)` - the index
/// tie-break makes duplicate ordering independent of the sort algorithm -
/// then applies the permutation through the auxiliary buffers. All scratch
/// space is caller-provided, so the memory bound is preserved.
fn co_sort_run<K: SortKey, V: Element>(
    keys: &mut [K],
    values: &mut [V],
    aux_keys: &mut [K],
    aux_values: &mut [V],
    perm: &mut [usize],
    parallel: bool,
) {
    let len = keys.len();
    debug_assert!(values.len() == len && perm.len() == len);
    for (i, p) in perm.iter_mut().enumerate() {
        *p = i;
    }
    {
        let keys: &[K] = keys;
        if parallel {
            perm.par_sort_unstable_by_key(|&i| (keys[i], i));
        } else {
            perm.sort_unstable_by_key(|&i| (keys[i], i));
        }
    }
    for (slot, &i) in perm.iter().enumerate() {
        aux_keys[slot] = keys[i];
        aux_values[slot] = values[i];
    }
    keys.copy_from_slice(aux_keys);
    values.copy_from_slice(aux_values);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_stage_restore() {
        let mut keys = vec![4u64, 2, 9];
        let mut aux = vec![0u64; 3];
        let mut s = ContiguousKeys::new(&mut keys, &mut aux);
        s.stage(2, 0);
        s.stage(1, 1);
        assert_eq!(s.aux_key(0), 9);
        assert_eq!(s.aux_key(1), 2);
        s.restore(0, 0);
        assert_eq!(s.key_at(0), 9);
    }

    #[test]
    fn test_contiguous_shift_overlapping() {
        let mut keys = vec![1u32, 2, 3, 4, 5, 0, 0];
        let mut aux = vec![0u32; 1];
        let mut s = ContiguousKeys::new(&mut keys, &mut aux);
        s.shift(0, 2, 5);
        assert_eq!(&keys[2..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_chunked_addressing() {
        let mut a = vec![1u64, 2, 3, 4];
        let mut b = vec![5u64, 6, 7, 8];
        let mut c = vec![9u64, 10];
        let mut chunks: Vec<&mut [u64]> = vec![&mut a, &mut b, &mut c];
        let mut aux = vec![0u64; 4];
        let s = ChunkedKeys::new(&mut chunks, 4, &mut aux);
        assert_eq!(s.len(), 10);
        assert_eq!(s.key_at(0), 1);
        assert_eq!(s.key_at(3), 4);
        assert_eq!(s.key_at(4), 5);
        assert_eq!(s.key_at(9), 10);
    }

    #[test]
    fn test_chunked_shift_spans_chunks() {
        let mut a = vec![1u64, 2, 3, 4];
        let mut b = vec![5u64, 6, 7, 8];
        let mut chunks: Vec<&mut [u64]> = vec![&mut a, &mut b];
        let mut aux = vec![0u64; 4];
        let mut s = ChunkedKeys::new(&mut chunks, 4, &mut aux);
        // Move [1, 2, 3] right by three positions, across the chunk seam.
        s.shift(0, 3, 3);
        assert_eq!(s.key_at(3), 1);
        assert_eq!(s.key_at(4), 2);
        assert_eq!(s.key_at(5), 3);
        // And back left again.
        s.shift(3, 1, 3);
        assert_eq!(s.key_at(1), 1);
        assert_eq!(s.key_at(2), 2);
        assert_eq!(s.key_at(3), 3);
    }

    #[test]
    fn test_pair_block_sort_lockstep() {
        let mut keys = vec![3u64, 1, 2, 1];
        let mut values = vec![30u32, 10, 20, 11];
        let mut aux_k = vec![0u64; 4];
        let mut aux_v = vec![0u32; 4];
        let mut perm = vec![0usize; 4];
        let mut s =
            ContiguousPairs::new(&mut keys, &mut values, &mut aux_k, &mut aux_v, &mut perm);
        s.sort_block(0, 4, false);
        assert_eq!(keys, vec![1, 1, 2, 3]);
        // Duplicate keys keep their source order.
        assert_eq!(values, vec![10, 11, 20, 30]);
    }

    #[test]
    fn test_pair_block_sort_deterministic_with_parallel() {
        let mut keys: Vec<u64> = (0..512).map(|i| i % 7).collect();
        let mut values: Vec<u64> = (0..512).collect();
        let mut keys2 = keys.clone();
        let mut values2 = values.clone();

        let mut aux_k = vec![0u64; 512];
        let mut aux_v = vec![0u64; 512];
        let mut perm = vec![0usize; 512];
        ContiguousPairs::new(&mut keys, &mut values, &mut aux_k, &mut aux_v, &mut perm)
            .sort_block(0, 512, false);
        ContiguousPairs::new(&mut keys2, &mut values2, &mut aux_k, &mut aux_v, &mut perm)
            .sort_block(0, 512, true);

        assert_eq!(keys, keys2);
        assert_eq!(values, values2);
    }
}
