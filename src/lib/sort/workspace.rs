//! Working-storage planning and carving.
//!
//! The sorter follows a two-call protocol: the first call computes the exact
//! byte requirement for a given `(n, block_size)` and element types, the
//! second call runs the sort inside a caller-provided buffer of that size.
//! Both calls derive their numbers from the same [`WorkPlan`], so they agree
//! exactly.
//!
//! The plan covers everything the sort touches beyond the input arrays:
//!
//! - the auxiliary key (and value) buffer, capacity one block,
//! - the permutation scratch for block-local pair sorting,
//! - the per-block partition-size and count vectors used by the selection
//!   steps.
//!
//! Fields are laid out back to back, each aligned to [`FIELD_ALIGN`], with
//! base headroom so alignment holds for any caller buffer; the total is
//! rounded up to [`STORAGE_ALIGN`].

use std::marker::PhantomData;
use std::mem;

use crate::errors::{Result, SortError};
use crate::sort::surface::Element;

/// Alignment of each carved field within the storage buffer.
pub(crate) const FIELD_ALIGN: usize = 64;

/// The reported byte total is rounded up to this boundary.
pub const STORAGE_ALIGN: usize = 256;

/// Exact working-storage requirement for one sort call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageRequest {
    bytes: usize,
    blocks: usize,
}

impl StorageRequest {
    /// Bytes the caller must provide.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Number of blocks (`k`) the input will be split into.
    #[must_use]
    pub fn blocks(&self) -> usize {
        self.blocks
    }
}

/// Byte layout for one sort call, computed purely from
/// `(n, block_size, K, V)`. Binding a buffer against the plan yields the
/// typed views in [`Workspace`].
pub(crate) struct WorkPlan<K, V> {
    /// Number of blocks the input splits into.
    k: usize,
    /// Auxiliary buffer capacity in elements (one block, clamped to `n`).
    aux_len: usize,
    /// Whether value lanes and the permutation scratch are carved.
    pairs: bool,
    total_bytes: usize,
    _marker: PhantomData<(K, V)>,
}

/// Typed views carved out of the caller's storage buffer.
#[derive(Debug)]
pub(crate) struct Workspace<'w, K, V> {
    /// Auxiliary key buffer (capacity one block).
    pub aux_keys: &'w mut [K],
    /// Auxiliary value buffer (empty for key-only shapes).
    pub aux_values: &'w mut [V],
    /// Permutation scratch for block-local pair sorts (empty for key-only).
    pub perm: &'w mut [usize],
    /// Per-block extraction counts for the current iteration.
    pub part: &'w mut [usize],
    /// Exclusive prefix sums over `part` (k + 1 entries).
    pub cumul: &'w mut [usize],
    /// Lower-bracket per-block counts.
    pub lower: &'w mut [usize],
    /// Upper-bracket per-block counts.
    pub upper: &'w mut [usize],
    /// Probe counts (elements strictly under the probe key).
    pub probe_lo: &'w mut [usize],
    /// Probe counts (elements at or under the probe key).
    pub probe_hi: &'w mut [usize],
}

impl<K: Element, V: Element> WorkPlan<K, V> {
    /// Compute the layout for `n` elements split into `block_size`-sized
    /// blocks. `pairs` carves the value lane and permutation scratch.
    pub fn new(n: usize, block_size: usize, pairs: bool) -> Result<Self> {
        if mem::size_of::<K>() == 0 {
            return Err(SortError::InvalidParameter {
                parameter: "K".to_string(),
                reason: "zero-sized key types cannot be sorted".to_string(),
            });
        }
        if pairs && mem::size_of::<V>() == 0 {
            return Err(SortError::InvalidParameter {
                parameter: "V".to_string(),
                reason: "zero-sized value types carry no payload; use the key-only entry point"
                    .to_string(),
            });
        }
        for (name, align) in [("K", mem::align_of::<K>()), ("V", mem::align_of::<V>())] {
            if align > FIELD_ALIGN {
                return Err(SortError::InvalidParameter {
                    parameter: name.to_string(),
                    reason: format!("alignment {align} exceeds the supported {FIELD_ALIGN}"),
                });
            }
        }

        let k = n.div_ceil(block_size);
        let aux_len = block_size.min(n);

        let mut plan = Self { k, aux_len, pairs, total_bytes: 0, _marker: PhantomData };
        plan.total_bytes = plan.layout_bytes();
        Ok(plan)
    }

    /// Total bytes of the field layout. [`Self::bind`] carves fields in the
    /// same order with the same per-field rounding, so the figure reported
    /// by a dry run and the figure a real call consumes always agree.
    fn layout_bytes(&self) -> usize {
        let mut cursor = 0usize;
        let mut field = |elem_bytes: usize, len: usize| {
            cursor += (elem_bytes * len).next_multiple_of(FIELD_ALIGN);
        };

        field(mem::size_of::<K>(), self.aux_len);
        if self.pairs {
            field(mem::size_of::<V>(), self.aux_len);
            field(mem::size_of::<usize>(), self.aux_len);
        }
        field(mem::size_of::<usize>(), self.k); // part
        field(mem::size_of::<usize>(), self.k + 1); // cumul
        field(mem::size_of::<usize>(), self.k); // lower
        field(mem::size_of::<usize>(), self.k); // upper
        field(mem::size_of::<usize>(), self.k); // probe_lo
        field(mem::size_of::<usize>(), self.k); // probe_hi

        // Base headroom so the first field can be aligned inside any caller
        // buffer, then round the reported total to the storage boundary.
        (cursor + FIELD_ALIGN).next_multiple_of(STORAGE_ALIGN)
    }

    /// The storage requirement this plan implies.
    pub fn request(&self) -> StorageRequest {
        StorageRequest { bytes: self.total_bytes, blocks: self.k }
    }

    /// Carve the caller's buffer into the typed workspace views.
    ///
    /// Fails with [`SortError::AllocationFailure`] when the buffer is
    /// smaller than [`Self::request`] demands. No data is moved before this
    /// check, so an allocation failure leaves the input untouched.
    pub fn bind<'w>(&self, storage: &'w mut [u8]) -> Result<Workspace<'w, K, V>> {
        if storage.len() < self.total_bytes {
            return Err(SortError::AllocationFailure {
                required: self.total_bytes,
                provided: storage.len(),
            });
        }

        let pad = storage.as_ptr().align_offset(FIELD_ALIGN);
        let mut rest = &mut storage[pad..];

        let aux_keys = take_field::<K>(&mut rest, self.aux_len)?;
        let (aux_values, perm): (&'w mut [V], &'w mut [usize]) = if self.pairs {
            let aux_values = take_field::<V>(&mut rest, self.aux_len)?;
            let perm = take_field::<usize>(&mut rest, self.aux_len)?;
            (aux_values, perm)
        } else {
            (&mut [], &mut [])
        };
        let part = take_field::<usize>(&mut rest, self.k)?;
        let cumul = take_field::<usize>(&mut rest, self.k + 1)?;
        let lower = take_field::<usize>(&mut rest, self.k)?;
        let upper = take_field::<usize>(&mut rest, self.k)?;
        let probe_lo = take_field::<usize>(&mut rest, self.k)?;
        let probe_hi = take_field::<usize>(&mut rest, self.k)?;

        Ok(Workspace {
            aux_keys,
            aux_values,
            perm,
            part,
            cumul,
            lower,
            upper,
            probe_lo,
            probe_hi,
        })
    }
}

/// Split the next aligned field off the buffer and view it as `&mut [T]`.
fn take_field<'w, T: Element>(rest: &mut &'w mut [u8], len: usize) -> Result<&'w mut [T]> {
    let bytes = mem::size_of::<T>() * len;
    if bytes == 0 {
        return Ok(&mut []);
    }
    let padded = bytes.next_multiple_of(FIELD_ALIGN);
    let buf = mem::take(rest);
    if padded > buf.len() {
        return Err(SortError::ConsistencyViolation {
            detail: "workspace layout exceeded bound storage".to_string(),
        });
    }
    let (head, tail) = buf.split_at_mut(padded);
    *rest = tail;
    bytemuck::try_cast_slice_mut::<u8, T>(&mut head[..bytes]).map_err(|_| {
        SortError::ConsistencyViolation { detail: "workspace field misaligned".to_string() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_aligned_and_positive() {
        let plan = WorkPlan::<u64, ()>::new(1000, 100, false).unwrap();
        let req = plan.request();
        assert_eq!(req.bytes() % STORAGE_ALIGN, 0);
        assert!(req.bytes() >= 100 * mem::size_of::<u64>());
        assert_eq!(req.blocks(), 10);
    }

    #[test]
    fn test_pairs_plan_is_larger() {
        let keys = WorkPlan::<u64, ()>::new(1000, 100, false).unwrap().request();
        let pairs = WorkPlan::<u64, u64>::new(1000, 100, true).unwrap().request();
        assert!(pairs.bytes() > keys.bytes());
    }

    #[test]
    fn test_bind_carves_expected_lengths() {
        let plan = WorkPlan::<u32, u16>::new(10, 3, true).unwrap();
        let mut storage = vec![0u8; plan.request().bytes()];
        let ws = plan.bind(&mut storage).unwrap();
        assert_eq!(ws.aux_keys.len(), 3);
        assert_eq!(ws.aux_values.len(), 3);
        assert_eq!(ws.perm.len(), 3);
        assert_eq!(ws.part.len(), 4);
        assert_eq!(ws.cumul.len(), 5);
        assert_eq!(ws.lower.len(), 4);
        assert_eq!(ws.upper.len(), 4);
        assert_eq!(ws.probe_lo.len(), 4);
        assert_eq!(ws.probe_hi.len(), 4);
    }

    #[test]
    fn test_bind_rejects_undersized_buffer() {
        let plan = WorkPlan::<u64, ()>::new(100, 10, false).unwrap();
        let required = plan.request().bytes();
        let mut storage = vec![0u8; required - 1];
        match plan.bind(&mut storage) {
            Err(SortError::AllocationFailure { required: r, provided }) => {
                assert_eq!(r, required);
                assert_eq!(provided, required - 1);
            }
            other => panic!("expected AllocationFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_bind_tolerates_misaligned_base() {
        let plan = WorkPlan::<u64, ()>::new(100, 10, false).unwrap();
        let mut storage = vec![0u8; plan.request().bytes() + 1];
        // Offset the start by one byte; the base headroom absorbs it.
        let ws = plan.bind(&mut storage[1..]).unwrap();
        assert_eq!(ws.aux_keys.len(), 10);
    }

    #[test]
    fn test_zero_length_input() {
        let plan = WorkPlan::<u64, ()>::new(0, 10, false).unwrap();
        assert_eq!(plan.request().blocks(), 0);
        let mut storage = vec![0u8; plan.request().bytes()];
        let ws = plan.bind(&mut storage).unwrap();
        assert_eq!(ws.aux_keys.len(), 0);
        assert_eq!(ws.part.len(), 0);
        assert_eq!(ws.cumul.len(), 1);
    }

    #[test]
    fn test_zero_sized_key_rejected() {
        assert!(WorkPlan::<(), ()>::new(10, 2, false).is_err());
        assert!(WorkPlan::<u64, ()>::new(10, 2, true).is_err());
    }
}
