#![deny(unsafe_code)]
// Clippy lint configuration for CI
// These lints are allowed because:
// - cast_*: index/count arithmetic intentionally casts between numeric types
// - missing_*_doc: Documentation improvements tracked separately
// - items_after_statements: Some test code uses late item declarations
// - match_same_arms: Sometimes clearer to list arms explicitly
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::items_after_statements,
    clippy::match_same_arms,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

//! # copsort - cooperative partition-selection sorting
//!
//! This library sorts large key (or key/value) arrays through a fixed-size
//! auxiliary buffer: the input is split into `k` blocks, each block is sorted
//! locally, and the globally smallest block-sized chunk is then repeatedly
//! identified and extracted until the whole array is in ascending order. The
//! working memory is a single caller-provided buffer whose size depends on
//! the block size, never on the total element count.
//!
//! ## Overview
//!
//! The library is organized into a few focused modules:
//!
//! - **[`sort`]** - the partition-selection sorter and its support machinery
//!   (threshold searches, bisection, tie-breaking, extraction and repacking)
//! - **[`errors`]** - structured error types for all fallible operations
//! - **[`validation`]** - parameter validation with consistent messages
//! - **[`logging`]** - operation timing and count formatting helpers
//! - **[`progress`]** - thread-safe interval progress tracking
//!
//! ## Quick Start
//!
//! Sorting follows a two-call protocol: one call computes the exact number of
//! working-storage bytes for a given input size and block size, the second
//! call performs the sort inside a buffer of that size.
//!
//! ```
//! use copsort_lib::sort::PartitionSorter;
//!
//! # fn main() -> copsort_lib::errors::Result<()> {
//! let mut keys: Vec<u64> = vec![5, 3, 8, 1, 9, 2, 7, 4, 6, 0];
//!
//! let sorter = PartitionSorter::new(3);
//! let request = sorter.storage_required_keys::<u64>(keys.len())?;
//! let mut storage = vec![0u8; request.bytes()];
//!
//! sorter.sort_keys(&mut keys, &mut storage)?;
//! assert_eq!(keys, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
//! # Ok(())
//! # }
//! ```
//!
//! Values are reordered in lockstep with their keys:
//!
//! ```
//! use copsort_lib::sort::PartitionSorter;
//!
//! # fn main() -> copsort_lib::errors::Result<()> {
//! let mut keys: Vec<u32> = vec![2, 0, 1];
//! let mut values: Vec<u64> = vec![20, 0, 10];
//!
//! let sorter = PartitionSorter::new(2);
//! let request = sorter.storage_required_pairs::<u32, u64>(keys.len())?;
//! let mut storage = vec![0u8; request.bytes()];
//!
//! sorter.sort_pairs(&mut keys, &mut values, &mut storage)?;
//! assert_eq!(keys, vec![0, 1, 2]);
//! assert_eq!(values, vec![0, 10, 20]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - **Permutation**: the output is always a permutation of the input; keys
//!   and values never separate.
//! - **Determinism**: duplicate keys are assigned to chunks by a fixed
//!   `(key, block index)` rule, so identical inputs produce identical
//!   outputs, bit for bit.
//! - **Bounded memory**: the auxiliary buffer holds one block; no hidden
//!   allocation grows with the input length.
//! - **Structured failure**: invariant breaches surface as catchable
//!   [`errors::SortError`] values, never process termination.

pub mod errors;
pub mod logging;
pub mod progress;
pub mod sort;
pub mod validation;

// Re-export the primary entry points for convenient access
pub use errors::{Result, SortError};
pub use sort::{Element, PartitionSorter, SortKey, SortReport, StorageRequest};
