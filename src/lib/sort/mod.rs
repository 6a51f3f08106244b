//! Memory-bounded partition-selection sorting.
//!
//! The sorter splits the input into `k` pre-sorted blocks and produces the
//! globally sorted output one block-sized chunk at a time, using a single
//! auxiliary buffer the size of one block.
//!
//! # Algorithm
//!
//! Each outer iteration solves a distributed order-statistics problem: find
//! the key value below which exactly `block_size` elements remain across all
//! blocks, then extract those elements and compact the rest.
//!
//! 1. **Range estimation**: derive a bracketing threshold pair from sampled
//!    block keys ([`search`]).
//! 2. **Threshold search**: count elements under each candidate with one
//!    binary search per block, all blocks independently ([`search`]).
//! 3. **Bisection**: when the target count lies strictly between the
//!    bracket counts, repeatedly probe the midpoint key of the block whose
//!    count estimates disagree most, narrowing the bracket every round
//!    ([`select`]).
//! 4. **Tie-breaking**: once the bracket collapses onto duplicate keys,
//!    assign the straddling elements to the chunk in `(key, block index)`
//!    order so the extracted count matches the target exactly ([`select`]).
//! 5. **Extract + repack**: k-way merge the selected per-block prefixes into
//!    the auxiliary buffer, compact the remainders, and transfer the chunk
//!    into its final output range ([`extract`]).
//!
//! # Performance Features
//!
//! - **Parallel block work**: per-block searches and block-local sorting use
//!   rayon when more than one thread is configured
//! - **No scaling allocations**: working memory is carved out of one
//!   caller-provided buffer sized by the two-call protocol ([`workspace`])
//! - **O(k log block) selection**: each bisection round costs one binary
//!   search per block

pub mod extract;
pub mod scan;
pub mod search;
pub mod select;
pub mod sorter;
pub mod surface;
pub mod workspace;

pub use sorter::{PartitionSorter, SortReport};
pub use surface::{Element, SortKey};
pub use workspace::StorageRequest;
