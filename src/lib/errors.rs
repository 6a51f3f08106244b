//! Custom error types for copsort operations.
//!
//! Every failure mode of a sort call is a variant of [`SortError`] so callers
//! can match on the cause and recover. Two classes of failures exist:
//!
//! - **Pre-flight failures** ([`SortError::InvalidParameter`],
//!   [`SortError::AllocationFailure`]) are raised before any element is
//!   touched; the input is left exactly as it was.
//! - **Mid-run failures** ([`SortError::ConsistencyViolation`],
//!   [`SortError::NonConvergence`]) abort a run that has already moved
//!   elements. Every element of the input multiset is still present (no
//!   element is ever lost to the auxiliary buffer across iterations), but
//!   the ordering is unspecified. Both indicate a bug or a caller breaking
//!   the no-concurrent-mutation contract, not a property of the input data.

use thiserror::Error;

/// Result type alias for copsort operations
pub type Result<T> = std::result::Result<T, SortError>;

/// Error type for copsort operations
#[derive(Error, Debug)]
pub enum SortError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Working storage is missing or too small. Raised before any data
    /// movement; the input arrays are untouched.
    #[error("Working storage too small: {required} bytes required, {provided} provided")]
    AllocationFailure {
        /// Bytes the sizing protocol requires for this call
        required: usize,
        /// Bytes actually supplied by the caller
        provided: usize,
    },

    /// An internal invariant failed mid-run: a block was not sorted, a
    /// partition-size vector did not sum to its target, or a duplicate-key
    /// boundary had fewer straddling candidates than the remaining deficit.
    /// The input is an unspecified permutation of the original multiset.
    #[error("Partition state violates sort invariants: {detail}")]
    ConsistencyViolation {
        /// Which invariant failed and where
        detail: String,
    },

    /// The threshold bisection exhausted its round budget without narrowing
    /// the bracket to a boundary. The budget is derived from the aggregate
    /// bracket gap (which shrinks every round), so this cannot fire on
    /// well-formed inputs; it is kept as a structured, catchable guard
    /// rather than an abort.
    #[error("Threshold bisection failed to converge: {rounds} rounds exceeded budget {budget}")]
    NonConvergence {
        /// Rounds actually spent
        rounds: u64,
        /// Round budget derived from the initial bracket gap
        budget: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter() {
        let error = SortError::InvalidParameter {
            parameter: "block-size".to_string(),
            reason: "must be >= 1".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Invalid parameter 'block-size'"));
        assert!(msg.contains("must be >= 1"));
    }

    #[test]
    fn test_allocation_failure() {
        let error = SortError::AllocationFailure { required: 4096, provided: 128 };
        let msg = format!("{error}");
        assert!(msg.contains("4096"));
        assert!(msg.contains("128"));
    }

    #[test]
    fn test_consistency_violation() {
        let error =
            SortError::ConsistencyViolation { detail: "partition sizes sum to 7, want 8".into() };
        let msg = format!("{error}");
        assert!(msg.contains("violates sort invariants"));
        assert!(msg.contains("sum to 7"));
    }

    #[test]
    fn test_non_convergence() {
        let error = SortError::NonConvergence { rounds: 12, budget: 11 };
        let msg = format!("{error}");
        assert!(msg.contains("12 rounds"));
        assert!(msg.contains("budget 11"));
    }
}
